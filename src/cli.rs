use clap::{Parser, Subcommand, ValueEnum};
use reelmatch_common::MediaType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelmatch")]
#[command(author, version, about = "Identify media titles against external metadata catalogs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the configured providers and score the candidates
    Identify {
        /// Title to look up
        #[arg(required = true)]
        title: String,

        /// Release or premiere year
        #[arg(short, long)]
        year: Option<i32>,

        /// Kind of title
        #[arg(short = 't', long = "type", value_enum, default_value_t = MediaKind::Movie)]
        kind: MediaKind,

        /// Override the configured auto-match threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Fetch and cache details from every provider for a known identity
    Fetch {
        /// External ids as catalog=id, e.g. tmdb=603 (repeatable)
        #[arg(long = "id", required = true, value_parser = parse_external_id)]
        ids: Vec<(String, String)>,

        /// Kind of title
        #[arg(short = 't', long = "type", value_enum, default_value_t = MediaKind::Movie)]
        kind: MediaKind,
    },

    /// Test the connection of every ready integration
    Check,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}

/// Media kind as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaKind {
    Movie,
    Tv,
    Anime,
    AnimeMovie,
}

impl MediaKind {
    /// Media type and anime flag for the resolution manager.
    pub fn resolve(self) -> (MediaType, bool) {
        match self {
            MediaKind::Movie => (MediaType::Movie, false),
            MediaKind::Tv => (MediaType::TvShow, false),
            MediaKind::Anime => (MediaType::TvShow, true),
            MediaKind::AnimeMovie => (MediaType::Movie, true),
        }
    }
}

fn parse_external_id(value: &str) -> Result<(String, String), String> {
    let (catalog, id) = value
        .split_once('=')
        .ok_or_else(|| format!("expected catalog=id, got '{value}'"))?;
    let (catalog, id) = (catalog.trim(), id.trim());
    if catalog.is_empty() || id.is_empty() {
        return Err(format!("expected catalog=id, got '{value}'"));
    }
    Ok((catalog.to_ascii_lowercase(), id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn identify_arguments() {
        let cli = Cli::try_parse_from(["reelmatch", "identify", "Cowboy Bebop", "--type", "anime", "-y", "1998"]).unwrap();
        match cli.command {
            Commands::Identify { title, year, kind, threshold } => {
                assert_eq!(title, "Cowboy Bebop");
                assert_eq!(year, Some(1998));
                assert_eq!(kind.resolve(), (MediaType::TvShow, true));
                assert_eq!(threshold, None);
            }
            _ => panic!("expected identify"),
        }
    }

    #[test]
    fn external_id_parsing() {
        assert_eq!(parse_external_id("TMDB=603"), Ok(("tmdb".to_string(), "603".to_string())));
        assert!(parse_external_id("603").is_err());
        assert!(parse_external_id("tmdb=").is_err());
    }
}
