mod cli;

use reelmatch::{
    config,
    metadata::{
        CacheOutcome, ExternalIds, IdentifyOutcome, InMemorySnapshotStore, ResolutionManager,
        ResolveError, ScoredSearchResult,
    },
    telemetry,
};
use reelmatch_common::MediaId;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, MediaKind};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose);

    match cli.command {
        Commands::Identify {
            title,
            year,
            kind,
            threshold,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(identify(cli.config.as_deref(), &title, year, kind, threshold))
        }
        Commands::Fetch { ids, kind } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch(cli.config.as_deref(), &ids, kind))
        }
        Commands::Check => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

fn build_manager(config_path: Option<&Path>) -> Result<ResolutionManager> {
    let config = config::load_config_or_default(config_path)?;
    let store = Arc::new(InMemorySnapshotStore::new());
    Ok(ResolutionManager::from_config(&config, store))
}

async fn identify(
    config_path: Option<&Path>,
    title: &str,
    year: Option<i32>,
    kind: MediaKind,
    threshold: Option<f64>,
) -> Result<()> {
    let manager = build_manager(config_path)?;
    if let Some(threshold) = threshold {
        let mut settings = (*manager.settings()).clone();
        settings.auto_match_threshold = threshold;
        manager.update_settings(settings)?;
    }

    let (media_type, anime) = kind.resolve();
    let identification = match manager.identify(title, year, media_type, anime).await {
        Ok(identification) => identification,
        Err(ResolveError::Unresolved { failures, .. }) => {
            println!("Unresolved: no provider could be queried for {}", media_type);
            for failure in &failures {
                println!("  ✗ {}", failure);
            }
            anyhow::bail!("identification unresolved");
        }
        Err(e) => return Err(e.into()),
    };

    match &identification.outcome {
        IdentifyOutcome::Matched(best) => {
            println!("Matched:");
            print_candidate(best);
        }
        IdentifyOutcome::Suggestions(candidates) if candidates.is_empty() => {
            println!("No candidates found.");
        }
        IdentifyOutcome::Suggestions(candidates) => {
            println!(
                "No match above threshold {:.2}. Suggestions:",
                manager.settings().auto_match_threshold
            );
            for candidate in candidates.iter().take(10) {
                print_candidate(candidate);
            }
        }
    }

    for failure in &identification.failures {
        println!("  ! {} failed: {}", failure.integration_id, failure.error);
    }

    Ok(())
}

fn print_candidate(candidate: &ScoredSearchResult) {
    let result = &candidate.result;
    print!(
        "  {:.3}  {} [{}:{}]",
        candidate.confidence, result.title, result.integration_id, result.id
    );
    if let Some(date) = result.date_or_year() {
        print!(" ({})", date);
    }
    println!();
}

async fn fetch(config_path: Option<&Path>, ids: &[(String, String)], kind: MediaKind) -> Result<()> {
    let manager = build_manager(config_path)?;

    let mut external_ids = ExternalIds::default();
    for (catalog, id) in ids {
        if !external_ids.set(catalog, id.as_str()) {
            anyhow::bail!("Unknown catalog '{}'", catalog);
        }
    }

    let (media_type, _) = kind.resolve();
    let report = manager
        .fetch_and_cache_all(MediaId::new(), &external_ids, media_type)
        .await?;

    for entry in &report.results {
        let status = match &entry.outcome {
            CacheOutcome::Cached => "✓ cached".to_string(),
            CacheOutcome::NotFound => "- not found".to_string(),
            CacheOutcome::Skipped => "- skipped (no usable id)".to_string(),
            CacheOutcome::Failed(e) => format!("✗ {}", e),
            CacheOutcome::StoreFailed(e) => format!("✗ store: {}", e),
        };
        println!("{:<10} {}", entry.integration_id, status);
    }

    println!("\nExternal ids:");
    for (catalog, id) in report.external_ids.iter() {
        println!("  {}: {}", catalog, id);
    }

    Ok(())
}

async fn check(config_path: Option<&Path>) -> Result<()> {
    let manager = build_manager(config_path)?;
    let statuses = manager.test_connections().await;

    if statuses.is_empty() {
        println!("No integrations are ready. Add API keys to the config file.");
        return Ok(());
    }

    let mut all_ok = true;
    for status in &statuses {
        let caps = status.capabilities;
        let mut names = Vec::new();
        if caps.metadata {
            names.push("metadata");
        }
        if caps.ratings {
            names.push("ratings");
        }
        if caps.artwork {
            names.push("artwork");
        }
        if caps.sync {
            names.push("sync");
        }

        match &status.result {
            Ok(()) => println!("✓ {} ({})", status.display_name, names.join(", ")),
            Err(e) => {
                all_ok = false;
                println!("✗ {} ({}): {}", status.display_name, names.join(", "), e);
            }
        }
    }

    println!();
    if all_ok {
        println!("All integrations are reachable!");
    } else {
        println!("Some integrations failed. Check credentials and network access.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let metadata = &config.metadata;
    println!("  Auto-match threshold: {}", metadata.auto_match_threshold);
    println!("  Language: {}", metadata.language);
    println!("  Movie priority: {}", metadata.movie_priority.join(", "));
    println!("  TV priority: {}", metadata.tv_priority.join(", "));
    println!("  Anime priority: {}", metadata.anime_priority.join(", "));
    println!("  Integrations: {}", config.integrations.len());
    println!(
        "    Enabled: {}",
        config.integrations.iter().filter(|i| i.enabled).count()
    );

    Ok(())
}
