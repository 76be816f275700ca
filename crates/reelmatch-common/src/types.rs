//! Core type definitions for media routing.
//!
//! [`MediaType`] is what a provider returns and what detail records describe.
//! [`MediaCategory`] is the coarser key used to pick a provider priority list;
//! anime content gets its own list regardless of whether it is a film or a
//! series.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a search result or detail record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A feature film.
    Movie,
    /// A TV series.
    TvShow,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::TvShow => write!(f, "tvshow"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" => Ok(Self::Movie),
            "tv" | "tvshow" | "show" | "series" => Ok(Self::TvShow),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Provider priority bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    /// Live-action or animated films that are not flagged as anime.
    Movie,
    /// Series that are not flagged as anime.
    Tv,
    /// Anime films and series.
    Anime,
}

impl MediaCategory {
    /// Pick the priority bucket for a media type. The anime flag wins over the
    /// media type.
    pub fn for_media(media_type: MediaType, anime: bool) -> Self {
        match (anime, media_type) {
            (true, _) => Self::Anime,
            (false, MediaType::Movie) => Self::Movie,
            (false, MediaType::TvShow) => Self::Tv,
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Tv => write!(f, "tv"),
            Self::Anime => write!(f, "anime"),
        }
    }
}
