//! Concrete provider clients.
//!
//! Each submodule wraps a single external API and implements
//! [`Integration`] plus whichever capability traits that catalog supports.

pub mod anilist;
pub mod fanart;
pub mod omdb;
pub mod tmdb;
pub mod trakt;
pub mod tvdb;

pub use anilist::AniListProvider;
pub use fanart::FanartProvider;
pub use omdb::OmdbProvider;
pub use tmdb::TmdbProvider;
pub use trakt::TraktProvider;
pub use tvdb::TvdbProvider;

use super::http::HttpPolicy;
use super::provider::Integration;
use super::scoring::extract_year;

pub const TMDB_ID: &str = "tmdb";
pub const TVDB_ID: &str = "tvdb";
pub const ANILIST_ID: &str = "anilist";
pub const OMDB_ID: &str = "omdb";
pub const FANART_ID: &str = "fanart";
pub const TRAKT_ID: &str = "trakt";

/// Ids of every integration this crate can build.
pub const KNOWN_INTEGRATIONS: &[&str] = &[TMDB_ID, TVDB_ID, ANILIST_ID, OMDB_ID, FANART_ID, TRAKT_ID];

/// Create an uninitialized client for `id`, or `None` for an unknown id.
pub fn create_integration(id: &str, policy: HttpPolicy, language: &str) -> Option<Box<dyn Integration>> {
    let integration: Box<dyn Integration> = match id {
        TMDB_ID => Box::new(TmdbProvider::new(policy, language)),
        TVDB_ID => Box::new(TvdbProvider::new(policy, language)),
        ANILIST_ID => Box::new(AniListProvider::new(policy)),
        OMDB_ID => Box::new(OmdbProvider::new(policy)),
        FANART_ID => Box::new(FanartProvider::new(policy, language)),
        TRAKT_ID => Box::new(TraktProvider::new(policy)),
        _ => return None,
    };
    Some(integration)
}

/// Year of an optional date string.
fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(extract_year)
}

/// Treat an empty string as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
