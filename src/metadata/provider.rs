//! Integration and capability traits.
//!
//! Every external catalog implements [`Integration`], which carries identity,
//! readiness and lifecycle. What the catalog can actually *do* is expressed
//! through four independent capability traits:
//!
//! - [`MetadataCapability`]: search and full detail records;
//! - [`RatingsCapability`]: aggregate scores;
//! - [`ArtworkCapability`]: images;
//! - [`SyncCapability`]: OAuth and watch-history read/write.
//!
//! An integration exposes a capability by overriding the matching `as_*`
//! accessor. Callers dispatch on "does this integration expose capability X"
//! rather than on a concrete type, so a client can mix any subset.

use async_trait::async_trait;
use reelmatch_common::{MediaType, ProviderResult};

use crate::config::IntegrationConfig;

use super::auth::OAuthTokens;
use super::types::{
    AggregateRatings, Artwork, EpisodeDetails, ExternalIds, MovieDetails, SearchResult,
    SeasonDetails, ShowDetails, SyncItem, SyncSummary, WatchHistoryEntry,
};

// ---------------------------------------------------------------------------
// Base integration
// ---------------------------------------------------------------------------

/// Identity, lifecycle and capability discovery for one external catalog.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Stable lowercase identifier (e.g. `"tmdb"`).
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn display_name(&self) -> &'static str;

    /// Whether an API key must be configured before use.
    fn requires_api_key(&self) -> bool;

    /// Whether the integration authenticates users through OAuth.
    fn uses_oauth(&self) -> bool {
        false
    }

    /// Whether the integration can act as a primary metadata source, as
    /// opposed to only supplementing ratings or artwork.
    fn is_primary_source(&self) -> bool {
        self.as_metadata().is_some()
    }

    /// Media types the catalog covers.
    fn supported_media_types(&self) -> &'static [MediaType];

    /// Rating source names this integration feeds.
    fn rating_sources(&self) -> &'static [&'static str] {
        &[]
    }

    /// Apply configuration. A missing required credential leaves the
    /// integration not ready; this never fails.
    fn initialize(&mut self, config: &IntegrationConfig);

    /// Whether the integration has what it needs to serve requests.
    fn is_ready(&self) -> bool;

    /// Cheap authenticated round-trip to verify credentials and reachability.
    async fn test_connection(&self) -> ProviderResult<()>;

    fn supports(&self, media_type: MediaType) -> bool {
        self.supported_media_types().contains(&media_type)
    }

    fn as_metadata(&self) -> Option<&dyn MetadataCapability> {
        None
    }

    fn as_ratings(&self) -> Option<&dyn RatingsCapability> {
        None
    }

    fn as_artwork(&self) -> Option<&dyn ArtworkCapability> {
        None
    }

    fn as_sync(&self) -> Option<&dyn SyncCapability> {
        None
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Search and detail lookups.
///
/// Searching for a media type the catalog does not cover returns an empty
/// list. Fetching details for one fails with
/// [`ProviderError::NotSupported`](reelmatch_common::ProviderError::NotSupported).
/// A detail fetch for an id the catalog does not know returns `Ok(None)`.
#[async_trait]
pub trait MetadataCapability: Send + Sync {
    async fn search_movies(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>>;

    async fn search_shows(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>>;

    async fn movie_details(&self, id: &str) -> ProviderResult<Option<MovieDetails>>;

    async fn show_details(&self, id: &str) -> ProviderResult<Option<ShowDetails>>;

    async fn season_details(&self, show_id: &str, season: u32) -> ProviderResult<Option<SeasonDetails>>;

    async fn episode_details(
        &self,
        show_id: &str,
        season: u32,
        episode: u32,
    ) -> ProviderResult<Option<EpisodeDetails>>;

    /// Resolve this catalog's local id for a title known by other catalogs'
    /// ids. The default only looks for an id keyed by `catalog`.
    async fn resolve_id(
        &self,
        catalog: &str,
        ids: &ExternalIds,
        _media_type: MediaType,
    ) -> ProviderResult<Option<String>> {
        Ok(ids.get(catalog).map(str::to_string))
    }
}

/// Aggregate scores. A catalog without data for the title returns an empty
/// [`AggregateRatings`], not an error.
#[async_trait]
pub trait RatingsCapability: Send + Sync {
    async fn movie_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings>;

    async fn show_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings>;
}

/// Images.
#[async_trait]
pub trait ArtworkCapability: Send + Sync {
    async fn movie_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork>;

    async fn show_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork>;
}

/// OAuth plus watch-history read/write and live playback reporting.
#[async_trait]
pub trait SyncCapability: Send + Sync {
    /// URL the user visits to grant access. `state` is echoed back on the
    /// redirect.
    fn authorization_url(&self, state: &str) -> ProviderResult<String>;

    /// Exchange an authorization code for tokens and start using them.
    async fn exchange_code(&self, code: &str) -> ProviderResult<OAuthTokens>;

    /// Refresh the stored tokens now.
    async fn refresh_tokens(&self) -> ProviderResult<OAuthTokens>;

    /// Most recent watch events, newest first. `None` reads both movies and
    /// episodes.
    async fn watch_history(
        &self,
        media_type: Option<MediaType>,
        limit: u32,
    ) -> ProviderResult<Vec<WatchHistoryEntry>>;

    /// Record items as watched.
    async fn mark_watched(&self, items: &[SyncItem]) -> ProviderResult<SyncSummary>;

    /// Report that playback started at `progress` percent.
    async fn scrobble_start(&self, item: &SyncItem, progress: f64) -> ProviderResult<()>;

    /// Report that playback paused at `progress` percent.
    async fn scrobble_pause(&self, item: &SyncItem, progress: f64) -> ProviderResult<()>;

    /// Report that playback stopped at `progress` percent.
    async fn scrobble_stop(&self, item: &SyncItem, progress: f64) -> ProviderResult<()>;
}

/// Capabilities an integration exposes, for listing and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CapabilitySet {
    pub metadata: bool,
    pub ratings: bool,
    pub artwork: bool,
    pub sync: bool,
}

impl CapabilitySet {
    pub fn of(integration: &dyn Integration) -> Self {
        Self {
            metadata: integration.as_metadata().is_some(),
            ratings: integration.as_ratings().is_some(),
            artwork: integration.as_artwork().is_some(),
            sync: integration.as_sync().is_some(),
        }
    }
}
