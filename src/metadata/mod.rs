//! Metadata resolution: identifying library items against external catalogs.
//!
//! # Module layout
//!
//! - [`normalize`] -- Title canonicalization for comparison.
//! - [`scoring`] -- Edit-distance similarity and match confidence.
//! - [`types`] -- Search results, detail records, ratings, artwork, sync records.
//! - [`provider`] -- The [`Integration`] trait and its capability traits.
//! - [`http`] -- Shared request discipline: deadline, retry, backoff, 404 handling.
//! - [`auth`] -- Session and OAuth token lifecycles.
//! - [`providers`] -- Concrete clients (TMDB, TVDB, AniList, OMDb, Fanart.tv, Trakt).
//! - [`registry`] -- Builds and holds the ready clients.
//! - [`cache`] -- Snapshot storage seam.
//! - [`manager`] -- The [`ResolutionManager`] orchestrating all of the above.

pub mod auth;
pub mod cache;
pub mod http;
pub mod manager;
pub mod normalize;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod scoring;
pub mod types;

pub use cache::{InMemorySnapshotStore, SnapshotStore};
pub use http::{ApiClient, HttpPolicy};
pub use manager::{
    CacheOutcome, CacheReport, Collected, ConnectionStatus, IdentifyOutcome, Identification,
    ProviderFailure, ResolutionManager, ResolveError,
};
pub use normalize::normalize;
pub use provider::{
    ArtworkCapability, CapabilitySet, Integration, MetadataCapability, RatingsCapability,
    SyncCapability,
};
pub use registry::IntegrationRegistry;
pub use scoring::{calculate_confidence, find_best_match, score_search_results};
pub use types::{ExternalIds, ScoredSearchResult, SearchResult};
