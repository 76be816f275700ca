//! Resolution manager: identifies titles across providers and caches
//! per-provider detail snapshots.
//!
//! The manager holds two pieces of shared state, each as an `Arc` behind a
//! `parking_lot::RwLock`:
//!
//! - the current [`MetadataSettings`];
//! - the [`IntegrationRegistry`] of ready clients.
//!
//! Every operation clones both `Arc`s once on entry and works from that
//! snapshot, so an update swaps in new state for later calls while in-flight
//! calls finish with what they started with.
//!
//! Provider calls within one operation run concurrently. A failing provider
//! is recorded as a [`ProviderFailure`] next to the results of the others;
//! only when no provider could be queried at all does an operation return
//! [`ResolveError::Unresolved`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use reelmatch_common::{MediaCategory, MediaId, MediaType, ProviderError, ProviderResult};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::SnapshotStore;
use super::provider::{CapabilitySet, Integration};
use super::registry::IntegrationRegistry;
use super::scoring::score_search_results;
use super::types::{
    AggregateRatings, Artwork, ExternalIds, ProviderSnapshot, ScoredSearchResult, SearchResult,
    SnapshotDetails,
};
use crate::config::{validate_settings, Config, IntegrationConfig, MetadataSettings};

/// Errors surfaced by the manager itself. Provider-scoped errors travel as
/// [`ProviderFailure`] values instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No provider could be queried: none is ready for the media type, or
    /// every one that was queried failed.
    #[error("no provider available to resolve {media_type} ({} failed)", .failures.len())]
    Unresolved {
        media_type: MediaType,
        failures: Vec<ProviderFailure>,
    },

    /// Details were requested for an identity with no external ids.
    #[error("no external ids to resolve")]
    NoIdentity,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// One provider's failure within a multi-provider operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub integration_id: String,
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.integration_id, self.error)
    }
}

/// Result of [`ResolutionManager::identify`].
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    /// The best candidate reached the auto-match threshold.
    Matched(ScoredSearchResult),
    /// No candidate reached the threshold; all candidates, best first.
    /// May be empty.
    Suggestions(Vec<ScoredSearchResult>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub outcome: IdentifyOutcome,
    /// Providers whose search failed; their results are missing from the
    /// outcome.
    pub failures: Vec<ProviderFailure>,
}

impl Identification {
    /// The accepted match, if any.
    pub fn matched(&self) -> Option<&ScoredSearchResult> {
        match &self.outcome {
            IdentifyOutcome::Matched(best) => Some(best),
            IdentifyOutcome::Suggestions(_) => None,
        }
    }

    /// Candidates offered for manual confirmation.
    pub fn suggestions(&self) -> &[ScoredSearchResult] {
        match &self.outcome {
            IdentifyOutcome::Matched(_) => &[],
            IdentifyOutcome::Suggestions(candidates) => candidates,
        }
    }
}

/// What happened to one provider during [`ResolutionManager::fetch_and_cache_all`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    /// A snapshot was fetched and stored.
    Cached,
    /// The provider does not know the title.
    NotFound,
    /// The identity carries no id this provider can look up.
    Skipped,
    /// The provider call failed.
    Failed(ProviderError),
    /// The snapshot was fetched but the store rejected it.
    StoreFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCacheResult {
    pub integration_id: String,
    pub outcome: CacheOutcome,
}

/// Per-provider results of [`ResolutionManager::fetch_and_cache_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheReport {
    /// One entry per queried provider, sorted by integration id.
    pub results: Vec<ProviderCacheResult>,
    /// The input ids merged with every id learned from fetched snapshots.
    pub external_ids: ExternalIds,
}

impl CacheReport {
    /// Ids of providers whose snapshot was stored.
    pub fn cached(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.outcome == CacheOutcome::Cached)
            .map(|r| r.integration_id.as_str())
    }

    pub fn outcome(&self, integration_id: &str) -> Option<&CacheOutcome> {
        self.results
            .iter()
            .find(|r| r.integration_id == integration_id)
            .map(|r| &r.outcome)
    }
}

/// A value merged from several providers plus the providers that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    pub value: T,
    pub failures: Vec<ProviderFailure>,
}

/// Result of one integration's health check.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub integration_id: String,
    pub display_name: String,
    pub capabilities: CapabilitySet,
    pub result: ProviderResult<()>,
}

/// Orchestrates identification and snapshot caching across integrations.
pub struct ResolutionManager {
    settings: RwLock<Arc<MetadataSettings>>,
    integrations: RwLock<Arc<IntegrationRegistry>>,
    store: Arc<dyn SnapshotStore>,
}

impl std::fmt::Debug for ResolutionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionManager")
            .field("settings", &self.settings())
            .field("integrations", &self.integrations())
            .finish_non_exhaustive()
    }
}

impl ResolutionManager {
    pub fn new(
        settings: MetadataSettings,
        integrations: IntegrationRegistry,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            integrations: RwLock::new(Arc::new(integrations)),
            store,
        }
    }

    /// Build a manager and its integrations from a loaded [`Config`].
    pub fn from_config(config: &Config, store: Arc<dyn SnapshotStore>) -> Self {
        let registry = IntegrationRegistry::build(
            &config.integrations,
            config.http.policy(),
            &config.metadata.language,
        );
        Self::new(config.metadata.clone(), registry, store)
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<MetadataSettings> {
        Arc::clone(&self.settings.read())
    }

    /// Snapshot of the current integration registry.
    pub fn integrations(&self) -> Arc<IntegrationRegistry> {
        Arc::clone(&self.integrations.read())
    }

    /// A ready integration by id, e.g. to reach its sync capability.
    pub fn integration(&self, id: &str) -> Option<Arc<dyn Integration>> {
        self.integrations().get(id).cloned()
    }

    /// Validate and replace the settings used by subsequent calls.
    ///
    /// Calls already running keep the settings they started with. Clients
    /// are not rebuilt, so a language change reaches a client the next time
    /// it is reconfigured.
    pub fn update_settings(&self, mut settings: MetadataSettings) -> Result<(), ResolveError> {
        validate_settings(&mut settings).map_err(|e| ResolveError::InvalidSettings(format!("{e:#}")))?;
        info!(
            threshold = settings.auto_match_threshold,
            language = %settings.language,
            "Metadata settings updated"
        );
        *self.settings.write() = Arc::new(settings);
        Ok(())
    }

    /// Rebuild one integration from new configuration and swap it in.
    ///
    /// The live client is never mutated; callers holding the old registry
    /// keep using the old client.
    pub fn reconfigure_integration(&self, config: &IntegrationConfig) {
        let mut integrations = self.integrations.write();
        let next = integrations.with_reconfigured(config);
        info!(
            integration = %config.id,
            ready = next.get(&config.id).is_some(),
            "Integration reconfigured"
        );
        *integrations = Arc::new(next);
    }

    /// Search every ready provider for the media category and score the
    /// merged candidates against the query.
    ///
    /// `anime` selects the anime priority list in place of the movie or TV
    /// list. Providers are searched concurrently; a failed search is
    /// recorded in [`Identification::failures`] and the others still count.
    pub async fn identify(
        &self,
        title: &str,
        year: Option<i32>,
        media_type: MediaType,
        anime: bool,
    ) -> Result<Identification, ResolveError> {
        let settings = self.settings();
        let registry = self.integrations();

        let category = MediaCategory::for_media(media_type, anime);
        let providers = registry.metadata_providers(settings.priority_for(category), &settings, media_type);
        if providers.is_empty() {
            warn!(title, %media_type, ?category, "No ready metadata provider");
            return Err(ResolveError::Unresolved {
                media_type,
                failures: Vec::new(),
            });
        }

        let searches = providers.iter().map(|integration| async move {
            let result = search(integration.as_ref(), title, year, media_type).await;
            (integration.id(), result)
        });
        let responses = join_all(searches).await;

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        let mut answered = 0usize;
        for (integration_id, response) in responses {
            match response {
                Ok(results) => {
                    debug!(integration = integration_id, count = results.len(), "Search returned");
                    answered += 1;
                    candidates.extend(results);
                }
                Err(error) => {
                    warn!(integration = integration_id, %error, "Search failed");
                    failures.push(ProviderFailure {
                        integration_id: integration_id.to_string(),
                        error,
                    });
                }
            }
        }

        if answered == 0 {
            return Err(ResolveError::Unresolved { media_type, failures });
        }

        let scored = score_search_results(title, year, dedup_candidates(candidates));
        let outcome = match scored.first() {
            Some(best) if best.confidence >= settings.auto_match_threshold => {
                info!(
                    title,
                    matched = %best.result.title,
                    integration = %best.result.integration_id,
                    confidence = best.confidence,
                    "Identified"
                );
                IdentifyOutcome::Matched(best.clone())
            }
            best => {
                info!(
                    title,
                    candidates = scored.len(),
                    best_confidence = best.map(|b| b.confidence),
                    threshold = settings.auto_match_threshold,
                    "No match above threshold, returning suggestions"
                );
                IdentifyOutcome::Suggestions(scored)
            }
        };

        Ok(Identification { outcome, failures })
    }

    /// Fetch full details from every enabled, ready metadata provider and
    /// store one snapshot per provider.
    ///
    /// Each provider resolves its own local id from `ids`. Providers run
    /// concurrently and independently: one provider failing does not keep
    /// the others' snapshots from being stored. Ids learned from the fetched
    /// snapshots are merged and saved for `media_id`.
    ///
    /// When every provider that was queried failed, the call returns
    /// [`ResolveError::Unresolved`] with those failures, matching
    /// [`identify`](Self::identify). Providers skipped for lack of an id
    /// do not count as failures.
    pub async fn fetch_and_cache_all(
        &self,
        media_id: MediaId,
        ids: &ExternalIds,
        media_type: MediaType,
    ) -> Result<CacheReport, ResolveError> {
        if ids.is_empty() {
            return Err(ResolveError::NoIdentity);
        }
        let settings = self.settings();
        let registry = self.integrations();

        let providers: Vec<Arc<dyn Integration>> = registry
            .enabled(&settings)
            .filter(|i| i.as_metadata().is_some() && i.supports(media_type))
            .cloned()
            .collect();
        if providers.is_empty() {
            return Err(ResolveError::Unresolved {
                media_type,
                failures: Vec::new(),
            });
        }

        let fetches = providers
            .iter()
            .map(|integration| self.fetch_and_cache_one(integration.as_ref(), media_id, ids, media_type));
        let fetched = join_all(fetches).await;

        let mut external_ids = ids.clone();
        let mut results = Vec::with_capacity(fetched.len());
        for (result, learned) in fetched {
            if let Some(learned) = learned {
                external_ids.merge(&learned);
            }
            results.push(result);
        }

        let answered = results.iter().any(|r| {
            matches!(
                r.outcome,
                CacheOutcome::Cached | CacheOutcome::NotFound | CacheOutcome::StoreFailed(_)
            )
        });
        let failures: Vec<ProviderFailure> = results
            .iter()
            .filter_map(|r| match &r.outcome {
                CacheOutcome::Failed(error) => Some(ProviderFailure {
                    integration_id: r.integration_id.clone(),
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect();
        if !answered && !failures.is_empty() {
            warn!(%media_id, failed = failures.len(), "Every queried provider failed");
            return Err(ResolveError::Unresolved { media_type, failures });
        }

        if let Err(e) = self.store.save_external_ids(media_id, &external_ids).await {
            warn!(%media_id, "Failed to save external ids: {:#}", e);
        }

        let report = CacheReport { results, external_ids };
        info!(
            %media_id,
            cached = ?report.cached().collect::<Vec<_>>(),
            "Provider snapshots refreshed"
        );
        Ok(report)
    }

    async fn fetch_and_cache_one(
        &self,
        integration: &dyn Integration,
        media_id: MediaId,
        ids: &ExternalIds,
        media_type: MediaType,
    ) -> (ProviderCacheResult, Option<ExternalIds>) {
        let integration_id = integration.id();
        let done = |outcome| ProviderCacheResult {
            integration_id: integration_id.to_string(),
            outcome,
        };

        let Some(metadata) = integration.as_metadata() else {
            return (done(CacheOutcome::Skipped), None);
        };

        let local_id = match metadata.resolve_id(integration_id, ids, media_type).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(integration = integration_id, "No usable id, skipping");
                return (done(CacheOutcome::Skipped), None);
            }
            Err(error) => {
                warn!(integration = integration_id, %error, "Id resolution failed");
                return (done(CacheOutcome::Failed(error)), None);
            }
        };

        let details = match media_type {
            MediaType::Movie => metadata
                .movie_details(&local_id)
                .await
                .map(|d| d.map(SnapshotDetails::Movie)),
            MediaType::TvShow => metadata
                .show_details(&local_id)
                .await
                .map(|d| d.map(SnapshotDetails::Show)),
        };

        let details = match details {
            Ok(Some(details)) => details,
            Ok(None) => return (done(CacheOutcome::NotFound), None),
            Err(error) => {
                warn!(integration = integration_id, id = %local_id, %error, "Detail fetch failed");
                return (done(CacheOutcome::Failed(error)), None);
            }
        };

        let learned = details.external_ids().clone();
        let snapshot = ProviderSnapshot {
            integration_id: integration_id.to_string(),
            provider_item_id: local_id,
            fetched_at: Utc::now(),
            details,
        };
        match self.store.save_snapshot(media_id, snapshot).await {
            Ok(()) => (done(CacheOutcome::Cached), Some(learned)),
            Err(e) => {
                warn!(integration = integration_id, %media_id, "Failed to store snapshot: {:#}", e);
                (done(CacheOutcome::StoreFailed(format!("{e:#}"))), Some(learned))
            }
        }
    }

    /// Ratings from every ready ratings provider that feeds an allowed
    /// source, restricted to the allowed sources.
    pub async fn fetch_ratings(&self, ids: &ExternalIds, media_type: MediaType) -> Collected<AggregateRatings> {
        let settings = self.settings();
        let registry = self.integrations();

        let providers: Vec<&Arc<dyn Integration>> = registry
            .enabled(&settings)
            .filter(|i| i.as_ratings().is_some() && i.supports(media_type))
            .filter(|i| feeds_allowed_source(i.rating_sources(), &settings.rating_sources))
            .collect();

        let fetches = providers.iter().map(|integration| async move {
            let result = match integration.as_ratings() {
                Some(ratings) => match media_type {
                    MediaType::Movie => ratings.movie_ratings(ids).await,
                    MediaType::TvShow => ratings.show_ratings(ids).await,
                },
                None => Ok(AggregateRatings::default()),
            };
            (integration.id(), result)
        });

        let mut collected = merge_collected(join_all(fetches).await, AggregateRatings::merge);
        collected.value.retain_sources(&settings.rating_sources);
        collected
    }

    /// Artwork from every ready artwork provider, merged in id order.
    pub async fn fetch_artwork(&self, ids: &ExternalIds, media_type: MediaType) -> Collected<Artwork> {
        let settings = self.settings();
        let registry = self.integrations();

        let providers: Vec<&Arc<dyn Integration>> = registry
            .enabled(&settings)
            .filter(|i| i.as_artwork().is_some() && i.supports(media_type))
            .collect();

        let fetches = providers.iter().map(|integration| async move {
            let result = match integration.as_artwork() {
                Some(artwork) => match media_type {
                    MediaType::Movie => artwork.movie_artwork(ids).await,
                    MediaType::TvShow => artwork.show_artwork(ids).await,
                },
                None => Ok(Artwork::default()),
            };
            (integration.id(), result)
        });

        merge_collected(join_all(fetches).await, |merged: &mut Artwork, artwork| {
            merged.posters.extend(artwork.posters);
            merged.backdrops.extend(artwork.backdrops);
            merged.logos.extend(artwork.logos);
            merged.thumbs.extend(artwork.thumbs);
        })
    }

    /// Run the connection test of every ready, enabled integration
    /// concurrently.
    pub async fn test_connections(&self) -> Vec<ConnectionStatus> {
        let settings = self.settings();
        let registry = self.integrations();
        let checks = registry.enabled(&settings).map(|integration| async move {
            let result = integration.test_connection().await;
            if let Err(error) = &result {
                warn!(integration = integration.id(), %error, "Connection test failed");
            }
            ConnectionStatus {
                integration_id: integration.id().to_string(),
                display_name: integration.display_name().to_string(),
                capabilities: CapabilitySet::of(integration.as_ref()),
                result,
            }
        });
        join_all(checks).await
    }
}

async fn search(
    integration: &dyn Integration,
    title: &str,
    year: Option<i32>,
    media_type: MediaType,
) -> ProviderResult<Vec<SearchResult>> {
    let Some(metadata) = integration.as_metadata() else {
        return Ok(Vec::new());
    };
    match media_type {
        MediaType::Movie => metadata.search_movies(title, year).await,
        MediaType::TvShow => metadata.search_shows(title, year).await,
    }
}

/// Drop repeats of a candidate from the same integration, keeping the first.
/// The same title from different integrations is kept once per integration.
fn dedup_candidates(candidates: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.integration_id.clone(), c.id.clone())))
        .collect()
}

fn feeds_allowed_source(sources: &[&str], allowed: &[String]) -> bool {
    allowed.is_empty()
        || sources
            .iter()
            .any(|source| allowed.iter().any(|a| a.eq_ignore_ascii_case(source)))
}

fn merge_collected<T: Default>(
    responses: Vec<(&'static str, ProviderResult<T>)>,
    mut merge: impl FnMut(&mut T, T),
) -> Collected<T> {
    let mut value = T::default();
    let mut failures = Vec::new();
    for (integration_id, response) in responses {
        match response {
            Ok(part) => merge(&mut value, part),
            Err(error) => {
                warn!(integration = integration_id, %error, "Provider call failed");
                failures.push(ProviderFailure {
                    integration_id: integration_id.to_string(),
                    error,
                });
            }
        }
    }
    Collected { value, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::cache::InMemorySnapshotStore;
    use crate::metadata::http::HttpPolicy;
    use crate::metadata::provider::{MetadataCapability, RatingsCapability};
    use crate::metadata::types::{
        EpisodeDetails, MovieDetails, RatingValue, SeasonDetails, ShowDetails,
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    /// Canned provider. Search and detail answers are fixed at construction.
    struct StubIntegration {
        id: &'static str,
        media_types: &'static [MediaType],
        search: ProviderResult<Vec<SearchResult>>,
        movie: ProviderResult<Option<MovieDetails>>,
        ratings: Option<AggregateRatings>,
    }

    impl StubIntegration {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                media_types: &[MediaType::Movie, MediaType::TvShow],
                search: Ok(Vec::new()),
                movie: Ok(None),
                ratings: None,
            }
        }

        fn with_results(mut self, results: Vec<SearchResult>) -> Self {
            self.search = Ok(results);
            self
        }

        fn failing(mut self, error: ProviderError) -> Self {
            self.search = Err(error.clone());
            self.movie = Err(error);
            self
        }

        fn with_movie(mut self, movie: MovieDetails) -> Self {
            self.movie = Ok(Some(movie));
            self
        }

        fn with_ratings(mut self, source: &str, value: f64) -> Self {
            let mut ratings = AggregateRatings::default();
            ratings.insert(RatingValue {
                source: source.to_string(),
                value,
                max: 10.0,
                votes: None,
            });
            self.ratings = Some(ratings);
            self
        }
    }

    #[async_trait]
    impl Integration for StubIntegration {
        fn id(&self) -> &'static str {
            self.id
        }

        fn display_name(&self) -> &'static str {
            self.id
        }

        fn requires_api_key(&self) -> bool {
            false
        }

        fn supported_media_types(&self) -> &'static [MediaType] {
            self.media_types
        }

        fn rating_sources(&self) -> &'static [&'static str] {
            match self.id {
                "omdb" => &["imdb"],
                _ => &[],
            }
        }

        fn initialize(&mut self, _config: &IntegrationConfig) {}

        fn is_ready(&self) -> bool {
            true
        }

        async fn test_connection(&self) -> ProviderResult<()> {
            self.search.clone().map(|_| ())
        }

        fn as_metadata(&self) -> Option<&dyn MetadataCapability> {
            if self.ratings.is_some() {
                None
            } else {
                Some(self)
            }
        }

        fn as_ratings(&self) -> Option<&dyn RatingsCapability> {
            self.ratings.as_ref().map(|_| self as &dyn RatingsCapability)
        }
    }

    #[async_trait]
    impl MetadataCapability for StubIntegration {
        async fn search_movies(&self, _query: &str, _year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
            self.search.clone()
        }

        async fn search_shows(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
            self.search_movies(query, year).await
        }

        async fn movie_details(&self, _id: &str) -> ProviderResult<Option<MovieDetails>> {
            self.movie.clone()
        }

        async fn show_details(&self, _id: &str) -> ProviderResult<Option<ShowDetails>> {
            Err(ProviderError::not_supported(self.id, "show details"))
        }

        async fn season_details(&self, _show_id: &str, _season: u32) -> ProviderResult<Option<SeasonDetails>> {
            Ok(None)
        }

        async fn episode_details(
            &self,
            _show_id: &str,
            _season: u32,
            _episode: u32,
        ) -> ProviderResult<Option<EpisodeDetails>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl RatingsCapability for StubIntegration {
        async fn movie_ratings(&self, _ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
            Ok(self.ratings.clone().unwrap_or_default())
        }

        async fn show_ratings(&self, _ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
            Ok(self.ratings.clone().unwrap_or_default())
        }
    }

    fn movie(integration: &str, id: &str, title: &str, date: &str) -> SearchResult {
        let mut result = SearchResult::new(integration, id, title, MediaType::Movie);
        result.release_date = Some(date.to_string());
        result
    }

    fn matrix_results(integration: &str) -> Vec<SearchResult> {
        vec![
            movie(integration, "604", "The Matrix Reloaded", "2003-05-15"),
            movie(integration, "603", "The Matrix", "1999-03-31"),
            movie(integration, "605", "The Matrix Revolutions", "2003-11-05"),
        ]
    }

    fn settings(movie_priority: &[&str]) -> MetadataSettings {
        MetadataSettings {
            movie_priority: movie_priority.iter().map(|s| s.to_string()).collect(),
            ..MetadataSettings::default()
        }
    }

    fn manager(settings: MetadataSettings, stubs: Vec<StubIntegration>) -> (ResolutionManager, Arc<InMemorySnapshotStore>) {
        let mut registry = IntegrationRegistry::empty(HttpPolicy::default(), "en-US");
        for stub in stubs {
            registry.register(Arc::new(stub));
        }
        let store = Arc::new(InMemorySnapshotStore::new());
        let manager = ResolutionManager::new(settings, registry, store.clone());
        (manager, store)
    }

    #[tokio::test]
    async fn exact_match_is_accepted() {
        let (manager, _) = manager(
            settings(&["tmdb"]),
            vec![StubIntegration::new("tmdb").with_results(matrix_results("tmdb"))],
        );

        let identification = manager
            .identify("The Matrix", Some(1999), MediaType::Movie, false)
            .await
            .unwrap();

        let best = identification.matched().unwrap();
        assert_eq!(best.result.id, "603");
        assert!(best.confidence >= 0.85);
        assert!(identification.failures.is_empty());
    }

    #[tokio::test]
    async fn below_threshold_returns_ranked_suggestions() {
        let (manager, _) = manager(
            settings(&["tmdb"]),
            vec![StubIntegration::new("tmdb").with_results(matrix_results("tmdb"))],
        );

        let identification = manager
            .identify("Matrix Reloaded", Some(2010), MediaType::Movie, false)
            .await
            .unwrap();

        assert!(identification.matched().is_none());
        let suggestions = identification.suggestions();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].result.id, "604");
        assert!(suggestions
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }

    #[tokio::test]
    async fn no_candidates_is_empty_suggestions_not_error() {
        let (manager, _) = manager(settings(&["tmdb"]), vec![StubIntegration::new("tmdb")]);

        let identification = manager
            .identify("Nothing Like This", None, MediaType::Movie, false)
            .await
            .unwrap();
        assert_matches!(identification.outcome, IdentifyOutcome::Suggestions(ref s) if s.is_empty());
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_abort_identify() {
        let (manager, _) = manager(
            settings(&["tvdb", "tmdb"]),
            vec![
                StubIntegration::new("tvdb").failing(ProviderError::Server { status: 503 }),
                StubIntegration::new("tmdb").with_results(matrix_results("tmdb")),
            ],
        );

        let identification = manager
            .identify("The Matrix", Some(1999), MediaType::Movie, false)
            .await
            .unwrap();

        assert_eq!(identification.matched().unwrap().result.integration_id, "tmdb");
        assert_eq!(identification.failures.len(), 1);
        assert_eq!(identification.failures[0].integration_id, "tvdb");
        assert_eq!(identification.failures[0].error, ProviderError::Server { status: 503 });
    }

    #[tokio::test]
    async fn all_failing_is_unresolved() {
        let (manager, _) = manager(
            settings(&["tvdb", "tmdb"]),
            vec![
                StubIntegration::new("tvdb").failing(ProviderError::Timeout(std::time::Duration::from_secs(1))),
                StubIntegration::new("tmdb").failing(ProviderError::Server { status: 500 }),
            ],
        );

        let err = manager
            .identify("The Matrix", Some(1999), MediaType::Movie, false)
            .await
            .unwrap_err();
        assert_matches!(err, ResolveError::Unresolved { media_type: MediaType::Movie, ref failures } if failures.len() == 2);
    }

    #[tokio::test]
    async fn no_ready_provider_is_unresolved() {
        let (manager, _) = manager(settings(&["tmdb"]), Vec::new());
        let err = manager
            .identify("The Matrix", None, MediaType::Movie, false)
            .await
            .unwrap_err();
        assert_matches!(err, ResolveError::Unresolved { ref failures, .. } if failures.is_empty());
    }

    #[tokio::test]
    async fn anime_flag_uses_anime_priority() {
        let mut settings = settings(&["tmdb"]);
        settings.anime_priority = vec!["anilist".to_string()];
        let (manager, _) = manager(
            settings,
            vec![
                StubIntegration::new("tmdb").with_results(matrix_results("tmdb")),
                StubIntegration::new("anilist").with_results(vec![movie("anilist", "1", "Akira", "1988")]),
            ],
        );

        let identification = manager
            .identify("Akira", Some(1988), MediaType::Movie, true)
            .await
            .unwrap();
        assert_eq!(identification.matched().unwrap().result.integration_id, "anilist");

        assert!(manager.integration("tmdb").is_some());
    }

    #[tokio::test]
    async fn same_provider_duplicates_collapse_but_cross_provider_kept() {
        let mut results = matrix_results("tmdb");
        results.push(movie("tmdb", "603", "The Matrix", "1999-03-31"));
        let (manager, _) = manager(
            settings(&["tmdb", "anilist"]),
            vec![
                StubIntegration::new("tmdb").with_results(results),
                StubIntegration::new("anilist").with_results(vec![movie("anilist", "9", "The Matrix", "1999")]),
            ],
        );
        let mut strict = (*manager.settings()).clone();
        strict.auto_match_threshold = 1.0;
        manager.update_settings(strict).unwrap();

        let identification = manager
            .identify("The Matrix", None, MediaType::Movie, false)
            .await
            .unwrap();
        let suggestions = identification.suggestions();
        assert_eq!(suggestions.len(), 4);
        let exact: Vec<_> = suggestions
            .iter()
            .filter(|s| s.result.title == "The Matrix")
            .map(|s| s.result.integration_id.as_str())
            .collect();
        // Equal confidence, no popularity: priority order decides.
        assert_eq!(exact, ["tmdb", "anilist"]);
    }

    #[tokio::test]
    async fn update_settings_applies_to_later_calls() {
        let (manager, _) = manager(
            settings(&["tmdb"]),
            vec![StubIntegration::new("tmdb").with_results(vec![movie("tmdb", "1", "Matrx", "1999")])],
        );

        let first = manager
            .identify("The Matrix", Some(1999), MediaType::Movie, false)
            .await
            .unwrap();
        assert!(first.matched().is_some());

        let mut strict = (*manager.settings()).clone();
        strict.auto_match_threshold = 0.99;
        manager.update_settings(strict).unwrap();

        let second = manager
            .identify("The Matrix", Some(1999), MediaType::Movie, false)
            .await
            .unwrap();
        assert!(second.matched().is_none());
        assert_eq!(second.suggestions().len(), 1);
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let (manager, _) = manager(settings(&["tmdb"]), Vec::new());
        let mut bad = (*manager.settings()).clone();
        bad.auto_match_threshold = 1.5;

        assert_matches!(manager.update_settings(bad), Err(ResolveError::InvalidSettings(_)));
        assert!((manager.settings().auto_match_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn settings_snapshot_survives_update() {
        let (manager, _) = manager(settings(&["tmdb"]), Vec::new());
        let before = manager.settings();

        let mut next = (*before).clone();
        next.language = "de-DE".to_string();
        manager.update_settings(next).unwrap();

        assert_eq!(before.language, "en-US");
        assert_eq!(manager.settings().language, "de-DE");
    }

    #[tokio::test]
    async fn fetch_and_cache_all_isolates_failures() {
        let tmdb_movie = MovieDetails {
            title: "The Matrix".to_string(),
            external_ids: ExternalIds::default().with("tmdb", "603").with("imdb", "tt0133093"),
            ..Default::default()
        };
        let (manager, store) = manager(
            settings(&["tmdb"]),
            vec![
                StubIntegration::new("tmdb").with_movie(tmdb_movie),
                StubIntegration::new("tvdb").failing(ProviderError::Server { status: 502 }),
                StubIntegration::new("anilist"),
            ],
        );
        let media = MediaId::new();
        let ids = ExternalIds::default().with("tmdb", "603").with("tvdb", "1").with("anilist", "2");

        let report = manager
            .fetch_and_cache_all(media, &ids, MediaType::Movie)
            .await
            .unwrap();

        assert_eq!(report.outcome("tmdb"), Some(&CacheOutcome::Cached));
        assert_matches!(report.outcome("tvdb"), Some(CacheOutcome::Failed(ProviderError::Server { status: 502 })));
        assert_eq!(report.outcome("anilist"), Some(&CacheOutcome::NotFound));
        assert_eq!(report.external_ids.get("imdb"), Some("tt0133093"));

        assert_eq!(store.len(), 1);
        let stored = store.load_external_ids(media).await.unwrap().unwrap();
        assert_eq!(stored.get("imdb"), Some("tt0133093"));
    }

    #[tokio::test]
    async fn fetch_and_cache_all_with_every_provider_failing_is_unresolved() {
        let (manager, store) = manager(
            settings(&["tmdb"]),
            vec![
                StubIntegration::new("tmdb").failing(ProviderError::Timeout(std::time::Duration::from_secs(10))),
                StubIntegration::new("tvdb").failing(ProviderError::Server { status: 503 }),
                StubIntegration::new("anilist").with_movie(MovieDetails::default()),
            ],
        );
        let media = MediaId::new();
        let ids = ExternalIds::default().with("tmdb", "603").with("tvdb", "1");

        let err = manager
            .fetch_and_cache_all(media, &ids, MediaType::Movie)
            .await
            .unwrap_err();

        let failures = assert_matches!(
            err,
            ResolveError::Unresolved { media_type: MediaType::Movie, failures } => failures
        );
        let mut failed: Vec<_> = failures.iter().map(|f| f.integration_id.as_str()).collect();
        failed.sort();
        assert_eq!(failed, ["tmdb", "tvdb"]);
        assert_eq!(store.len(), 0);
        assert!(store.load_external_ids(media).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_and_cache_all_skips_providers_without_ids() {
        let (manager, store) = manager(
            settings(&["tmdb"]),
            vec![
                StubIntegration::new("tmdb").with_movie(MovieDetails::default()),
                StubIntegration::new("tvdb").with_movie(MovieDetails::default()),
            ],
        );
        let media = MediaId::new();

        let report = manager
            .fetch_and_cache_all(media, &ExternalIds::default().with("tmdb", "603"), MediaType::Movie)
            .await
            .unwrap();

        assert_eq!(report.outcome("tvdb"), Some(&CacheOutcome::Skipped));
        assert_eq!(report.cached().collect::<Vec<_>>(), ["tmdb"]);
        assert!(store.load_snapshot(media, "tvdb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refetch_overwrites_snapshot() {
        let (manager, store) = manager(
            settings(&["tmdb"]),
            vec![StubIntegration::new("tmdb").with_movie(MovieDetails {
                title: "The Matrix".to_string(),
                ..Default::default()
            })],
        );
        let media = MediaId::new();
        let ids = ExternalIds::default().with("tmdb", "603");

        manager.fetch_and_cache_all(media, &ids, MediaType::Movie).await.unwrap();
        manager.fetch_and_cache_all(media, &ids, MediaType::Movie).await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fetch_without_identity_fails() {
        let (manager, _) = manager(settings(&["tmdb"]), vec![StubIntegration::new("tmdb")]);
        let err = manager
            .fetch_and_cache_all(MediaId::new(), &ExternalIds::default(), MediaType::Movie)
            .await
            .unwrap_err();
        assert_matches!(err, ResolveError::NoIdentity);
    }

    #[tokio::test]
    async fn ratings_follow_allow_list() {
        let mut settings = settings(&["tmdb"]);
        settings.rating_sources = vec!["imdb".to_string()];
        let (manager, _) = manager(
            settings,
            vec![
                StubIntegration::new("omdb").with_ratings("imdb", 8.7),
                StubIntegration::new("trakt").with_ratings("trakt", 8.1),
            ],
        );

        let collected = manager
            .fetch_ratings(&ExternalIds::default().with("imdb", "tt0133093"), MediaType::Movie)
            .await;
        assert!(collected.failures.is_empty());
        assert_eq!(collected.value.ratings.len(), 1);
        assert_eq!(collected.value.get("imdb").unwrap().value, 8.7);
    }

    #[tokio::test]
    async fn connection_tests_report_each_integration() {
        let (manager, _) = manager(
            settings(&["tmdb"]),
            vec![
                StubIntegration::new("tmdb"),
                StubIntegration::new("tvdb").failing(ProviderError::Unauthorized("bad key".into())),
            ],
        );

        let statuses = manager.test_connections().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].integration_id, "tmdb");
        assert!(statuses[0].result.is_ok());
        assert!(statuses[0].capabilities.metadata);
        assert_matches!(statuses[1].result, Err(ProviderError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reconfigure_swaps_registry() {
        let (manager, _) = manager(settings(&["tmdb"]), Vec::new());
        assert!(manager.integration("omdb").is_none());

        manager.reconfigure_integration(&IntegrationConfig::new("omdb").with_api_key("k"));
        assert!(manager.integration("omdb").is_some());

        manager.reconfigure_integration(&IntegrationConfig::new("omdb"));
        assert!(manager.integration("omdb").is_none());
    }
}
