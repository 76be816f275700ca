//! Provider-independent data model.
//!
//! Every provider client translates its catalog's response shapes into these
//! records, so scoring, orchestration and caching never see provider-specific
//! JSON.

use chrono::{DateTime, Utc};
use reelmatch_common::MediaType;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// A single candidate returned by a provider search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the integration that produced this result (e.g. `"tmdb"`).
    pub integration_id: String,
    /// Provider-local identifier of the candidate.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Original-language title, if the provider reports one.
    pub original_title: Option<String>,
    /// Release or premiere year.
    pub year: Option<i32>,
    /// Release or first-air date as reported (usually `YYYY-MM-DD`).
    pub release_date: Option<String>,
    /// Synopsis.
    pub overview: Option<String>,
    /// Poster URL or path.
    pub poster_path: Option<String>,
    /// Backdrop URL or path.
    pub backdrop_path: Option<String>,
    /// Whether the candidate is a movie or a show.
    pub media_type: MediaType,
    /// Provider-reported popularity, higher is more popular.
    pub popularity: Option<f64>,
    /// Provider-reported vote average.
    pub vote_average: Option<f64>,
}

impl SearchResult {
    /// Create a result with only the required fields populated.
    pub fn new(
        integration_id: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        Self {
            integration_id: integration_id.into(),
            id: id.into(),
            title: title.into(),
            original_title: None,
            year: None,
            release_date: None,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            media_type,
            popularity: None,
            vote_average: None,
        }
    }

    /// The best date-ish string to compare years against: the full release
    /// date when known, otherwise the bare year.
    pub fn date_or_year(&self) -> Option<String> {
        self.release_date
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.year.map(|y| y.to_string()))
    }
}

/// A [`SearchResult`] with the confidence it scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSearchResult {
    /// The underlying candidate.
    #[serde(flatten)]
    pub result: SearchResult,
    /// Match confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// External ids
// ---------------------------------------------------------------------------

/// Sparse mapping of catalog name to that catalog's identifier for one title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anidb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<String>,
}

impl ExternalIds {
    /// Look up the id for a catalog by name.
    pub fn get(&self, catalog: &str) -> Option<&str> {
        match catalog {
            "tmdb" => self.tmdb.as_deref(),
            "tvdb" => self.tvdb.as_deref(),
            "imdb" => self.imdb.as_deref(),
            "anidb" => self.anidb.as_deref(),
            "anilist" => self.anilist.as_deref(),
            "mal" => self.mal.as_deref(),
            "trakt" => self.trakt.as_deref(),
            _ => None,
        }
    }

    /// Set the id for a catalog by name. Unknown catalog names are ignored
    /// and reported as `false`.
    pub fn set(&mut self, catalog: &str, id: impl Into<String>) -> bool {
        let slot = match catalog {
            "tmdb" => &mut self.tmdb,
            "tvdb" => &mut self.tvdb,
            "imdb" => &mut self.imdb,
            "anidb" => &mut self.anidb,
            "anilist" => &mut self.anilist,
            "mal" => &mut self.mal,
            "trakt" => &mut self.trakt,
            _ => return false,
        };
        let id = id.into();
        if id.is_empty() {
            return false;
        }
        *slot = Some(id);
        true
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, catalog: &str, id: impl Into<String>) -> Self {
        self.set(catalog, id);
        self
    }

    /// Whether no catalog id is known.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Fill gaps in `self` from `other`; ids already present are kept.
    pub fn merge(&mut self, other: &ExternalIds) {
        for (catalog, id) in other.iter() {
            if self.get(catalog).is_none() {
                self.set(catalog, id);
            }
        }
    }

    /// Iterate over `(catalog, id)` pairs that are present.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("tmdb", self.tmdb.as_deref()),
            ("tvdb", self.tvdb.as_deref()),
            ("imdb", self.imdb.as_deref()),
            ("anidb", self.anidb.as_deref()),
            ("anilist", self.anilist.as_deref()),
            ("mal", self.mal.as_deref()),
            ("trakt", self.trakt.as_deref()),
        ]
        .into_iter()
        .filter_map(|(catalog, id)| id.map(|id| (catalog, id)))
    }

    /// Identity established by an accepted search result: the id the
    /// integration reported, keyed by that integration.
    pub fn from_search_result(result: &SearchResult) -> Self {
        Self::default().with(&result.integration_id, result.id.clone())
    }
}

// ---------------------------------------------------------------------------
// Ratings and artwork
// ---------------------------------------------------------------------------

/// One rating as reported by one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingValue {
    /// Rating source name (e.g. `"imdb"`, `"rotten_tomatoes"`).
    pub source: String,
    /// Score on the source's own scale.
    pub value: f64,
    /// Maximum of the source's scale (10, 100, ...).
    pub max: f64,
    /// Number of votes, when reported.
    pub votes: Option<u64>,
}

impl RatingValue {
    /// Score rescaled to `0.0..=10.0`.
    pub fn normalized(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.value / self.max * 10.0).clamp(0.0, 10.0)
    }
}

/// Ratings for one title across sources. Empty when no source had data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRatings {
    pub ratings: Vec<RatingValue>,
}

impl AggregateRatings {
    /// Whether no rating is populated.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Rating for a given source, if present.
    pub fn get(&self, source: &str) -> Option<&RatingValue> {
        self.ratings.iter().find(|r| r.source == source)
    }

    /// Add or replace the rating for `rating.source`.
    pub fn insert(&mut self, rating: RatingValue) {
        match self.ratings.iter_mut().find(|r| r.source == rating.source) {
            Some(existing) => *existing = rating,
            None => self.ratings.push(rating),
        }
    }

    /// Merge in ratings from another aggregate, keeping ours on conflict.
    pub fn merge(&mut self, other: AggregateRatings) {
        for rating in other.ratings {
            if self.get(&rating.source).is_none() {
                self.ratings.push(rating);
            }
        }
    }

    /// Drop every rating whose source is not in `allowed`. An empty
    /// allow-list keeps everything.
    pub fn retain_sources(&mut self, allowed: &[String]) {
        if allowed.is_empty() {
            return;
        }
        self.ratings
            .retain(|r| allowed.iter().any(|a| a.eq_ignore_ascii_case(&r.source)));
    }
}

/// A single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Fully-qualified URL.
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// ISO-639-1 language of any text in the image.
    pub language: Option<String>,
    /// Community score, higher is better.
    pub score: Option<f64>,
}

/// Images for one title, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub posters: Vec<ImageAsset>,
    pub backdrops: Vec<ImageAsset>,
    pub logos: Vec<ImageAsset>,
    pub thumbs: Vec<ImageAsset>,
}

impl Artwork {
    pub fn is_empty(&self) -> bool {
        self.posters.is_empty()
            && self.backdrops.is_empty()
            && self.logos.is_empty()
            && self.thumbs.is_empty()
    }

    /// Highest-scored poster.
    pub fn best_poster(&self) -> Option<&ImageAsset> {
        best_by_score(&self.posters)
    }

    /// Highest-scored backdrop.
    pub fn best_backdrop(&self) -> Option<&ImageAsset> {
        best_by_score(&self.backdrops)
    }
}

fn best_by_score(images: &[ImageAsset]) -> Option<&ImageAsset> {
    images.iter().max_by(|a, b| {
        a.score
            .unwrap_or(0.0)
            .partial_cmp(&b.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

// ---------------------------------------------------------------------------
// Detail records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
    pub order: Option<u32>,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
    pub department: Option<String>,
}

/// Certification for one country (e.g. `US` / `PG-13`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRating {
    pub country: String,
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    pub name: String,
    pub url: String,
    pub site: Option<String>,
}

/// Full movie record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub ratings: AggregateRatings,
    pub artwork: Artwork,
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
    pub content_ratings: Vec<ContentRating>,
    pub trailers: Vec<Trailer>,
    pub external_ids: ExternalIds,
}

/// Season entry inside a [`ShowDetails`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    pub name: Option<String>,
    pub episode_count: Option<u32>,
    pub air_date: Option<String>,
    pub poster_url: Option<String>,
}

/// Full show record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowDetails {
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub year: Option<i32>,
    pub status: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub networks: Vec<String>,
    pub ratings: AggregateRatings,
    pub artwork: Artwork,
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
    pub content_ratings: Vec<ContentRating>,
    pub trailers: Vec<Trailer>,
    pub seasons: Vec<SeasonSummary>,
    pub external_ids: ExternalIds,
}

/// Full season record including its episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetails {
    pub show_id: String,
    pub season_number: u32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub poster_url: Option<String>,
    pub episodes: Vec<EpisodeDetails>,
    pub external_ids: ExternalIds,
}

/// Full episode record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub season_number: u32,
    pub episode_number: u32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub still_url: Option<String>,
    pub rating: Option<f64>,
    pub external_ids: ExternalIds,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Detail payload of a cached snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "details", rename_all = "lowercase")]
pub enum SnapshotDetails {
    Movie(MovieDetails),
    Show(ShowDetails),
}

impl SnapshotDetails {
    pub fn title(&self) -> &str {
        match self {
            Self::Movie(m) => &m.title,
            Self::Show(s) => &s.title,
        }
    }

    pub fn external_ids(&self) -> &ExternalIds {
        match self {
            Self::Movie(m) => &m.external_ids,
            Self::Show(s) => &s.external_ids,
        }
    }
}

/// One provider's full detail record for one media item, as handed to the
/// storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// Integration that produced the record.
    pub integration_id: String,
    /// Provider-local id the record was fetched with.
    pub provider_item_id: String,
    pub fetched_at: DateTime<Utc>,
    pub details: SnapshotDetails,
}

// ---------------------------------------------------------------------------
// Watch history
// ---------------------------------------------------------------------------

/// Episode coordinates within a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

/// A movie or an episode, addressed by the show's or movie's external ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    pub media_type: MediaType,
    pub external_ids: ExternalIds,
    /// Set for episodes; `external_ids` then identify the show.
    pub episode: Option<EpisodeRef>,
}

impl SyncItem {
    pub fn movie(external_ids: ExternalIds) -> Self {
        Self {
            media_type: MediaType::Movie,
            external_ids,
            episode: None,
        }
    }

    pub fn episode(show_ids: ExternalIds, season: u32, episode: u32) -> Self {
        Self {
            media_type: MediaType::TvShow,
            external_ids: show_ids,
            episode: Some(EpisodeRef { season, episode }),
        }
    }
}

/// One entry of a remote watch history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryEntry {
    pub item: SyncItem,
    pub title: String,
    pub year: Option<i32>,
    pub watched_at: DateTime<Utc>,
}

/// Outcome of a mark-watched request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub added_movies: u32,
    pub added_episodes: u32,
    pub not_found: u32,
}
