//! TMDB (The Movie Database) provider.
//!
//! Implements the Metadata, Ratings and Artwork capabilities against the
//! TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - Shared retry, backoff and deadline handling from [`ApiClient`].
//! - Authentication by `api_key` query parameter, or by bearer header when
//!   the configured key is a v4 read access token.
//! - Cross-catalog id lookup through `/find` when only an IMDb or TVDB id is
//!   known.

use async_trait::async_trait;
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{non_empty, year_of, TMDB_ID};
use crate::config::IntegrationConfig;
use crate::metadata::http::{ApiClient, HttpPolicy};
use crate::metadata::provider::{
    ArtworkCapability, Integration, MetadataCapability, RatingsCapability,
};
use crate::metadata::types::{
    AggregateRatings, Artwork, CastMember, ContentRating, CrewMember, EpisodeDetails, ExternalIds,
    ImageAsset, MovieDetails, RatingValue, SearchResult, SeasonDetails, SeasonSummary,
    ShowDetails, Trailer,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const REQUESTS_PER_SECOND: u32 = 4;
const MOVIE_APPENDS: &str = "external_ids,credits,release_dates,videos,images";
const SHOW_APPENDS: &str = "external_ids,credits,content_ratings,videos,images";
const IMAGE_LANGUAGES: &str = "en,null";

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    popularity: Option<f64>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    popularity: Option<f64>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    tagline: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    status: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    #[serde(default)]
    genres: Vec<TmdbNamed>,
    #[serde(default)]
    production_companies: Vec<TmdbNamed>,
    imdb_id: Option<String>,
    external_ids: Option<TmdbExternalIds>,
    credits: Option<TmdbCredits>,
    release_dates: Option<TmdbReleaseDates>,
    videos: Option<TmdbVideos>,
    images: Option<TmdbImagesResponse>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    last_air_date: Option<String>,
    status: Option<String>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    #[serde(default)]
    genres: Vec<TmdbNamed>,
    #[serde(default)]
    networks: Vec<TmdbNamed>,
    #[serde(default)]
    seasons: Vec<TmdbSeasonSummary>,
    external_ids: Option<TmdbExternalIds>,
    credits: Option<TmdbCredits>,
    content_ratings: Option<TmdbContentRatings>,
    videos: Option<TmdbVideos>,
    images: Option<TmdbImagesResponse>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonSummary {
    season_number: u32,
    name: Option<String>,
    episode_count: Option<u32>,
    air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetail {
    season_number: u32,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    season_number: u32,
    episode_number: u32,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    runtime: Option<u32>,
    still_path: Option<String>,
    vote_average: Option<f64>,
    id: Option<u64>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbNamed {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCast>,
    #[serde(default)]
    crew: Vec<TmdbCrew>,
}

#[derive(Debug, Deserialize)]
struct TmdbCast {
    name: String,
    character: Option<String>,
    order: Option<u32>,
    profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbCrew {
    name: String,
    job: String,
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbReleaseDates {
    #[serde(default)]
    results: Vec<TmdbCountryReleases>,
}

#[derive(Debug, Deserialize)]
struct TmdbCountryReleases {
    iso_3166_1: String,
    #[serde(default)]
    release_dates: Vec<TmdbReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct TmdbReleaseDate {
    #[serde(default)]
    certification: String,
}

#[derive(Debug, Deserialize)]
struct TmdbContentRatings {
    #[serde(default)]
    results: Vec<TmdbContentRating>,
}

#[derive(Debug, Deserialize)]
struct TmdbContentRating {
    iso_3166_1: String,
    rating: String,
}

#[derive(Debug, Deserialize)]
struct TmdbVideos {
    #[serde(default)]
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    key: String,
    name: String,
    site: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbImagesResponse {
    #[serde(default)]
    posters: Vec<TmdbImage>,
    #[serde(default)]
    backdrops: Vec<TmdbImage>,
    #[serde(default)]
    logos: Vec<TmdbImage>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
    width: Option<u32>,
    height: Option<u32>,
    iso_639_1: Option<String>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbFindHit>,
    #[serde(default)]
    tv_results: Vec<TmdbFindHit>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbVotes {
    vote_average: Option<f64>,
    vote_count: Option<u64>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB provider.
///
/// # Examples
///
/// ```no_run
/// use reelmatch::config::IntegrationConfig;
/// use reelmatch::metadata::http::HttpPolicy;
/// use reelmatch::metadata::provider::Integration;
/// use reelmatch::metadata::providers::TmdbProvider;
///
/// let mut provider = TmdbProvider::new(HttpPolicy::default(), "en-US");
/// provider.initialize(&IntegrationConfig::new("tmdb").with_api_key("your-api-key"));
/// assert!(provider.is_ready());
/// ```
#[derive(Debug)]
pub struct TmdbProvider {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl TmdbProvider {
    /// Create an unconfigured client. `language` is an IETF tag such as
    /// `"en-US"`.
    pub fn new(policy: HttpPolicy, language: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(TMDB_ID, policy).with_rate_limit(REQUESTS_PER_SECOND),
            base_url: TMDB_BASE_URL.to_string(),
            api_key: None,
            language: language.into(),
        }
    }

    /// GET `path` with authentication and language applied.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(TMDB_ID))?;
        let url = format!("{}{}", self.base_url, path);
        debug!(path, "TMDB request");

        self.api
            .get_json(|http| {
                let request = http
                    .get(&url)
                    .query(&[("language", self.language.as_str())])
                    .query(params);
                // v4 read access tokens are JWTs; v3 keys are hex.
                if api_key.starts_with("eyJ") {
                    request.bearer_auth(api_key)
                } else {
                    request.query(&[("api_key", api_key)])
                }
            })
            .await
    }

    /// TMDB id for a title, looked up through `/find` when only an IMDb or
    /// TVDB id is known.
    async fn tmdb_id(&self, ids: &ExternalIds, media_type: MediaType) -> ProviderResult<Option<String>> {
        if let Some(id) = ids.get(TMDB_ID) {
            return Ok(Some(id.to_string()));
        }

        let sources = [("imdb_id", ids.get("imdb")), ("tvdb_id", ids.get("tvdb"))];
        for (source, external) in sources {
            let Some(external) = external else { continue };
            let found: Option<TmdbFindResponse> = self
                .get(&format!("/find/{external}"), &[("external_source", source)])
                .await?;
            let hits = found.map(|f| match media_type {
                MediaType::Movie => f.movie_results,
                MediaType::TvShow => f.tv_results,
            });
            if let Some(hit) = hits.and_then(|h| h.into_iter().next()) {
                debug!(source, external, tmdb_id = hit.id, "Resolved TMDB id via find");
                return Ok(Some(hit.id.to_string()));
            }
        }
        Ok(None)
    }

    async fn ratings(&self, ids: &ExternalIds, media_type: MediaType) -> ProviderResult<AggregateRatings> {
        let Some(id) = self.tmdb_id(ids, media_type).await? else {
            return Ok(AggregateRatings::default());
        };
        let path = match media_type {
            MediaType::Movie => format!("/movie/{id}"),
            MediaType::TvShow => format!("/tv/{id}"),
        };
        let votes: Option<TmdbVotes> = self.get(&path, &[]).await?;
        let mut ratings = AggregateRatings::default();
        if let Some(rating) = votes.and_then(|v| vote_rating(v.vote_average, v.vote_count)) {
            ratings.insert(rating);
        }
        Ok(ratings)
    }

    async fn artwork(&self, ids: &ExternalIds, media_type: MediaType) -> ProviderResult<Artwork> {
        let Some(id) = self.tmdb_id(ids, media_type).await? else {
            return Ok(Artwork::default());
        };
        let path = match media_type {
            MediaType::Movie => format!("/movie/{id}/images"),
            MediaType::TvShow => format!("/tv/{id}/images"),
        };
        let images: Option<TmdbImagesResponse> = self
            .get(&path, &[("include_image_language", IMAGE_LANGUAGES)])
            .await?;
        Ok(images.map(to_artwork).unwrap_or_default())
    }
}

/// Convert a TMDB image path fragment to a full URL.
fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

fn to_image(img: TmdbImage) -> ImageAsset {
    ImageAsset {
        url: image_url(&img.file_path),
        width: img.width,
        height: img.height,
        language: img.iso_639_1,
        score: img.vote_average,
    }
}

fn to_artwork(images: TmdbImagesResponse) -> Artwork {
    Artwork {
        posters: images.posters.into_iter().map(to_image).collect(),
        backdrops: images.backdrops.into_iter().map(to_image).collect(),
        logos: images.logos.into_iter().map(to_image).collect(),
        thumbs: Vec::new(),
    }
}

fn vote_rating(average: Option<f64>, count: Option<u64>) -> Option<RatingValue> {
    let value = average?;
    if count == Some(0) {
        return None;
    }
    Some(RatingValue {
        source: TMDB_ID.to_string(),
        value,
        max: 10.0,
        votes: count,
    })
}

fn external_ids(tmdb_id: u64, imdb: Option<String>, ext: Option<TmdbExternalIds>) -> ExternalIds {
    let ext = ext.unwrap_or_default();
    let mut ids = ExternalIds::default().with(TMDB_ID, tmdb_id.to_string());
    if let Some(imdb) = non_empty(imdb).or_else(|| non_empty(ext.imdb_id)) {
        ids.set("imdb", imdb);
    }
    if let Some(tvdb) = ext.tvdb_id {
        ids.set("tvdb", tvdb.to_string());
    }
    ids
}

fn cast_and_crew(credits: Option<TmdbCredits>) -> (Vec<CastMember>, Vec<CrewMember>) {
    let Some(credits) = credits else {
        return (Vec::new(), Vec::new());
    };
    let cast = credits
        .cast
        .into_iter()
        .map(|c| CastMember {
            name: c.name,
            character: non_empty(c.character),
            order: c.order,
            profile_url: c.profile_path.map(|p| image_url(&p)),
        })
        .collect();
    let crew = credits
        .crew
        .into_iter()
        .map(|c| CrewMember {
            name: c.name,
            job: c.job,
            department: c.department,
        })
        .collect();
    (cast, crew)
}

fn trailers(videos: Option<TmdbVideos>) -> Vec<Trailer> {
    videos
        .map(|v| v.results)
        .unwrap_or_default()
        .into_iter()
        .filter(|v| v.kind == "Trailer")
        .map(|v| {
            let url = match v.site.as_str() {
                "YouTube" => format!("https://www.youtube.com/watch?v={}", v.key),
                "Vimeo" => format!("https://vimeo.com/{}", v.key),
                _ => v.key.clone(),
            };
            Trailer {
                name: v.name,
                url,
                site: Some(v.site),
            }
        })
        .collect()
}

fn names(list: Vec<TmdbNamed>) -> Vec<String> {
    list.into_iter().map(|n| n.name).collect()
}

fn movie_details(detail: TmdbMovieDetail) -> MovieDetails {
    let external_ids = external_ids(detail.id, detail.imdb_id, detail.external_ids);
    let (cast, crew) = cast_and_crew(detail.credits);

    // First non-empty certification per country.
    let content_ratings = detail
        .release_dates
        .map(|r| r.results)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|country| {
            country
                .release_dates
                .into_iter()
                .map(|d| d.certification)
                .find(|c| !c.is_empty())
                .map(|rating| ContentRating {
                    country: country.iso_3166_1,
                    rating,
                })
        })
        .collect();

    let mut ratings = AggregateRatings::default();
    if let Some(rating) = vote_rating(detail.vote_average, detail.vote_count) {
        ratings.insert(rating);
    }

    MovieDetails {
        title: detail.title.unwrap_or_default(),
        original_title: detail.original_title,
        overview: non_empty(detail.overview),
        tagline: non_empty(detail.tagline),
        year: year_of(detail.release_date.as_deref()),
        release_date: non_empty(detail.release_date),
        runtime_minutes: detail.runtime.filter(|r| *r > 0),
        status: detail.status,
        genres: names(detail.genres),
        studios: names(detail.production_companies),
        ratings,
        artwork: detail.images.map(to_artwork).unwrap_or_default(),
        cast,
        crew,
        content_ratings,
        trailers: trailers(detail.videos),
        external_ids,
    }
}

fn show_details(detail: TmdbTvDetail) -> ShowDetails {
    let external_ids = external_ids(detail.id, None, detail.external_ids);
    let (cast, crew) = cast_and_crew(detail.credits);

    let content_ratings = detail
        .content_ratings
        .map(|r| r.results)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.rating.is_empty())
        .map(|r| ContentRating {
            country: r.iso_3166_1,
            rating: r.rating,
        })
        .collect();

    let seasons = detail
        .seasons
        .into_iter()
        .map(|s| SeasonSummary {
            season_number: s.season_number,
            name: s.name,
            episode_count: s.episode_count,
            air_date: non_empty(s.air_date),
            poster_url: s.poster_path.map(|p| image_url(&p)),
        })
        .collect();

    let mut ratings = AggregateRatings::default();
    if let Some(rating) = vote_rating(detail.vote_average, detail.vote_count) {
        ratings.insert(rating);
    }

    ShowDetails {
        title: detail.name.unwrap_or_default(),
        original_title: detail.original_name,
        overview: non_empty(detail.overview),
        year: year_of(detail.first_air_date.as_deref()),
        first_air_date: non_empty(detail.first_air_date),
        last_air_date: non_empty(detail.last_air_date),
        status: detail.status,
        runtime_minutes: detail.episode_run_time.first().copied(),
        genres: names(detail.genres),
        networks: names(detail.networks),
        ratings,
        artwork: detail.images.map(to_artwork).unwrap_or_default(),
        cast,
        crew,
        content_ratings,
        trailers: trailers(detail.videos),
        seasons,
        external_ids,
    }
}

fn episode_details(episode: TmdbEpisode) -> EpisodeDetails {
    let external_ids = match episode.id {
        Some(id) => external_ids(id, None, episode.external_ids),
        None => ExternalIds::default(),
    };
    EpisodeDetails {
        season_number: episode.season_number,
        episode_number: episode.episode_number,
        title: non_empty(episode.name),
        overview: non_empty(episode.overview),
        air_date: non_empty(episode.air_date),
        runtime_minutes: episode.runtime,
        still_url: episode.still_path.map(|p| image_url(&p)),
        rating: episode.vote_average,
        external_ids,
    }
}

#[async_trait]
impl Integration for TmdbProvider {
    fn id(&self) -> &'static str {
        TMDB_ID
    }

    fn display_name(&self) -> &'static str {
        "TMDB"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvShow]
    }

    fn rating_sources(&self) -> &'static [&'static str] {
        &[TMDB_ID]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        self.api_key = config.api_key().map(str::to_string);
        self.base_url = config.base_url_or(TMDB_BASE_URL);
        if let Some(language) = config.option("language") {
            self.language = language.to_string();
        }
        if self.api_key.is_none() {
            warn!("TMDB has no API key configured, integration stays disabled");
        }
    }

    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        let config: Option<serde_json::Value> = self.get("/configuration", &[]).await?;
        config.map(|_| ()).ok_or_else(|| ProviderError::Request {
            status: 404,
            message: "configuration endpoint not found".to_string(),
        })
    }

    fn as_metadata(&self) -> Option<&dyn MetadataCapability> {
        Some(self)
    }

    fn as_ratings(&self) -> Option<&dyn RatingsCapability> {
        Some(self)
    }

    fn as_artwork(&self) -> Option<&dyn ArtworkCapability> {
        Some(self)
    }
}

#[async_trait]
impl MetadataCapability for TmdbProvider {
    async fn search_movies(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        let year = year.map(|y| y.to_string());
        let mut params = vec![("query", query), ("include_adult", "false")];
        if let Some(ref y) = year {
            params.push(("year", y.as_str()));
        }

        let body: Option<TmdbSearchResponse<TmdbMovieSearchResult>> =
            self.get("/search/movie", &params).await?;

        Ok(body
            .map(|b| b.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                let mut result = SearchResult::new(
                    TMDB_ID,
                    r.id.to_string(),
                    r.title.unwrap_or_default(),
                    MediaType::Movie,
                );
                result.original_title = r.original_title;
                result.year = year_of(r.release_date.as_deref());
                result.release_date = non_empty(r.release_date);
                result.overview = non_empty(r.overview);
                result.poster_path = r.poster_path.map(|p| image_url(&p));
                result.backdrop_path = r.backdrop_path.map(|p| image_url(&p));
                result.popularity = r.popularity;
                result.vote_average = r.vote_average;
                result
            })
            .collect())
    }

    async fn search_shows(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        let year = year.map(|y| y.to_string());
        let mut params = vec![("query", query)];
        if let Some(ref y) = year {
            params.push(("first_air_date_year", y.as_str()));
        }

        let body: Option<TmdbSearchResponse<TmdbTvSearchResult>> =
            self.get("/search/tv", &params).await?;

        Ok(body
            .map(|b| b.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                let mut result = SearchResult::new(
                    TMDB_ID,
                    r.id.to_string(),
                    r.name.unwrap_or_default(),
                    MediaType::TvShow,
                );
                result.original_title = r.original_name;
                result.year = year_of(r.first_air_date.as_deref());
                result.release_date = non_empty(r.first_air_date);
                result.overview = non_empty(r.overview);
                result.poster_path = r.poster_path.map(|p| image_url(&p));
                result.backdrop_path = r.backdrop_path.map(|p| image_url(&p));
                result.popularity = r.popularity;
                result.vote_average = r.vote_average;
                result
            })
            .collect())
    }

    async fn movie_details(&self, id: &str) -> ProviderResult<Option<MovieDetails>> {
        let detail: Option<TmdbMovieDetail> = self
            .get(
                &format!("/movie/{id}"),
                &[
                    ("append_to_response", MOVIE_APPENDS),
                    ("include_image_language", IMAGE_LANGUAGES),
                ],
            )
            .await?;
        Ok(detail.map(movie_details))
    }

    async fn show_details(&self, id: &str) -> ProviderResult<Option<ShowDetails>> {
        let detail: Option<TmdbTvDetail> = self
            .get(
                &format!("/tv/{id}"),
                &[
                    ("append_to_response", SHOW_APPENDS),
                    ("include_image_language", IMAGE_LANGUAGES),
                ],
            )
            .await?;
        Ok(detail.map(show_details))
    }

    async fn season_details(&self, show_id: &str, season: u32) -> ProviderResult<Option<SeasonDetails>> {
        let detail: Option<TmdbSeasonDetail> = self
            .get(
                &format!("/tv/{show_id}/season/{season}"),
                &[("append_to_response", "external_ids")],
            )
            .await?;

        Ok(detail.map(|s| {
            let mut external_ids = ExternalIds::default();
            if let Some(tvdb) = s.external_ids.and_then(|e| e.tvdb_id) {
                external_ids.set("tvdb", tvdb.to_string());
            }
            SeasonDetails {
                show_id: show_id.to_string(),
                season_number: s.season_number,
                name: s.name,
                overview: non_empty(s.overview),
                air_date: non_empty(s.air_date),
                poster_url: s.poster_path.map(|p| image_url(&p)),
                episodes: s.episodes.into_iter().map(episode_details).collect(),
                external_ids,
            }
        }))
    }

    async fn episode_details(
        &self,
        show_id: &str,
        season: u32,
        episode: u32,
    ) -> ProviderResult<Option<EpisodeDetails>> {
        let detail: Option<TmdbEpisode> = self
            .get(
                &format!("/tv/{show_id}/season/{season}/episode/{episode}"),
                &[("append_to_response", "external_ids")],
            )
            .await?;
        Ok(detail.map(episode_details))
    }

    async fn resolve_id(
        &self,
        _catalog: &str,
        ids: &ExternalIds,
        media_type: MediaType,
    ) -> ProviderResult<Option<String>> {
        self.tmdb_id(ids, media_type).await
    }
}

#[async_trait]
impl RatingsCapability for TmdbProvider {
    async fn movie_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, MediaType::Movie).await
    }

    async fn show_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, MediaType::TvShow).await
    }
}

#[async_trait]
impl ArtworkCapability for TmdbProvider {
    async fn movie_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork> {
        self.artwork(ids, MediaType::Movie).await
    }

    async fn show_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork> {
        self.artwork(ids, MediaType::TvShow).await
    }
}
