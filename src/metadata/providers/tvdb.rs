//! TheTVDB v4 provider (TV only).
//!
//! Authentication is a login call (`POST /login` with the project API key
//! and an optional subscriber PIN) returning a bearer token valid for about
//! a month. The token is cached in a [`SessionToken`], renewed a day before
//! it lapses, and dropped and renewed once if the API answers 401 anyway.

use async_trait::async_trait;
use chrono::Duration;
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{non_empty, year_of, TVDB_ID};
use crate::config::IntegrationConfig;
use crate::metadata::auth::SessionToken;
use crate::metadata::http::{with_reauth, ApiClient, HttpPolicy};
use crate::metadata::provider::{ArtworkCapability, Integration, MetadataCapability};
use crate::metadata::types::{
    Artwork, CastMember, EpisodeDetails, ExternalIds, ImageAsset, MovieDetails, SearchResult,
    SeasonDetails, SeasonSummary, ShowDetails,
};

pub const TVDB_BASE_URL: &str = "https://api4.thetvdb.com/v4";

/// Validity of a freshly issued token.
const TOKEN_VALIDITY_DAYS: i64 = 30;
/// Renew this long before the token lapses.
const TOKEN_RENEW_HOURS: i64 = 24;

// TVDB series artwork type ids.
const ARTWORK_BANNER: u32 = 1;
const ARTWORK_POSTER: u32 = 2;
const ARTWORK_BACKGROUND: u32 = 3;
const ARTWORK_CLEARLOGO: u32 = 23;

// ---------------------------------------------------------------------------
// Response types (private)
// ---------------------------------------------------------------------------

/// Every v4 response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TvdbSearchHit {
    tvdb_id: Option<String>,
    name: Option<String>,
    year: Option<String>,
    first_air_time: Option<String>,
    overview: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    translations: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvdbSeries {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    first_aired: Option<String>,
    last_aired: Option<String>,
    year: Option<String>,
    status: Option<TvdbNamed>,
    average_runtime: Option<u32>,
    original_network: Option<TvdbNamed>,
    #[serde(default)]
    genres: Vec<TvdbNamed>,
    #[serde(default)]
    seasons: Vec<TvdbSeason>,
    #[serde(default)]
    remote_ids: Vec<TvdbRemoteId>,
    #[serde(default)]
    artworks: Vec<TvdbArtwork>,
    #[serde(default)]
    characters: Vec<TvdbCharacter>,
    translations: Option<TvdbTranslations>,
}

#[derive(Debug, Deserialize)]
struct TvdbNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TvdbSeason {
    number: u32,
    name: Option<String>,
    image: Option<String>,
    #[serde(rename = "type")]
    kind: Option<TvdbSeasonType>,
}

#[derive(Debug, Deserialize)]
struct TvdbSeasonType {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvdbRemoteId {
    id: String,
    source_name: String,
}

#[derive(Debug, Deserialize)]
struct TvdbArtwork {
    image: String,
    #[serde(rename = "type")]
    kind: u32,
    language: Option<String>,
    score: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvdbCharacter {
    name: Option<String>,
    person_name: Option<String>,
    people_type: Option<String>,
    sort: Option<u32>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvdbTranslations {
    #[serde(default)]
    name_translations: Vec<TvdbTranslation>,
    #[serde(default)]
    overview_translations: Vec<TvdbTranslation>,
}

#[derive(Debug, Deserialize)]
struct TvdbTranslation {
    language: String,
    name: Option<String>,
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvdbEpisodePage {
    #[serde(default)]
    episodes: Vec<TvdbEpisode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvdbEpisode {
    id: u64,
    season_number: u32,
    number: u32,
    name: Option<String>,
    overview: Option<String>,
    aired: Option<String>,
    runtime: Option<u32>,
    image: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TheTVDB provider.
#[derive(Debug)]
pub struct TvdbProvider {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
    pin: Option<String>,
    language: String,
    session: SessionToken,
}

impl TvdbProvider {
    pub fn new(policy: HttpPolicy, language: &str) -> Self {
        Self {
            api: ApiClient::new(TVDB_ID, policy),
            base_url: TVDB_BASE_URL.to_string(),
            api_key: None,
            pin: None,
            language: tvdb_language(language).to_string(),
            session: SessionToken::new(
                Duration::days(TOKEN_VALIDITY_DAYS),
                Duration::hours(TOKEN_RENEW_HOURS),
            ),
        }
    }

    async fn login(&self) -> ProviderResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(TVDB_ID))?;
        let mut body = serde_json::json!({ "apikey": api_key });
        if let Some(pin) = &self.pin {
            body["pin"] = serde_json::Value::String(pin.clone());
        }
        let url = format!("{}/login", self.base_url);

        let response: Option<Envelope<LoginData>> =
            self.api.get_json(|http| http.post(&url).json(&body)).await?;
        let token = response
            .map(|r| r.data.token)
            .ok_or_else(|| ProviderError::Request {
                status: 404,
                message: "login endpoint not found".to_string(),
            })?;
        info!("Logged in to TVDB");
        Ok(token)
    }

    async fn token(&self) -> ProviderResult<String> {
        self.session.get_or_login(|| self.login()).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
        token: String,
    ) -> ProviderResult<Option<T>> {
        let envelope: Option<Envelope<T>> = self
            .api
            .get_json(|http| http.get(url).query(params).bearer_auth(&token))
            .await?;
        Ok(envelope.map(|e| e.data))
    }

    /// Authenticated GET returning the unwrapped `data` payload.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        debug!(path, "TVDB request");

        let token = self.token().await?;
        with_reauth(
            token,
            move |token| self.fetch::<T>(url, params, token),
            move |stale| async move {
                warn!("TVDB rejected session token, logging in again");
                self.session.invalidate(&stale).await;
                self.token().await
            },
        )
        .await
    }

    async fn series(&self, id: &str) -> ProviderResult<Option<TvdbSeries>> {
        self.get(
            &format!("/series/{id}/extended"),
            &[("meta", "translations"), ("short", "false")],
        )
        .await
    }

    async fn season_episodes(&self, show_id: &str, season: u32) -> ProviderResult<Option<Vec<TvdbEpisode>>> {
        let season = season.to_string();
        let page: Option<TvdbEpisodePage> = self
            .get(
                &format!("/series/{show_id}/episodes/default"),
                &[("season", season.as_str()), ("page", "0")],
            )
            .await?;
        Ok(page.map(|p| p.episodes))
    }

    fn map_series(&self, series: TvdbSeries) -> ShowDetails {
        let title = series
            .translations
            .as_ref()
            .and_then(|t| pick_translation(&t.name_translations, &self.language))
            .and_then(|t| t.name.clone())
            .or(series.name)
            .unwrap_or_default();
        let overview = series
            .translations
            .as_ref()
            .and_then(|t| pick_translation(&t.overview_translations, &self.language))
            .and_then(|t| t.overview.clone())
            .or_else(|| non_empty(series.overview));

        let mut external_ids = ExternalIds::default().with(TVDB_ID, series.id.to_string());
        for remote in &series.remote_ids {
            match remote.source_name.as_str() {
                "IMDB" => external_ids.set("imdb", remote.id.clone()),
                "TheMovieDB.com" => external_ids.set("tmdb", remote.id.clone()),
                _ => false,
            };
        }

        let seasons = series
            .seasons
            .into_iter()
            .filter(|s| s.kind.as_ref().map_or(true, |k| k.kind == "official"))
            .map(|s| SeasonSummary {
                season_number: s.number,
                name: s.name,
                episode_count: None,
                air_date: None,
                poster_url: non_empty(s.image),
            })
            .collect();

        let cast = series
            .characters
            .into_iter()
            .filter(|c| c.people_type.as_deref() == Some("Actor"))
            .filter_map(|c| {
                Some(CastMember {
                    name: non_empty(c.person_name)?,
                    character: non_empty(c.name),
                    order: c.sort,
                    profile_url: non_empty(c.image),
                })
            })
            .collect();

        ShowDetails {
            title,
            original_title: None,
            overview,
            year: series
                .year
                .as_deref()
                .and_then(|y| y.parse().ok())
                .or_else(|| year_of(series.first_aired.as_deref())),
            first_air_date: non_empty(series.first_aired),
            last_air_date: non_empty(series.last_aired),
            status: series.status.map(|s| s.name),
            runtime_minutes: series.average_runtime,
            genres: series.genres.into_iter().map(|g| g.name).collect(),
            networks: series.original_network.map(|n| n.name).into_iter().collect(),
            artwork: to_artwork(series.artworks),
            cast,
            seasons,
            external_ids,
            ..Default::default()
        }
    }
}

/// Map an IETF tag to the ISO-639-2 code TVDB uses.
fn tvdb_language(language: &str) -> &'static str {
    match language.split(['-', '_']).next().unwrap_or_default() {
        "de" => "deu",
        "es" => "spa",
        "fr" => "fra",
        "it" => "ita",
        "ja" => "jpn",
        "nl" => "nld",
        "pt" => "por",
        _ => "eng",
    }
}

fn pick_translation<'a>(translations: &'a [TvdbTranslation], language: &str) -> Option<&'a TvdbTranslation> {
    translations
        .iter()
        .find(|t| t.language == language)
        .or_else(|| translations.iter().find(|t| t.language == "eng"))
}

fn to_artwork(artworks: Vec<TvdbArtwork>) -> Artwork {
    let mut artwork = Artwork::default();
    for art in artworks {
        let kind = art.kind;
        let image = ImageAsset {
            url: art.image,
            width: art.width,
            height: art.height,
            language: art.language,
            score: art.score,
        };
        match kind {
            ARTWORK_POSTER => artwork.posters.push(image),
            ARTWORK_BACKGROUND => artwork.backdrops.push(image),
            ARTWORK_CLEARLOGO => artwork.logos.push(image),
            ARTWORK_BANNER => artwork.thumbs.push(image),
            _ => {}
        }
    }
    artwork
}

fn episode_details(show_id: &str, episode: TvdbEpisode) -> EpisodeDetails {
    debug!(show_id, episode_id = episode.id, "Mapping TVDB episode");
    EpisodeDetails {
        season_number: episode.season_number,
        episode_number: episode.number,
        title: non_empty(episode.name),
        overview: non_empty(episode.overview),
        air_date: non_empty(episode.aired),
        runtime_minutes: episode.runtime,
        still_url: non_empty(episode.image),
        rating: None,
        external_ids: ExternalIds::default().with(TVDB_ID, episode.id.to_string()),
    }
}

#[async_trait]
impl Integration for TvdbProvider {
    fn id(&self) -> &'static str {
        TVDB_ID
    }

    fn display_name(&self) -> &'static str {
        "TheTVDB"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::TvShow]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        self.api_key = config.api_key().map(str::to_string);
        self.pin = config.pin().map(str::to_string);
        self.base_url = config.base_url_or(TVDB_BASE_URL);
        if let Some(language) = config.option("language") {
            self.language = tvdb_language(language).to_string();
        }
        if self.api_key.is_none() {
            warn!("TVDB has no API key configured, integration stays disabled");
        }
    }

    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        // Always round-trips, even with a cached token.
        self.session.renew(|| self.login()).await.map(|_| ())
    }

    fn as_metadata(&self) -> Option<&dyn MetadataCapability> {
        Some(self)
    }

    fn as_artwork(&self) -> Option<&dyn ArtworkCapability> {
        Some(self)
    }
}

#[async_trait]
impl MetadataCapability for TvdbProvider {
    async fn search_movies(&self, _query: &str, _year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    async fn search_shows(&self, query: &str, year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        let year = year.map(|y| y.to_string());
        let mut params = vec![("query", query), ("type", "series")];
        if let Some(ref y) = year {
            params.push(("year", y.as_str()));
        }

        let hits: Option<Vec<TvdbSearchHit>> = self.get("/search", &params).await?;
        Ok(hits
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| {
                let id = non_empty(hit.tvdb_id)?;
                let title = hit
                    .translations
                    .get(&self.language)
                    .cloned()
                    .or(hit.name)
                    .unwrap_or_default();
                let mut result = SearchResult::new(TVDB_ID, id, title, MediaType::TvShow);
                result.year = hit
                    .year
                    .as_deref()
                    .and_then(|y| y.parse().ok())
                    .or_else(|| year_of(hit.first_air_time.as_deref()));
                result.release_date = non_empty(hit.first_air_time);
                result.overview = non_empty(hit.overview);
                result.poster_path = non_empty(hit.image_url);
                Some(result)
            })
            .collect())
    }

    async fn movie_details(&self, _id: &str) -> ProviderResult<Option<MovieDetails>> {
        Err(ProviderError::not_supported(TVDB_ID, "movie details"))
    }

    async fn show_details(&self, id: &str) -> ProviderResult<Option<ShowDetails>> {
        Ok(self.series(id).await?.map(|s| self.map_series(s)))
    }

    async fn season_details(&self, show_id: &str, season: u32) -> ProviderResult<Option<SeasonDetails>> {
        let Some(episodes) = self.season_episodes(show_id, season).await? else {
            return Ok(None);
        };
        let episodes: Vec<EpisodeDetails> = episodes
            .into_iter()
            .filter(|e| e.season_number == season)
            .map(|e| episode_details(show_id, e))
            .collect();
        if episodes.is_empty() {
            return Ok(None);
        }

        Ok(Some(SeasonDetails {
            show_id: show_id.to_string(),
            season_number: season,
            air_date: episodes.iter().find_map(|e| e.air_date.clone()),
            episodes,
            external_ids: ExternalIds::default().with(TVDB_ID, show_id),
            ..Default::default()
        }))
    }

    async fn episode_details(
        &self,
        show_id: &str,
        season: u32,
        episode: u32,
    ) -> ProviderResult<Option<EpisodeDetails>> {
        let episodes = self.season_episodes(show_id, season).await?;
        Ok(episodes
            .unwrap_or_default()
            .into_iter()
            .find(|e| e.season_number == season && e.number == episode)
            .map(|e| episode_details(show_id, e)))
    }
}

#[async_trait]
impl ArtworkCapability for TvdbProvider {
    async fn movie_artwork(&self, _ids: &ExternalIds) -> ProviderResult<Artwork> {
        Err(ProviderError::not_supported(TVDB_ID, "movie artwork"))
    }

    async fn show_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork> {
        let Some(id) = ids.get(TVDB_ID) else {
            return Ok(Artwork::default());
        };
        let artworks: Option<Vec<TvdbArtwork>> = self
            .get(&format!("/series/{id}/artworks"), &[("lang", self.language.as_str())])
            .await?;
        Ok(to_artwork(artworks.unwrap_or_default()))
    }
}
