//! Trakt provider: watch-history sync, scrobbling and community ratings.
//!
//! Every request carries the `trakt-api-key` client id. User-scoped calls
//! additionally carry an OAuth bearer token held in an [`OAuthSession`]:
//! tokens within five minutes of expiry are refreshed before the call, and a
//! 401 triggers one forced refresh and one retry.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::TRAKT_ID;
use crate::config::IntegrationConfig;
use crate::metadata::auth::{OAuthSession, OAuthTokens};
use crate::metadata::http::{with_reauth, ApiClient, HttpPolicy};
use crate::metadata::provider::{Integration, RatingsCapability, SyncCapability};
use crate::metadata::types::{
    AggregateRatings, EpisodeRef, ExternalIds, RatingValue, SyncItem, SyncSummary,
    WatchHistoryEntry,
};

pub const TRAKT_BASE_URL: &str = "https://api.trakt.tv";
pub const TRAKT_AUTH_URL: &str = "https://trakt.tv";

/// Refresh access tokens this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;
/// Redirect URI for apps without a callback endpoint.
const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

// ---------------------------------------------------------------------------
// Response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TraktIds {
    trakt: Option<u64>,
    imdb: Option<String>,
    tmdb: Option<u64>,
    tvdb: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TraktMedia {
    title: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktEpisode {
    season: u32,
    number: u32,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TraktHistoryItem {
    watched_at: chrono::DateTime<Utc>,
    movie: Option<TraktMedia>,
    show: Option<TraktMedia>,
    episode: Option<TraktEpisode>,
}

#[derive(Debug, Deserialize)]
struct TraktSyncResponse {
    #[serde(default)]
    added: TraktAdded,
    #[serde(default)]
    not_found: TraktNotFound,
}

#[derive(Debug, Default, Deserialize)]
struct TraktAdded {
    #[serde(default)]
    movies: u32,
    #[serde(default)]
    episodes: u32,
}

#[derive(Debug, Default, Deserialize)]
struct TraktNotFound {
    #[serde(default)]
    movies: Vec<Value>,
    #[serde(default)]
    shows: Vec<Value>,
    #[serde(default)]
    seasons: Vec<Value>,
    #[serde(default)]
    episodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TraktRatings {
    rating: Option<f64>,
    votes: Option<u64>,
}

impl TokenResponse {
    fn into_tokens(self) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            scope: self.scope,
        }
    }
}

impl TraktIds {
    fn to_external(&self) -> ExternalIds {
        let mut ids = ExternalIds::default();
        if let Some(trakt) = self.trakt {
            ids.set(TRAKT_ID, trakt.to_string());
        }
        if let Some(imdb) = &self.imdb {
            ids.set("imdb", imdb.clone());
        }
        if let Some(tmdb) = self.tmdb {
            ids.set("tmdb", tmdb.to_string());
        }
        if let Some(tvdb) = self.tvdb {
            ids.set("tvdb", tvdb.to_string());
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Trakt provider.
#[derive(Debug)]
pub struct TraktProvider {
    api: ApiClient,
    base_url: String,
    auth_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    session: OAuthSession,
}

impl TraktProvider {
    pub fn new(policy: HttpPolicy) -> Self {
        Self {
            api: ApiClient::new(TRAKT_ID, policy),
            base_url: TRAKT_BASE_URL.to_string(),
            auth_url: TRAKT_AUTH_URL.to_string(),
            client_id: None,
            client_secret: None,
            redirect_uri: OUT_OF_BAND_REDIRECT.to_string(),
            session: OAuthSession::new(TRAKT_ID, None, Duration::minutes(REFRESH_MARGIN_MINUTES)),
        }
    }

    /// Current token pair, for the settings owner to persist after a refresh.
    pub async fn tokens(&self) -> Option<OAuthTokens> {
        self.session.current().await
    }

    fn client_id(&self) -> ProviderResult<&str> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(TRAKT_ID))
    }

    /// One request with the Trakt headers and an optional bearer token.
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<String>,
    ) -> ProviderResult<Option<T>> {
        let client_id = self.client_id()?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "Trakt request");

        self.api
            .get_json(|http| {
                let mut request = http
                    .request(method.clone(), &url)
                    .header("trakt-api-version", "2")
                    .header("trakt-api-key", client_id);
                if let Some(token) = &token {
                    request = request.bearer_auth(token);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                request
            })
            .await
    }

    /// User-scoped request: proactive refresh before, one forced refresh on 401.
    async fn authed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ProviderResult<Option<T>> {
        let token = self
            .session
            .access_token(|refresh| self.refresh_grant(refresh))
            .await?;

        with_reauth(
            token,
            move |token| self.send_json::<T>(method.clone(), path, body, Some(token)),
            move |stale| async move {
                warn!("Trakt rejected access token, refreshing");
                self.session
                    .force_refresh(&stale, |refresh| self.refresh_grant(refresh))
                    .await
            },
        )
        .await
    }

    async fn token_grant(&self, grant: Value) -> ProviderResult<OAuthTokens> {
        let response: Option<TokenResponse> =
            self.send_json(Method::POST, "/oauth/token", Some(&grant), None).await?;
        let tokens = response
            .map(TokenResponse::into_tokens)
            .ok_or_else(|| ProviderError::Request {
                status: 404,
                message: "token endpoint not found".to_string(),
            })?;
        info!(expires_at = %tokens.expires_at, "Obtained Trakt access token");
        Ok(tokens)
    }

    async fn refresh_grant(&self, refresh_token: String) -> ProviderResult<OAuthTokens> {
        let client_secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(TRAKT_ID))?;
        self.token_grant(json!({
            "refresh_token": refresh_token,
            "client_id": self.client_id()?,
            "client_secret": client_secret,
            "redirect_uri": self.redirect_uri,
            "grant_type": "refresh_token",
        }))
        .await
    }

    async fn ratings(&self, ids: &ExternalIds, kind: &str) -> ProviderResult<AggregateRatings> {
        let Some(id) = ids.get(TRAKT_ID).or_else(|| ids.get("imdb")) else {
            return Ok(AggregateRatings::default());
        };
        let ratings: Option<TraktRatings> = self
            .send_json(Method::GET, &format!("/{kind}/{id}/ratings"), None, None)
            .await?;

        let mut aggregate = AggregateRatings::default();
        if let Some(TraktRatings {
            rating: Some(value),
            votes,
        }) = ratings
        {
            if votes != Some(0) {
                aggregate.insert(RatingValue {
                    source: TRAKT_ID.to_string(),
                    value,
                    max: 10.0,
                    votes,
                });
            }
        }
        Ok(aggregate)
    }

    async fn scrobble(&self, action: &str, item: &SyncItem, progress: f64) -> ProviderResult<()> {
        let mut body = scrobble_body(item);
        body["progress"] = json!(progress.clamp(0.0, 100.0));
        let path = format!("/scrobble/{action}");

        match self.authed::<Value>(Method::POST, &path, Some(&body)).await {
            Ok(_) => Ok(()),
            // Trakt answers 409 for a repeat of a recent scrobble.
            Err(ProviderError::Request { status: 409, .. }) => {
                debug!(action, "Trakt already recorded this scrobble");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Trakt `ids` object: numeric ids as numbers, IMDb as a string.
fn trakt_ids(ids: &ExternalIds) -> Value {
    let mut out = Map::new();
    for catalog in [TRAKT_ID, "tmdb", "tvdb"] {
        if let Some(id) = ids.get(catalog) {
            let value = id.parse::<u64>().map(Value::from).unwrap_or_else(|_| json!(id));
            out.insert(catalog.to_string(), value);
        }
    }
    if let Some(imdb) = ids.get("imdb") {
        out.insert("imdb".to_string(), json!(imdb));
    }
    Value::Object(out)
}

fn scrobble_body(item: &SyncItem) -> Value {
    match (item.media_type, item.episode) {
        (MediaType::TvShow, Some(EpisodeRef { season, episode })) => json!({
            "show": { "ids": trakt_ids(&item.external_ids) },
            "episode": { "season": season, "number": episode },
        }),
        _ => json!({ "movie": { "ids": trakt_ids(&item.external_ids) } }),
    }
}

fn history_body(items: &[SyncItem]) -> Value {
    let mut movies = Vec::new();
    let mut shows = Vec::new();
    for item in items {
        match item.episode {
            Some(EpisodeRef { season, episode }) => shows.push(json!({
                "ids": trakt_ids(&item.external_ids),
                "seasons": [{ "number": season, "episodes": [{ "number": episode }] }],
            })),
            None => movies.push(json!({ "ids": trakt_ids(&item.external_ids) })),
        }
    }
    json!({ "movies": movies, "shows": shows })
}

fn history_entry(item: TraktHistoryItem) -> Option<WatchHistoryEntry> {
    match (item.movie, item.show, item.episode) {
        (Some(movie), _, _) => Some(WatchHistoryEntry {
            item: SyncItem::movie(movie.ids.to_external()),
            title: movie.title.unwrap_or_default(),
            year: movie.year,
            watched_at: item.watched_at,
        }),
        (None, Some(show), Some(episode)) => {
            let title = match episode.title {
                Some(ep_title) => format!("{} - {}", show.title.unwrap_or_default(), ep_title),
                None => show.title.unwrap_or_default(),
            };
            Some(WatchHistoryEntry {
                item: SyncItem::episode(show.ids.to_external(), episode.season, episode.number),
                title,
                year: show.year,
                watched_at: item.watched_at,
            })
        }
        _ => None,
    }
}

#[async_trait]
impl Integration for TraktProvider {
    fn id(&self) -> &'static str {
        TRAKT_ID
    }

    fn display_name(&self) -> &'static str {
        "Trakt"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn uses_oauth(&self) -> bool {
        true
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvShow]
    }

    fn rating_sources(&self) -> &'static [&'static str] {
        &[TRAKT_ID]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        // The client id doubles as the API key.
        self.client_id = config
            .client_id()
            .or_else(|| config.api_key())
            .map(str::to_string);
        self.client_secret = config.client_secret().map(str::to_string);
        if let Some(redirect) = config.redirect_uri.as_deref().filter(|r| !r.is_empty()) {
            self.redirect_uri = redirect.to_string();
        }
        self.base_url = config.base_url_or(TRAKT_BASE_URL);
        self.auth_url = config
            .option("auth_url")
            .unwrap_or(TRAKT_AUTH_URL)
            .trim_end_matches('/')
            .to_string();
        self.session = OAuthSession::new(
            TRAKT_ID,
            config.oauth_tokens(),
            Duration::minutes(REFRESH_MARGIN_MINUTES),
        );

        if self.client_id.is_none() {
            warn!("Trakt has no client id configured, integration stays disabled");
        }
    }

    fn is_ready(&self) -> bool {
        self.client_id.is_some()
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        if self.session.has_tokens().await {
            let _: Option<Value> = self.authed(Method::GET, "/users/settings", None).await?;
        } else {
            let _: Option<Value> = self
                .send_json(Method::GET, "/movies/popular?limit=1", None, None)
                .await?;
        }
        Ok(())
    }

    fn as_ratings(&self) -> Option<&dyn RatingsCapability> {
        Some(self)
    }

    fn as_sync(&self) -> Option<&dyn SyncCapability> {
        Some(self)
    }
}

#[async_trait]
impl RatingsCapability for TraktProvider {
    async fn movie_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, "movies").await
    }

    async fn show_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, "shows").await
    }
}

#[async_trait]
impl SyncCapability for TraktProvider {
    fn authorization_url(&self, state: &str) -> ProviderResult<String> {
        let client_id = self.client_id()?;
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth/authorize", self.auth_url),
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::Request {
            status: 400,
            message: format!("invalid authorization URL: {e}"),
        })?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> ProviderResult<OAuthTokens> {
        let client_secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(TRAKT_ID))?;
        let tokens = self
            .token_grant(json!({
                "code": code,
                "client_id": self.client_id()?,
                "client_secret": client_secret,
                "redirect_uri": self.redirect_uri,
                "grant_type": "authorization_code",
            }))
            .await?;
        self.session.replace(tokens.clone()).await;
        Ok(tokens)
    }

    async fn refresh_tokens(&self) -> ProviderResult<OAuthTokens> {
        let current = self
            .session
            .current()
            .await
            .ok_or_else(|| ProviderError::not_configured(TRAKT_ID))?;
        let access = self
            .session
            .force_refresh(&current.access_token, |refresh| self.refresh_grant(refresh))
            .await?;
        debug!(rotated = access != current.access_token, "Trakt tokens refreshed");
        self.session
            .current()
            .await
            .ok_or_else(|| ProviderError::not_configured(TRAKT_ID))
    }

    async fn watch_history(
        &self,
        media_type: Option<MediaType>,
        limit: u32,
    ) -> ProviderResult<Vec<WatchHistoryEntry>> {
        let scope = match media_type {
            None => "",
            Some(MediaType::Movie) => "/movies",
            Some(MediaType::TvShow) => "/episodes",
        };
        let path = format!("/sync/history{scope}?limit={}", limit.max(1));
        let items: Option<Vec<TraktHistoryItem>> = self.authed(Method::GET, &path, None).await?;
        Ok(items
            .unwrap_or_default()
            .into_iter()
            .filter_map(history_entry)
            .collect())
    }

    async fn mark_watched(&self, items: &[SyncItem]) -> ProviderResult<SyncSummary> {
        if items.is_empty() {
            return Ok(SyncSummary::default());
        }
        let body = history_body(items);
        let response: Option<TraktSyncResponse> =
            self.authed(Method::POST, "/sync/history", Some(&body)).await?;
        let Some(response) = response else {
            return Ok(SyncSummary::default());
        };
        let missing = &response.not_found;
        Ok(SyncSummary {
            added_movies: response.added.movies,
            added_episodes: response.added.episodes,
            not_found: (missing.movies.len()
                + missing.shows.len()
                + missing.seasons.len()
                + missing.episodes.len()) as u32,
        })
    }

    async fn scrobble_start(&self, item: &SyncItem, progress: f64) -> ProviderResult<()> {
        self.scrobble("start", item, progress).await
    }

    async fn scrobble_pause(&self, item: &SyncItem, progress: f64) -> ProviderResult<()> {
        self.scrobble("pause", item, progress).await
    }

    async fn scrobble_stop(&self, item: &SyncItem, progress: f64) -> ProviderResult<()> {
        self.scrobble("stop", item, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> TraktProvider {
        let mut config = IntegrationConfig::new(TRAKT_ID);
        config.client_id = Some("cid".into());
        config.client_secret = Some("secret".into());
        config.redirect_uri = Some("http://localhost/callback".into());
        let mut provider = TraktProvider::new(HttpPolicy::default());
        provider.initialize(&config);
        provider
    }

    #[test]
    fn authorization_url_carries_state() {
        let url = configured().authorization_url("xyz").unwrap();
        assert!(url.starts_with("https://trakt.tv/oauth/authorize?"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fcallback"));
    }

    #[test]
    fn unconfigured_authorization_fails() {
        let provider = TraktProvider::new(HttpPolicy::default());
        assert_eq!(
            provider.authorization_url("s"),
            Err(ProviderError::not_configured("trakt"))
        );
        assert!(!provider.is_ready());
    }

    #[test]
    fn ids_encoding() {
        let ids = ExternalIds::default()
            .with("tmdb", "603")
            .with("imdb", "tt0133093")
            .with("anilist", "1");
        assert_eq!(trakt_ids(&ids), json!({ "tmdb": 603, "imdb": "tt0133093" }));
    }

    #[test]
    fn bodies() {
        let movie = SyncItem::movie(ExternalIds::default().with("tmdb", "603"));
        let episode = SyncItem::episode(ExternalIds::default().with("tvdb", "81189"), 1, 2);

        assert_eq!(
            scrobble_body(&episode),
            json!({ "show": { "ids": { "tvdb": 81189 } }, "episode": { "season": 1, "number": 2 } })
        );
        let history = history_body(&[movie, episode]);
        assert_eq!(history["movies"][0]["ids"]["tmdb"], 603);
        assert_eq!(history["shows"][0]["seasons"][0]["episodes"][0]["number"], 2);
    }

    #[test]
    fn history_mapping() {
        let items: Vec<TraktHistoryItem> = serde_json::from_value(json!([
            {
                "id": 1, "watched_at": "2024-05-01T20:00:00.000Z", "action": "watch", "type": "movie",
                "movie": { "title": "The Matrix", "year": 1999, "ids": { "trakt": 481, "imdb": "tt0133093", "tmdb": 603 } }
            },
            {
                "id": 2, "watched_at": "2024-05-02T20:00:00.000Z", "action": "scrobble", "type": "episode",
                "episode": { "season": 1, "number": 1, "title": "Pilot" },
                "show": { "title": "Breaking Bad", "year": 2008, "ids": { "tvdb": 81189 } }
            }
        ]))
        .unwrap();

        let entries: Vec<_> = items.into_iter().filter_map(history_entry).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item.external_ids.get("trakt"), Some("481"));
        assert_eq!(entries[0].year, Some(1999));
        assert_eq!(entries[1].title, "Breaking Bad - Pilot");
        assert_eq!(entries[1].item.episode, Some(EpisodeRef { season: 1, episode: 1 }));
    }

    #[test]
    fn oauth_flags() {
        let provider = configured();
        assert!(provider.uses_oauth());
        assert!(!provider.is_primary_source());
        assert!(provider.as_sync().is_some());
        assert!(provider.as_metadata().is_none());
    }
}
