use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reelmatch_common::MediaCategory;
use serde::{Deserialize, Serialize};

use crate::metadata::auth::OAuthTokens;
use crate::metadata::http::HttpPolicy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub metadata: MetadataSettings,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
}

impl Config {
    /// Configuration for the integration with the given id.
    pub fn integration(&self, id: &str) -> Option<&IntegrationConfig> {
        self.integrations.iter().find(|i| i.id == id)
    }
}

/// Process-wide resolution settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetadataSettings {
    /// Integrations allowed to take part in resolution. Empty allows every
    /// configured integration.
    #[serde(default)]
    pub enabled_integrations: Vec<String>,

    /// Provider order for movies.
    #[serde(default = "default_movie_priority")]
    pub movie_priority: Vec<String>,

    /// Provider order for TV shows.
    #[serde(default = "default_tv_priority")]
    pub tv_priority: Vec<String>,

    /// Provider order for anime, used instead of the movie or TV list when
    /// the caller flags anime content.
    #[serde(default = "default_anime_priority")]
    pub anime_priority: Vec<String>,

    /// Minimum confidence for an automatic match.
    #[serde(default = "default_threshold")]
    pub auto_match_threshold: f64,

    /// Preferred metadata language (e.g. `en-US`).
    #[serde(default = "default_language")]
    pub language: String,

    /// Rating sources to keep. Empty keeps every source.
    #[serde(default)]
    pub rating_sources: Vec<String>,
}

fn default_movie_priority() -> Vec<String> {
    vec!["tmdb".to_string()]
}

fn default_tv_priority() -> Vec<String> {
    vec!["tvdb".to_string(), "tmdb".to_string()]
}

fn default_anime_priority() -> Vec<String> {
    vec!["anilist".to_string(), "tmdb".to_string()]
}

fn default_threshold() -> f64 {
    0.85
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            enabled_integrations: Vec::new(),
            movie_priority: default_movie_priority(),
            tv_priority: default_tv_priority(),
            anime_priority: default_anime_priority(),
            auto_match_threshold: default_threshold(),
            language: default_language(),
            rating_sources: Vec::new(),
        }
    }
}

impl MetadataSettings {
    /// Ordered provider ids for a media category.
    pub fn priority_for(&self, category: MediaCategory) -> &[String] {
        match category {
            MediaCategory::Movie => &self.movie_priority,
            MediaCategory::Tv => &self.tv_priority,
            MediaCategory::Anime => &self.anime_priority,
        }
    }

    /// Whether `id` may take part in resolution.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_integrations.is_empty() || self.enabled_integrations.iter().any(|e| e == id)
    }
}

/// Retry and deadline settings shared by all provider clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl HttpConfig {
    pub fn policy(&self) -> HttpPolicy {
        HttpPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts.max(1),
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Credentials and options for one integration.
///
/// Read once when the client is built; a change means building a new client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IntegrationConfig {
    pub id: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Subscriber PIN (TVDB).
    #[serde(default)]
    pub pin: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,

    /// Override of the provider's API root, mainly for testing.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl IntegrationConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            api_key: None,
            pin: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            base_url: None,
            options: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Configured API key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key)
    }

    pub fn pin(&self) -> Option<&str> {
        non_empty(&self.pin)
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    pub fn client_secret(&self) -> Option<&str> {
        non_empty(&self.client_secret)
    }

    /// API root, falling back to `default` and without a trailing slash.
    pub fn base_url_or(&self, default: &str) -> String {
        non_empty(&self.base_url)
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Stored OAuth pair, when all three parts are present.
    pub fn oauth_tokens(&self) -> Option<OAuthTokens> {
        Some(OAuthTokens {
            access_token: non_empty(&self.access_token)?.to_string(),
            refresh_token: non_empty(&self.refresh_token)?.to_string(),
            expires_at: self.token_expires_at?,
            scope: None,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
