//! OMDb provider: IMDb, Rotten Tomatoes and Metacritic ratings by IMDb id.

use async_trait::async_trait;
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use serde::Deserialize;
use tracing::{debug, warn};

use super::OMDB_ID;
use crate::config::IntegrationConfig;
use crate::metadata::http::{ApiClient, HttpPolicy};
use crate::metadata::provider::{Integration, RatingsCapability};
use crate::metadata::types::{AggregateRatings, ExternalIds, RatingValue};

pub const OMDB_BASE_URL: &str = "https://www.omdbapi.com";

/// Title used to verify credentials.
const PROBE_IMDB_ID: &str = "tt0133093";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    error: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
    #[serde(default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbRating {
    source: String,
    value: String,
}

/// OMDb ratings provider.
#[derive(Debug)]
pub struct OmdbProvider {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
}

impl OmdbProvider {
    pub fn new(policy: HttpPolicy) -> Self {
        Self {
            api: ApiClient::new(OMDB_ID, policy),
            base_url: OMDB_BASE_URL.to_string(),
            api_key: None,
        }
    }

    async fn lookup(&self, imdb_id: &str, media_type: MediaType) -> ProviderResult<Option<OmdbResponse>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(OMDB_ID))?;
        let kind = match media_type {
            MediaType::Movie => "movie",
            MediaType::TvShow => "series",
        };
        debug!(imdb_id, kind, "OMDb lookup");

        let url = format!("{}/", self.base_url);
        self.api
            .get_json(|http| {
                http.get(&url)
                    .query(&[("apikey", api_key), ("i", imdb_id), ("type", kind), ("tomatoes", "true")])
            })
            .await
    }

    async fn ratings(&self, ids: &ExternalIds, media_type: MediaType) -> ProviderResult<AggregateRatings> {
        let Some(imdb_id) = ids.get("imdb") else {
            return Ok(AggregateRatings::default());
        };
        match self.lookup(imdb_id, media_type).await? {
            Some(response) => Ok(parse_ratings(response)),
            None => Ok(AggregateRatings::default()),
        }
    }
}

/// Map OMDb's display source names onto rating source ids.
fn source_id(source: &str) -> Option<&'static str> {
    match source {
        "Internet Movie Database" => Some("imdb"),
        "Rotten Tomatoes" => Some("rotten_tomatoes"),
        "Metacritic" => Some("metacritic"),
        _ => None,
    }
}

/// Parse `"8.7/10"`, `"73/100"` or `"88%"` into `(value, max)`.
fn parse_score(value: &str) -> Option<(f64, f64)> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        return Some((percent.trim().parse().ok()?, 100.0));
    }
    let (score, max) = value.split_once('/')?;
    let max: f64 = max.trim().parse().ok()?;
    if max <= 0.0 {
        return None;
    }
    Some((score.trim().parse().ok()?, max))
}

/// Parse `"1,234,567"` into a vote count.
fn parse_votes(votes: &str) -> Option<u64> {
    votes.replace(',', "").trim().parse().ok()
}

fn parse_ratings(response: OmdbResponse) -> AggregateRatings {
    let mut aggregate = AggregateRatings::default();
    if response.response != "True" {
        debug!(error = ?response.error, "OMDb has no data for title");
        return aggregate;
    }

    let votes = response.imdb_votes.as_deref().and_then(parse_votes);
    for rating in response.ratings {
        let Some(source) = source_id(&rating.source) else {
            continue;
        };
        let Some((value, max)) = parse_score(&rating.value) else {
            continue;
        };
        aggregate.insert(RatingValue {
            source: source.to_string(),
            value,
            max,
            votes: if source == "imdb" { votes } else { None },
        });
    }
    aggregate
}

#[async_trait]
impl Integration for OmdbProvider {
    fn id(&self) -> &'static str {
        OMDB_ID
    }

    fn display_name(&self) -> &'static str {
        "OMDb"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvShow]
    }

    fn rating_sources(&self) -> &'static [&'static str] {
        &["imdb", "rotten_tomatoes", "metacritic"]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        self.api_key = config.api_key().map(str::to_string);
        self.base_url = config.base_url_or(OMDB_BASE_URL);
        if self.api_key.is_none() {
            warn!("OMDb has no API key configured, integration stays disabled");
        }
    }

    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        match self.lookup(PROBE_IMDB_ID, MediaType::Movie).await? {
            Some(response) if response.response != "True" => Err(ProviderError::Request {
                status: 200,
                message: response.error.unwrap_or_else(|| "lookup failed".to_string()),
            }),
            _ => Ok(()),
        }
    }

    fn as_ratings(&self) -> Option<&dyn RatingsCapability> {
        Some(self)
    }
}

#[async_trait]
impl RatingsCapability for OmdbProvider {
    async fn movie_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, MediaType::Movie).await
    }

    async fn show_ratings(&self, ids: &ExternalIds) -> ProviderResult<AggregateRatings> {
        self.ratings(ids, MediaType::TvShow).await
    }
}
