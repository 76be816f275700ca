//! Fanart.tv provider: artwork only.
//!
//! Movies are looked up by TMDB id (falling back to IMDb id), shows by TVDB
//! id. Images are ranked by community likes, with images in the preferred
//! language first.

use async_trait::async_trait;
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use serde::Deserialize;
use tracing::{debug, warn};

use super::FANART_ID;
use crate::config::IntegrationConfig;
use crate::metadata::http::{ApiClient, HttpPolicy};
use crate::metadata::provider::{ArtworkCapability, Integration};
use crate::metadata::types::{Artwork, ExternalIds, ImageAsset};

pub const FANART_BASE_URL: &str = "https://webservice.fanart.tv/v3";

#[derive(Debug, Default, Deserialize)]
struct FanartMovie {
    #[serde(default)]
    movieposter: Vec<FanartImage>,
    #[serde(default)]
    moviebackground: Vec<FanartImage>,
    #[serde(default)]
    hdmovielogo: Vec<FanartImage>,
    #[serde(default)]
    movielogo: Vec<FanartImage>,
    #[serde(default)]
    moviethumb: Vec<FanartImage>,
}

#[derive(Debug, Default, Deserialize)]
struct FanartShow {
    #[serde(default)]
    tvposter: Vec<FanartImage>,
    #[serde(default)]
    showbackground: Vec<FanartImage>,
    #[serde(default)]
    hdtvlogo: Vec<FanartImage>,
    #[serde(default)]
    clearlogo: Vec<FanartImage>,
    #[serde(default)]
    tvthumb: Vec<FanartImage>,
}

#[derive(Debug, Deserialize)]
struct FanartImage {
    url: String,
    lang: Option<String>,
    likes: Option<String>,
}

/// Fanart.tv artwork provider.
#[derive(Debug)]
pub struct FanartProvider {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
    client_key: Option<String>,
    language: String,
}

impl FanartProvider {
    pub fn new(policy: HttpPolicy, language: &str) -> Self {
        Self {
            api: ApiClient::new(FANART_ID, policy),
            base_url: FANART_BASE_URL.to_string(),
            api_key: None,
            client_key: None,
            language: iso_639_1(language),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> ProviderResult<Option<T>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(FANART_ID))?;
        let url = format!("{}{}", self.base_url, path);
        debug!(path, "Fanart.tv request");

        self.api
            .get_json(|http| {
                let request = http.get(&url).query(&[("api_key", api_key)]);
                match &self.client_key {
                    Some(client_key) => request.query(&[("client_key", client_key.as_str())]),
                    None => request,
                }
            })
            .await
    }

    /// Convert and rank one image list.
    fn images(&self, lists: Vec<Vec<FanartImage>>) -> Vec<ImageAsset> {
        let mut images: Vec<ImageAsset> = lists
            .into_iter()
            .flatten()
            .map(|img| ImageAsset {
                url: img.url,
                width: None,
                height: None,
                score: img.likes.as_deref().and_then(|l| l.parse().ok()),
                language: img.lang.filter(|l| !l.is_empty() && l != "00"),
            })
            .collect();

        let preferred = |img: &ImageAsset| img.language.as_deref() == Some(self.language.as_str());
        images.sort_by(|a, b| {
            preferred(b)
                .cmp(&preferred(a))
                .then_with(|| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)))
        });
        images
    }
}

fn iso_639_1(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[async_trait]
impl Integration for FanartProvider {
    fn id(&self) -> &'static str {
        FANART_ID
    }

    fn display_name(&self) -> &'static str {
        "Fanart.tv"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvShow]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        self.api_key = config.api_key().map(str::to_string);
        self.client_key = config.option("client_key").map(str::to_string);
        self.base_url = config.base_url_or(FANART_BASE_URL);
        if self.api_key.is_none() {
            warn!("Fanart.tv has no API key configured, integration stays disabled");
        }
    }

    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        // The Matrix; any 2xx or 404 proves the key is accepted.
        let _: Option<serde_json::Value> = self.get("/movies/603").await?;
        Ok(())
    }

    fn as_artwork(&self) -> Option<&dyn ArtworkCapability> {
        Some(self)
    }
}

#[async_trait]
impl ArtworkCapability for FanartProvider {
    async fn movie_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork> {
        let Some(id) = ids.get("tmdb").or_else(|| ids.get("imdb")) else {
            return Ok(Artwork::default());
        };
        let movie: FanartMovie = self.get(&format!("/movies/{id}")).await?.unwrap_or_default();
        Ok(Artwork {
            posters: self.images(vec![movie.movieposter]),
            backdrops: self.images(vec![movie.moviebackground]),
            logos: self.images(vec![movie.hdmovielogo, movie.movielogo]),
            thumbs: self.images(vec![movie.moviethumb]),
        })
    }

    async fn show_artwork(&self, ids: &ExternalIds) -> ProviderResult<Artwork> {
        let Some(id) = ids.get("tvdb") else {
            return Ok(Artwork::default());
        };
        let show: FanartShow = self.get(&format!("/tv/{id}")).await?.unwrap_or_default();
        Ok(Artwork {
            posters: self.images(vec![show.tvposter]),
            backdrops: self.images(vec![show.showbackground]),
            logos: self.images(vec![show.hdtvlogo, show.clearlogo]),
            thumbs: self.images(vec![show.tvthumb]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str, lang: &str, likes: &str) -> FanartImage {
        FanartImage {
            url: url.to_string(),
            lang: Some(lang.to_string()),
            likes: Some(likes.to_string()),
        }
    }

    #[test]
    fn ranks_preferred_language_then_likes() {
        let provider = FanartProvider::new(HttpPolicy::default(), "en-US");
        let ranked = provider.images(vec![vec![
            image("fr-popular", "fr", "50"),
            image("en-low", "en", "1"),
            image("en-high", "en", "9"),
            image("textless", "00", "20"),
        ]]);
        let urls: Vec<_> = ranked.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["en-high", "en-low", "fr-popular", "textless"]);
        assert_eq!(ranked[3].language, None);
    }

    #[tokio::test]
    async fn show_without_tvdb_id_is_empty() {
        let mut provider = FanartProvider::new(HttpPolicy::default(), "en-US");
        provider.initialize(&IntegrationConfig::new(FANART_ID).with_api_key("k"));
        let artwork = provider
            .show_artwork(&ExternalIds::default().with("tmdb", "1396"))
            .await
            .unwrap();
        assert!(artwork.is_empty());
        assert!(provider.as_metadata().is_none());
    }
}
