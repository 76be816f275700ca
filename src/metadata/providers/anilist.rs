//! AniList provider (anime, public GraphQL API).
//!
//! AniList models every season of a series as its own entry, so season and
//! episode detail lookups are not supported; show details carry a single
//! season summary with the entry's episode count.

use async_trait::async_trait;
use reelmatch_common::{MediaType, ProviderError, ProviderResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::ANILIST_ID;
use crate::config::IntegrationConfig;
use crate::metadata::http::{ApiClient, HttpPolicy};
use crate::metadata::provider::{Integration, MetadataCapability};
use crate::metadata::types::{
    AggregateRatings, Artwork, CastMember, CrewMember, EpisodeDetails, ExternalIds, ImageAsset,
    MovieDetails, RatingValue, SearchResult, SeasonDetails, SeasonSummary, ShowDetails, Trailer,
};

pub const ANILIST_BASE_URL: &str = "https://graphql.anilist.co";

const SHOW_FORMATS: &[&str] = &["TV", "TV_SHORT", "ONA", "OVA", "SPECIAL"];
const MOVIE_FORMATS: &[&str] = &["MOVIE"];

const SEARCH_QUERY: &str = r#"
query ($search: String, $formats: [MediaFormat]) {
  Page(perPage: 20) {
    media(search: $search, type: ANIME, format_in: $formats, isAdult: false) {
      id
      idMal
      title { romaji english native }
      startDate { year month day }
      description(asHtml: false)
      coverImage { extraLarge }
      bannerImage
      popularity
      averageScore
      format
    }
  }
}
"#;

const DETAIL_QUERY: &str = r#"
query ($id: Int) {
  Media(id: $id, type: ANIME) {
    id
    idMal
    title { romaji english native }
    startDate { year month day }
    endDate { year month day }
    description(asHtml: false)
    status
    format
    episodes
    duration
    genres
    averageScore
    popularity
    coverImage { extraLarge }
    bannerImage
    trailer { id site }
    studios(isMain: true) { nodes { name } }
    characters(sort: ROLE, perPage: 25) {
      edges {
        role
        node { name { full } }
        voiceActors(language: JAPANESE) { name { full } image { large } }
      }
    }
    staff(perPage: 10) {
      edges { role node { name { full } } }
    }
  }
}
"#;

const PING_QUERY: &str = "query { Media(id: 1, type: ANIME) { id } }";

// ---------------------------------------------------------------------------
// Response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    media: Vec<AniMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AniMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniMedia {
    id: u64,
    id_mal: Option<u64>,
    title: AniTitle,
    start_date: Option<FuzzyDate>,
    end_date: Option<FuzzyDate>,
    description: Option<String>,
    status: Option<String>,
    episodes: Option<u32>,
    duration: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
    average_score: Option<f64>,
    popularity: Option<f64>,
    cover_image: Option<AniCover>,
    banner_image: Option<String>,
    trailer: Option<AniTrailer>,
    studios: Option<Nodes<AniNamed>>,
    characters: Option<Edges<AniCharacterEdge>>,
    staff: Option<Edges<AniStaffEdge>>,
}

#[derive(Debug, Default, Deserialize)]
struct AniTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct FuzzyDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniCover {
    extra_large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AniTrailer {
    id: Option<String>,
    site: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Edges<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AniNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AniPerson {
    name: AniPersonName,
    image: Option<AniPersonImage>,
}

#[derive(Debug, Deserialize)]
struct AniPersonName {
    full: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AniPersonImage {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniCharacterEdge {
    node: AniPerson,
    #[serde(default)]
    voice_actors: Vec<AniPerson>,
}

#[derive(Debug, Deserialize)]
struct AniStaffEdge {
    role: Option<String>,
    node: AniPerson,
}

impl FuzzyDate {
    /// `YYYY-MM-DD` when fully known, otherwise the bare year.
    fn to_date_string(self) -> Option<String> {
        match (self.year?, self.month, self.day) {
            (y, Some(m), Some(d)) => Some(format!("{y:04}-{m:02}-{d:02}")),
            (y, _, _) => Some(y.to_string()),
        }
    }
}

impl AniTitle {
    fn display(&self) -> String {
        self.english
            .clone()
            .or_else(|| self.romaji.clone())
            .or_else(|| self.native.clone())
            .unwrap_or_default()
    }

    fn original(&self) -> Option<String> {
        self.native.clone().or_else(|| self.romaji.clone())
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// AniList provider. No credentials are needed.
#[derive(Debug)]
pub struct AniListProvider {
    api: ApiClient,
    base_url: String,
    ready: bool,
}

impl AniListProvider {
    pub fn new(policy: HttpPolicy) -> Self {
        Self {
            api: ApiClient::new(ANILIST_ID, policy),
            base_url: ANILIST_BASE_URL.to_string(),
            ready: false,
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> ProviderResult<Option<T>> {
        let body = json!({ "query": query, "variables": variables });
        let response: Option<GraphQlResponse<T>> = self
            .api
            .get_json(|http| http.post(&self.base_url).json(&body))
            .await?;

        let Some(response) = response else {
            return Ok(None);
        };
        match response.data {
            Some(data) => Ok(Some(data)),
            None if response.errors.is_empty() => Ok(None),
            None => {
                let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
                Err(ProviderError::decode(format!("GraphQL error: {}", messages.join("; "))))
            }
        }
    }

    async fn search(&self, query: &str, media_type: MediaType) -> ProviderResult<Vec<SearchResult>> {
        let formats = match media_type {
            MediaType::Movie => MOVIE_FORMATS,
            MediaType::TvShow => SHOW_FORMATS,
        };
        debug!(query, %media_type, "AniList search");
        let data: Option<PageData> = self
            .query(SEARCH_QUERY, json!({ "search": query, "formats": formats }))
            .await?;

        Ok(data
            .map(|d| d.page.media)
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let mut result =
                    SearchResult::new(ANILIST_ID, m.id.to_string(), m.title.display(), media_type);
                result.original_title = m.title.original();
                result.year = m.start_date.and_then(|d| d.year);
                result.release_date = m.start_date.and_then(FuzzyDate::to_date_string);
                result.overview = m.description.as_deref().map(strip_markup);
                result.poster_path = m.cover_image.and_then(|c| c.extra_large);
                result.backdrop_path = m.banner_image;
                result.popularity = m.popularity;
                result.vote_average = m.average_score.map(|s| s / 10.0);
                result
            })
            .collect())
    }

    async fn media(&self, id: &str) -> ProviderResult<Option<AniMedia>> {
        let Ok(id) = id.parse::<u64>() else {
            return Err(ProviderError::Request {
                status: 400,
                message: format!("invalid AniList id '{id}'"),
            });
        };
        let data: Option<MediaData> = self.query(DETAIL_QUERY, json!({ "id": id })).await?;
        Ok(data.and_then(|d| d.media))
    }
}

/// AniList descriptions carry `<br>` and `<i>` tags even in plain mode.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Fields shared by the movie and show records.
struct Common {
    title: String,
    original_title: Option<String>,
    overview: Option<String>,
    start: Option<String>,
    year: Option<i32>,
    ratings: AggregateRatings,
    artwork: Artwork,
    cast: Vec<CastMember>,
    crew: Vec<CrewMember>,
    trailers: Vec<Trailer>,
    studios: Vec<String>,
    external_ids: ExternalIds,
}

fn common(media: &mut AniMedia) -> Common {
    let mut external_ids = ExternalIds::default().with(ANILIST_ID, media.id.to_string());
    if let Some(mal) = media.id_mal {
        external_ids.set("mal", mal.to_string());
    }

    let mut ratings = AggregateRatings::default();
    if let Some(score) = media.average_score {
        ratings.insert(RatingValue {
            source: ANILIST_ID.to_string(),
            value: score,
            max: 100.0,
            votes: None,
        });
    }

    let image = |url: Option<String>| {
        url.map(|url| ImageAsset {
            url,
            width: None,
            height: None,
            language: None,
            score: None,
        })
    };
    let artwork = Artwork {
        posters: image(media.cover_image.take().and_then(|c| c.extra_large)).into_iter().collect(),
        backdrops: image(media.banner_image.take()).into_iter().collect(),
        ..Default::default()
    };

    let cast = media
        .characters
        .take()
        .map(|c| c.edges)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(order, edge)| {
            let actor = edge.voice_actors.into_iter().next()?;
            Some(CastMember {
                name: actor.name.full?,
                character: edge.node.name.full,
                order: Some(order as u32),
                profile_url: actor.image.and_then(|i| i.large),
            })
        })
        .collect();

    let crew = media
        .staff
        .take()
        .map(|s| s.edges)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|edge| {
            Some(CrewMember {
                name: edge.node.name.full?,
                job: edge.role.unwrap_or_default(),
                department: None,
            })
        })
        .collect();

    let trailers = media
        .trailer
        .take()
        .and_then(|t| match (t.id, t.site.as_deref()) {
            (Some(id), Some("youtube")) => Some(Trailer {
                name: "Trailer".to_string(),
                url: format!("https://www.youtube.com/watch?v={id}"),
                site: Some("YouTube".to_string()),
            }),
            _ => None,
        })
        .into_iter()
        .collect();

    Common {
        title: media.title.display(),
        original_title: media.title.original(),
        overview: media.description.as_deref().map(strip_markup).filter(|d| !d.is_empty()),
        start: media.start_date.and_then(FuzzyDate::to_date_string),
        year: media.start_date.and_then(|d| d.year),
        ratings,
        artwork,
        cast,
        crew,
        trailers,
        studios: media
            .studios
            .take()
            .map(|s| s.nodes.into_iter().map(|n| n.name).collect())
            .unwrap_or_default(),
        external_ids,
    }
}

fn movie_details(mut media: AniMedia) -> MovieDetails {
    let c = common(&mut media);
    MovieDetails {
        title: c.title,
        original_title: c.original_title,
        overview: c.overview,
        release_date: c.start,
        year: c.year,
        runtime_minutes: media.duration,
        status: media.status,
        genres: media.genres,
        studios: c.studios,
        ratings: c.ratings,
        artwork: c.artwork,
        cast: c.cast,
        crew: c.crew,
        trailers: c.trailers,
        external_ids: c.external_ids,
        ..Default::default()
    }
}

fn show_details(mut media: AniMedia) -> ShowDetails {
    let c = common(&mut media);
    ShowDetails {
        title: c.title,
        original_title: c.original_title,
        overview: c.overview,
        first_air_date: c.start.clone(),
        last_air_date: media.end_date.and_then(FuzzyDate::to_date_string),
        year: c.year,
        status: media.status,
        runtime_minutes: media.duration,
        genres: media.genres,
        networks: c.studios,
        ratings: c.ratings,
        artwork: c.artwork,
        cast: c.cast,
        crew: c.crew,
        trailers: c.trailers,
        seasons: vec![SeasonSummary {
            season_number: 1,
            name: None,
            episode_count: media.episodes,
            air_date: c.start,
            poster_url: None,
        }],
        external_ids: c.external_ids,
        ..Default::default()
    }
}

#[async_trait]
impl Integration for AniListProvider {
    fn id(&self) -> &'static str {
        ANILIST_ID
    }

    fn display_name(&self) -> &'static str {
        "AniList"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::TvShow, MediaType::Movie]
    }

    fn rating_sources(&self) -> &'static [&'static str] {
        &[ANILIST_ID]
    }

    fn initialize(&mut self, config: &IntegrationConfig) {
        self.base_url = config.base_url_or(ANILIST_BASE_URL);
        self.ready = config.enabled;
        if !self.ready {
            warn!("AniList is disabled in configuration");
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        let _: Option<serde_json::Value> = self.query(PING_QUERY, json!({})).await?;
        Ok(())
    }

    fn as_metadata(&self) -> Option<&dyn MetadataCapability> {
        Some(self)
    }
}

#[async_trait]
impl MetadataCapability for AniListProvider {
    async fn search_movies(&self, query: &str, _year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        self.search(query, MediaType::Movie).await
    }

    async fn search_shows(&self, query: &str, _year: Option<i32>) -> ProviderResult<Vec<SearchResult>> {
        self.search(query, MediaType::TvShow).await
    }

    async fn movie_details(&self, id: &str) -> ProviderResult<Option<MovieDetails>> {
        Ok(self.media(id).await?.map(movie_details))
    }

    async fn show_details(&self, id: &str) -> ProviderResult<Option<ShowDetails>> {
        Ok(self.media(id).await?.map(show_details))
    }

    async fn season_details(&self, _show_id: &str, _season: u32) -> ProviderResult<Option<SeasonDetails>> {
        Err(ProviderError::not_supported(ANILIST_ID, "season details"))
    }

    async fn episode_details(
        &self,
        _show_id: &str,
        _season: u32,
        _episode: u32,
    ) -> ProviderResult<Option<EpisodeDetails>> {
        Err(ProviderError::not_supported(ANILIST_ID, "episode details"))
    }
}
