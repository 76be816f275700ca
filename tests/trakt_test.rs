//! Trakt OAuth, scrobbling and history sync against a mock server.

mod common;

use chrono::{Duration, Utc};
use common::{config_for, fast_policy, hits};
use reelmatch::config::IntegrationConfig;
use reelmatch::metadata::providers::TraktProvider;
use reelmatch::metadata::types::SyncItem;
use reelmatch::metadata::{ExternalIds, Integration, RatingsCapability, SyncCapability};
use reelmatch_common::MediaType;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authorized_config(server: &MockServer, expires_in: Duration) -> IntegrationConfig {
    let mut config = config_for("trakt", server);
    config.client_secret = Some("secret".to_string());
    config.access_token = Some("access-1".to_string());
    config.refresh_token = Some("refresh-1".to_string());
    config.token_expires_at = Some(Utc::now() + expires_in);
    config
}

fn provider(config: &IntegrationConfig) -> TraktProvider {
    let mut provider = TraktProvider::new(fast_policy());
    provider.initialize(config);
    assert!(provider.is_ready());
    provider
}

async fn mount_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1",
            "client_secret": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 7_776_000,
            "scope": "public",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn movie() -> SyncItem {
    SyncItem::movie(ExternalIds::default().with("tmdb", "603").with("imdb", "tt0133093"))
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_the_call() {
    let server = MockServer::start().await;
    mount_refresh(&server).await;
    Mock::given(method("POST"))
        .and(path("/scrobble/start"))
        .and(header("authorization", "Bearer access-2"))
        .and(header("trakt-api-version", "2"))
        .and(header("trakt-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "action": "start" })))
        .expect(1)
        .mount(&server)
        .await;

    let trakt = provider(&authorized_config(&server, Duration::minutes(1)));
    trakt.scrobble_start(&movie(), 12.5).await.unwrap();

    let tokens = trakt.tokens().await.unwrap();
    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token, "refresh-2");
    assert!(tokens.expires_at > Utc::now() + Duration::days(80));
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    mount_refresh(&server).await;
    Mock::given(method("GET"))
        .and(path("/sync/history/movies"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sync/history/movies"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "watched_at": "2024-03-01T20:15:00.000Z",
                "action": "watch",
                "type": "movie",
                "movie": {
                    "title": "The Matrix",
                    "year": 1999,
                    "ids": { "trakt": 481, "imdb": "tt0133093", "tmdb": 603 }
                }
            }
        ])))
        .mount(&server)
        .await;

    let trakt = provider(&authorized_config(&server, Duration::days(30)));
    let history = trakt.watch_history(Some(MediaType::Movie), 5).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].title, "The Matrix");
    assert_eq!(history[0].item.external_ids.get("tmdb"), Some("603"));
    assert_eq!(hits(&server, "/sync/history/movies").await, 2);
}

#[tokio::test]
async fn mark_watched_reports_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/history"))
        .and(body_partial_json(json!({
            "movies": [{ "ids": { "tmdb": 603, "imdb": "tt0133093" } }],
            "shows": [{
                "ids": { "tvdb": 81189 },
                "seasons": [{ "number": 1, "episodes": [{ "number": 3 }] }]
            }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "added": { "movies": 1, "episodes": 0 },
            "not_found": { "movies": [], "shows": [{ "ids": { "tvdb": 81189 } }], "episodes": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let trakt = provider(&authorized_config(&server, Duration::days(30)));
    let items = vec![
        movie(),
        SyncItem::episode(ExternalIds::default().with("tvdb", "81189"), 1, 3),
    ];
    let summary = trakt.mark_watched(&items).await.unwrap();

    assert_eq!(summary.added_movies, 1);
    assert_eq!(summary.added_episodes, 0);
    assert_eq!(summary.not_found, 1);
}

#[tokio::test]
async fn duplicate_scrobble_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrobble/stop"))
        .and(body_partial_json(json!({ "progress": 100.0 })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "watched_at": "2024-03-01T20:15:00.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let trakt = provider(&authorized_config(&server, Duration::days(30)));
    // Progress past the end is clamped.
    trakt.scrobble_stop(&movie(), 140.0).await.unwrap();
}

#[tokio::test]
async fn ratings_need_no_user_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movies/tt0133093/ratings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rating": 8.7,
            "votes": 51000,
            "distribution": {}
        })))
        .mount(&server)
        .await;

    let trakt = provider(&config_for("trakt", &server));
    let ratings = trakt.movie_ratings(&ExternalIds::default().with("imdb", "tt0133093")).await.unwrap();

    let trakt_rating = ratings.get("trakt").unwrap();
    assert_eq!(trakt_rating.value, 8.7);
    assert_eq!(trakt_rating.votes, Some(51000));
}
