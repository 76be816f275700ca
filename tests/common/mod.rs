//! Shared helpers for integration tests.
//!
//! Provider clients are pointed at a [`wiremock::MockServer`] through the
//! `base_url` override and run under [`fast_policy`] so retry tests finish
//! in milliseconds.

#![allow(dead_code)]

use std::time::Duration;

use reelmatch::config::IntegrationConfig;
use reelmatch::metadata::HttpPolicy;
use wiremock::MockServer;

/// Short deadline and backoff, three attempts.
pub fn fast_policy() -> HttpPolicy {
    HttpPolicy {
        timeout: Duration::from_millis(500),
        max_attempts: 3,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    }
}

/// Config for `id` with a test API key, aimed at `server`.
pub fn config_for(id: &str, server: &MockServer) -> IntegrationConfig {
    IntegrationConfig::new(id)
        .with_api_key("test-key")
        .with_base_url(server.uri())
}

/// Number of requests `server` received for `path`.
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
