//! Shared request discipline for provider clients.
//!
//! Every outbound call goes through [`ApiClient::send`], which:
//!
//! - enforces a fixed per-call deadline covering connect, headers and body;
//! - retries transient failures (transport errors, timeouts, HTTP 429 and
//!   5xx) with capped exponential backoff, honoring `Retry-After` up to
//!   the same cap and giving up when the server asks for longer;
//! - never retries other 4xx statuses;
//! - maps HTTP 404 to `Ok(None)` rather than an error;
//! - optionally applies a token-bucket limiter before each attempt.
//!
//! Re-authentication on HTTP 401 lives one level up in [`with_reauth`],
//! because only the client knows how to refresh its own credentials.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reelmatch_common::{ProviderError, ProviderResult};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Longest error body kept in [`ProviderError::Request`].
const MAX_ERROR_BODY: usize = 200;

/// Retry and deadline policy shared by all provider clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpPolicy {
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_backoff: Duration,
    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl HttpPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// HTTP client for one provider, carrying that provider's policy and limiter.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    policy: HttpPolicy,
    provider: &'static str,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("provider", &self.provider)
            .field("policy", &self.policy)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client for `provider` using `policy`.
    pub fn new(provider: &'static str, policy: HttpPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .user_agent(concat!("reelmatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(provider, "Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            policy,
            provider,
            limiter: None,
        }
    }

    /// Limit this client to `per_second` requests per second.
    #[must_use]
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(per_second)
            .map(|n| Arc::new(RateLimiter::direct(Quota::per_second(n))));
        self
    }

    /// The underlying reqwest client, for building requests.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn policy(&self) -> &HttpPolicy {
        &self.policy
    }

    /// Send a request built by `build`, retrying per the policy.
    ///
    /// `build` is invoked once per attempt because a `RequestBuilder` is
    /// consumed by sending it. Returns the response body, or `None` on 404.
    pub async fn send<F>(&self, build: F) -> ProviderResult<Option<Bytes>>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut attempt = 1u32;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            match self.attempt(build(&self.client)).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let mut delay = self.policy.backoff_delay(attempt);
                    if let ProviderError::RateLimited {
                        retry_after: Some(requested),
                    } = &err
                    {
                        // Requested waits past the backoff cap end the call.
                        if *requested > self.policy.max_backoff {
                            warn!(
                                provider = self.provider,
                                attempt,
                                retry_after_ms = requested.as_millis() as u64,
                                "Rate limited beyond backoff cap, giving up"
                            );
                            return Err(err);
                        }
                        delay = delay.max(*requested);
                    }
                    warn!(
                        provider = self.provider,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(provider = self.provider, attempt, error = %err, "Provider call failed");
                    return Err(err);
                }
            }
        }
    }

    /// [`send`](Self::send) and decode the body as JSON.
    pub async fn get_json<T, F>(&self, build: F) -> ProviderResult<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        match self.send(build).await? {
            // 204 and friends: decode as JSON null.
            Some(body) if body.is_empty() => decode_json(b"null").map(Some),
            Some(body) => decode_json(&body).map(Some),
            None => Ok(None),
        }
    }

    async fn attempt(&self, request: RequestBuilder) -> ProviderResult<Option<Bytes>> {
        let deadline = self.policy.timeout;
        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| classify_transport(e, deadline))?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status.is_success() {
                return response
                    .bytes()
                    .await
                    .map(Some)
                    .map_err(|e| classify_transport(e, deadline));
            }

            let retry_after = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, retry_after, body))
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(deadline)),
        }
    }
}

/// Run `call` with `credential`; on HTTP 401 hand the rejected credential to
/// `refresh` once and retry `call` with the credential it returns.
///
/// A second 401 is returned to the caller unchanged.
pub async fn with_reauth<T, C, CFut, R, RFut>(credential: String, call: C, refresh: R) -> ProviderResult<T>
where
    C: Fn(String) -> CFut,
    CFut: Future<Output = ProviderResult<T>>,
    R: FnOnce(String) -> RFut,
    RFut: Future<Output = ProviderResult<String>>,
{
    match call(credential.clone()).await {
        Err(ProviderError::Unauthorized(reason)) => {
            debug!(reason = %reason, "Credentials rejected, refreshing once");
            let renewed = refresh(credential).await?;
            call(renewed).await
        }
        other => other,
    }
}

/// Decode a JSON body into `T`.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> ProviderResult<T> {
    serde_json::from_slice(body).map_err(ProviderError::decode)
}

fn classify_transport(err: reqwest::Error, deadline: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(deadline)
    } else if err.is_decode() {
        ProviderError::decode(err)
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED => ProviderError::Unauthorized(truncate(body)),
        s if s.is_server_error() => ProviderError::Server { status: s.as_u16() },
        s => ProviderError::Request {
            status: s.as_u16(),
            message: truncate(body),
        },
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
