//! Credential lifecycles owned by individual provider clients.
//!
//! Two shapes are supported:
//!
//! - [`SessionToken`]: a bearer token obtained from a login call and valid for
//!   a known window (TVDB). It is re-acquired before it expires.
//! - [`OAuthSession`]: an access/refresh token pair with an absolute expiry
//!   (Trakt). A call landing inside the safety margin refreshes first.
//!
//! Both hold their state behind a `tokio::sync::Mutex` held across the login
//! or refresh call, so concurrent requests that all notice an expired token
//! wait for one refresh instead of racing several.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use reelmatch_common::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Login-produced bearer token with a fixed validity window.
#[derive(Debug)]
pub struct SessionToken {
    state: Mutex<Option<CachedToken>>,
    validity: Duration,
    renew_margin: Duration,
}

impl SessionToken {
    /// `validity` is how long a fresh token lasts; tokens within
    /// `renew_margin` of expiry are treated as expired.
    pub fn new(validity: Duration, renew_margin: Duration) -> Self {
        Self {
            state: Mutex::new(None),
            validity,
            renew_margin,
        }
    }

    /// Return the cached token, logging in first if there is none or it is
    /// about to expire.
    pub async fn get_or_login<F, Fut>(&self, login: F) -> ProviderResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(cached) = state.as_ref() {
            if cached.expires_at - self.renew_margin > now {
                return Ok(cached.token.clone());
            }
            debug!(expires_at = %cached.expires_at, "Session token expiring, logging in again");
        }

        let token = login().await?;
        *state = Some(CachedToken {
            token: token.clone(),
            expires_at: now + self.validity,
        });
        Ok(token)
    }

    /// Log in unconditionally and cache the new token. A failed login
    /// clears the cached token so later calls do not reuse a revoked one.
    pub async fn renew<F, Fut>(&self, login: F) -> ProviderResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match login().await {
            Ok(token) => {
                *state = Some(CachedToken {
                    token: token.clone(),
                    expires_at: now + self.validity,
                });
                Ok(token)
            }
            Err(e) => {
                *state = None;
                Err(e)
            }
        }
    }

    /// Drop the cached token if it is still `stale`. A token that a
    /// concurrent caller already replaced is kept.
    pub async fn invalidate(&self, stale: &str) {
        let mut state = self.state.lock().await;
        if state.as_ref().is_some_and(|cached| cached.token == stale) {
            *state = None;
        }
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.as_ref().map(|c| c.expires_at)
    }
}

/// OAuth access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthTokens {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }
}

/// OAuth token state for one client.
#[derive(Debug)]
pub struct OAuthSession {
    provider: &'static str,
    tokens: Mutex<Option<OAuthTokens>>,
    margin: Duration,
}

impl OAuthSession {
    pub fn new(provider: &'static str, initial: Option<OAuthTokens>, margin: Duration) -> Self {
        Self {
            provider,
            tokens: Mutex::new(initial),
            margin,
        }
    }

    /// Current access token, refreshed first when inside the safety margin.
    ///
    /// `refresh` receives the refresh token and returns the new pair.
    pub async fn access_token<F, Fut>(&self, refresh: F) -> ProviderResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ProviderResult<OAuthTokens>>,
    {
        let mut tokens = self.tokens.lock().await;
        let current = tokens
            .as_ref()
            .ok_or_else(|| ProviderError::not_configured(self.provider))?;

        if !current.expires_within(self.margin, Utc::now()) {
            return Ok(current.access_token.clone());
        }

        info!(
            provider = self.provider,
            expires_at = %current.expires_at,
            "Access token near expiry, refreshing proactively"
        );
        let renewed = refresh(current.refresh_token.clone()).await?;
        let access = renewed.access_token.clone();
        *tokens = Some(renewed);
        Ok(access)
    }

    /// Refresh after the server rejected `stale`. When a concurrent caller
    /// already refreshed, the newer token is returned without another call.
    pub async fn force_refresh<F, Fut>(&self, stale: &str, refresh: F) -> ProviderResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ProviderResult<OAuthTokens>>,
    {
        let mut tokens = self.tokens.lock().await;
        let current = tokens
            .as_ref()
            .ok_or_else(|| ProviderError::not_configured(self.provider))?;

        if current.access_token != stale {
            return Ok(current.access_token.clone());
        }

        let renewed = refresh(current.refresh_token.clone()).await?;
        let access = renewed.access_token.clone();
        *tokens = Some(renewed);
        Ok(access)
    }

    /// Replace the stored pair (after an authorization-code exchange).
    pub async fn replace(&self, tokens: OAuthTokens) {
        *self.tokens.lock().await = Some(tokens);
    }

    /// Snapshot of the stored pair, for persisting by the settings owner.
    pub async fn current(&self) -> Option<OAuthTokens> {
        self.tokens.lock().await.clone()
    }

    pub async fn has_tokens(&self) -> bool {
        self.tokens.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn tokens(access: &str, expires_in: Duration) -> OAuthTokens {
        OAuthTokens {
            access_token: access.to_string(),
            refresh_token: format!("{access}-refresh"),
            expires_at: Utc::now() + expires_in,
            scope: None,
        }
    }

    #[tokio::test]
    async fn session_token_reused_while_fresh() {
        let session = SessionToken::new(Duration::days(30), Duration::hours(24));
        let logins = AtomicU32::new(0);
        let logins = &logins;

        for _ in 0..3 {
            let token = session
                .get_or_login(|| async move {
                    logins.fetch_add(1, Ordering::SeqCst);
                    Ok("abc".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token, "abc");
        }
        assert_eq!(logins.load(Ordering::SeqCst), 1);
        assert!(session.expires_at().await.is_some());
    }

    #[tokio::test]
    async fn session_token_renewed_inside_margin() {
        // Validity shorter than the margin: every call sees an expiring token.
        let session = SessionToken::new(Duration::minutes(30), Duration::hours(1));
        let logins = AtomicU32::new(0);
        let logins = &logins;

        for _ in 0..2 {
            session
                .get_or_login(|| async move {
                    let n = logins.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("token-{n}"))
                })
                .await
                .unwrap();
        }
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_invalidate_only_drops_stale_token() {
        let session = SessionToken::new(Duration::days(30), Duration::hours(24));
        session
            .get_or_login(|| async { Ok("current".to_string()) })
            .await
            .unwrap();

        session.invalidate("older").await;
        assert!(session.expires_at().await.is_some());

        session.invalidate("current").await;
        assert!(session.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn session_login_failure_propagates() {
        let session = SessionToken::new(Duration::days(30), Duration::hours(24));
        let result = session
            .get_or_login(|| async { Err(ProviderError::Unauthorized("bad key".into())) })
            .await;
        assert!(matches!(result, Err(ProviderError::Unauthorized(_))));
        assert!(session.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn session_renew_logs_in_despite_fresh_token() {
        let session = SessionToken::new(Duration::days(30), Duration::hours(24));
        session
            .get_or_login(|| async { Ok("first".to_string()) })
            .await
            .unwrap();

        let token = session.renew(|| async { Ok("second".to_string()) }).await.unwrap();
        assert_eq!(token, "second");

        let result = session
            .renew(|| async { Err(ProviderError::Unauthorized("revoked".into())) })
            .await;
        assert!(matches!(result, Err(ProviderError::Unauthorized(_))));
        assert!(session.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_login() {
        let session = Arc::new(SessionToken::new(Duration::days(30), Duration::hours(24)));
        let logins = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let logins = Arc::clone(&logins);
                tokio::spawn(async move {
                    session
                        .get_or_login(|| async move {
                            logins.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok("shared".to_string())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn oauth_expiry_margin() {
        let now = Utc::now();
        let pair = OAuthTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: now + Duration::minutes(3),
            scope: None,
        };
        assert!(pair.expires_within(Duration::minutes(5), now));
        assert!(!pair.expires_within(Duration::minutes(1), now));
    }

    #[tokio::test]
    async fn oauth_proactive_refresh_inside_margin() {
        let session = OAuthSession::new(
            "trakt",
            Some(tokens("old", Duration::minutes(2))),
            Duration::minutes(5),
        );

        let token = session
            .access_token(|refresh| async move {
                assert_eq!(refresh, "old-refresh");
                Ok(tokens("new", Duration::days(90)))
            })
            .await
            .unwrap();

        assert_eq!(token, "new");
        assert_eq!(session.current().await.unwrap().access_token, "new");
    }

    #[tokio::test]
    async fn oauth_no_refresh_when_fresh() {
        let session = OAuthSession::new(
            "trakt",
            Some(tokens("fresh", Duration::days(30))),
            Duration::minutes(5),
        );
        let token = session
            .access_token(|_| async { Err(ProviderError::decode("refresh must not run")) })
            .await
            .unwrap();
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn oauth_without_tokens_is_not_configured() {
        let session = OAuthSession::new("trakt", None, Duration::minutes(5));
        let result = session
            .access_token(|_| async { Ok(tokens("x", Duration::days(1))) })
            .await;
        assert_eq!(result, Err(ProviderError::not_configured("trakt")));
        assert!(!session.has_tokens().await);
    }

    #[tokio::test]
    async fn oauth_force_refresh_skips_when_already_rotated() {
        let session = OAuthSession::new(
            "trakt",
            Some(tokens("rotated", Duration::days(30))),
            Duration::minutes(5),
        );
        let token = session
            .force_refresh("stale", |_| async { Err(ProviderError::decode("refresh must not run")) })
            .await
            .unwrap();
        assert_eq!(token, "rotated");

        let token = session
            .force_refresh("rotated", |_| async { Ok(tokens("next", Duration::days(30))) })
            .await
            .unwrap();
        assert_eq!(token, "next");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let session = Arc::new(OAuthSession::new(
            "trakt",
            Some(tokens("expiring", Duration::minutes(1))),
            Duration::minutes(5),
        ));
        let refreshes = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let refreshes = Arc::clone(&refreshes);
                tokio::spawn(async move {
                    session
                        .access_token(|refresh| async move {
                            assert_eq!(refresh, "expiring-refresh");
                            refreshes.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(tokens("rotated", Duration::days(90)))
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "rotated");
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.current().await.unwrap().access_token, "rotated");
    }
}
