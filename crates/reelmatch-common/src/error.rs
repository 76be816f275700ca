//! Error taxonomy for external catalog calls.
//!
//! Every provider client reports failures through [`ProviderError`]. The
//! variants map onto the handling each failure gets:
//!
//! - transient failures (timeouts, transport errors, 5xx, 429) are retried by
//!   the shared backoff policy and surface only once retries are exhausted;
//! - authentication failures get one credential refresh before being fatal;
//! - request, decode, configuration and unsupported-operation failures are
//!   never retried.
//!
//! "Not found" is deliberately absent: a 404 or an empty catalog answer is an
//! empty result, not an error.

use std::time::Duration;

/// Failure of a single call to an external catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The call exceeded its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection failed before a response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The catalog answered HTTP 429.
    #[error("Rate limited")]
    RateLimited {
        /// Delay requested by a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The catalog answered with a 5xx status.
    #[error("Server error: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The catalog rejected our credentials (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The catalog rejected the request itself (4xx other than 401, 404, 429).
    #[error("Request rejected: HTTP {status}: {message}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Response body or reason, truncated.
        message: String,
    },

    /// The integration cannot serve this operation at all.
    #[error("{provider} does not support {operation}")]
    NotSupported {
        /// Integration id.
        provider: String,
        /// Operation that was requested.
        operation: String,
    },

    /// The integration is missing a credential required for this call.
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the shared retry policy should try the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }

    /// Convenience constructor for [`ProviderError::NotSupported`].
    pub fn not_supported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NotSupported {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    /// Convenience constructor for [`ProviderError::NotConfigured`].
    pub fn not_configured(provider: impl Into<String>) -> Self {
        Self::NotConfigured(provider.into())
    }

    /// Convenience constructor for [`ProviderError::Decode`].
    pub fn decode(msg: impl std::fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }
}

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
