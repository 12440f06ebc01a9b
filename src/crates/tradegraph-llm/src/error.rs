//! LLM error types with transient classification
//!
//! The retry wrapper only retries errors whose `is_transient()` is true:
//! connection failures, timeouts, rate limits, and upstream 5xx. Schema
//! rejections and auth failures surface immediately.

use thiserror::Error;

/// Errors from chat model providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Could not reach the provider (DNS, refused connection, TLS)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Provider signalled rate limiting (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// Provider returned an API error
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error message
        message: String,
    },

    /// The response body could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client misconfiguration (missing key, bad base URL)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Whether the retry wrapper should try again.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::RateLimit(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_connect() {
            LlmError::Connection(err.to_string())
        } else {
            LlmError::InvalidResponse(err.to_string())
        }
    }
}

/// Result alias for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;
