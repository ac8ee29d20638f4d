//! Error types for the Strata catalog engine.
//!
//! Every failure the engine can surface to a consumer is a `StrataError`.
//! The type is `Clone` because one failed fetch is shared by every consumer
//! attached to the same deduplicated request.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the catalog engine.
#[derive(Debug, Clone, Error)]
pub enum StrataError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    // Backing store errors
    #[error("Store error ({status}): {message}")]
    Store {
        status: u16,
        message: String,
        /// PostgREST / Postgres error code, e.g. `PGRST116`
        code: Option<String>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, StrataError>;

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Json {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for StrataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StrataError::Timeout(Duration::from_secs(0))
        } else if err.is_decode() {
            StrataError::Json {
                message: err.to_string(),
            }
        } else {
            StrataError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl From<url::ParseError> for StrataError {
    fn from(err: url::ParseError) -> Self {
        StrataError::Config {
            message: format!("Invalid URL: {}", err),
        }
    }
}

impl StrataError {
    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Network/connectivity error
    /// - -32001: Backing store rejected the query
    /// - -32002: Session not found
    /// - -32005: Validation error
    /// - -32602: Invalid params
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            StrataError::Network { .. }
            | StrataError::Timeout(_)
            | StrataError::RateLimited { .. } => -32000,

            StrataError::Store { .. } => -32001,

            StrataError::SessionNotFound { .. } => -32002,

            StrataError::Validation { .. } => -32005,

            StrataError::InvalidParams { .. } => -32602,

            _ => -32603,
        }
    }

    /// Check if this error should trigger a retry.
    ///
    /// Store errors are retryable only for server-side (5xx) failures and
    /// request timeouts (408).
    pub fn is_retryable(&self) -> bool {
        match self {
            StrataError::Network { .. }
            | StrataError::Timeout(_)
            | StrataError::RateLimited { .. } => true,
            StrataError::Store { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }
}
