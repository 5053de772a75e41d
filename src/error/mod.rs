// Error types for adforge
// Author: kelexine (https://github.com/kelexine)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Classification of a failed upstream attempt.
///
/// The retry executor only looks at this value when deciding whether to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InvalidRequest,
    AuthError,
}

impl ErrorClass {
    /// Timeouts, 5xx and rate limits are worth another attempt; everything else is final.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::Timeout | ErrorClass::ServiceUnavailable | ErrorClass::RateLimited
        )
    }

    /// Map an upstream HTTP status code to an error class.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorClass::AuthError,
            408 => ErrorClass::Timeout,
            429 => ErrorClass::RateLimited,
            500..=599 => ErrorClass::ServiceUnavailable,
            _ => ErrorClass::InvalidRequest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::ServiceUnavailable => "service_unavailable",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::InvalidRequest => "invalid_request",
            ErrorClass::AuthError => "auth_error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone)]
pub enum AdError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream {class} after {attempts} attempt(s): {message}")]
    Upstream {
        class: ErrorClass,
        attempts: u32,
        message: String,
    },

    #[error("Upstream authentication failed after {attempts} attempt(s): {message}")]
    Auth { attempts: u32, message: String },

    #[error("Unparseable provider response after {attempts} attempt(s): {message}")]
    Parse { attempts: u32, message: String },

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Unknown ad: {0}")]
    UnknownAd(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdError {
    /// Short machine-readable name of the error class, used in logs, metrics and HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AdError::Validation(_) => "validation_error",
            AdError::Upstream { class, .. } => class.as_str(),
            AdError::Auth { .. } => "authentication_error",
            AdError::Parse { .. } => "parse_error",
            AdError::CacheUnavailable(_) => "cache_unavailable",
            AdError::UnknownAd(_) => "not_found_error",
            AdError::Config(_) => "configuration_error",
            AdError::Internal(_) => "api_error",
        }
    }

    /// Number of upstream attempts made before the error surfaced (0 if none were made).
    pub fn attempts(&self) -> u32 {
        match self {
            AdError::Upstream { attempts, .. }
            | AdError::Auth { attempts, .. }
            | AdError::Parse { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AdError::Validation(_) => StatusCode::BAD_REQUEST,
            AdError::UnknownAd(_) => StatusCode::NOT_FOUND,
            AdError::Upstream { class, .. } => match class {
                ErrorClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorClass::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorClass::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorClass::InvalidRequest | ErrorClass::AuthError => StatusCode::BAD_GATEWAY,
            },
            AdError::Auth { .. } | AdError::Parse { .. } => StatusCode::BAD_GATEWAY,
            AdError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdError::Config(_) | AdError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AdError {
    fn from(e: config::ConfigError) -> Self {
        AdError::Config(e.to_string())
    }
}

// Convert AdError to HTTP responses for Axum
impl IntoResponse for AdError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "type": "error",
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "attempts": self.attempts(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AdError>;
