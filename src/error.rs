//! Externally visible error codes and API errors.
//!
//! The code → HTTP status table is what client integrations depend on and
//! must not drift:
//!
//! | code                   | status |
//! |------------------------|--------|
//! | `CIRCUIT_BREAKER_OPEN` | 503    |
//! | `RETRY_EXHAUSTED`      | 504    |
//! | `MAIL_PROVIDER_ERROR`  | 502    |
//! | `RATE_LIMIT_EXCEEDED`  | 429    |
//! | anything else          | 500    |

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Failure kinds surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    CircuitBreakerOpen,
    RetryExhausted,
    MailProviderError,
    RateLimitExceeded,
    UnexpectedError,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::MailProviderError => "MAIL_PROVIDER_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    /// Parse a code string. Unrecognised codes become `UNEXPECTED_ERROR`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "CIRCUIT_BREAKER_OPEN" => Self::CircuitBreakerOpen,
            "RETRY_EXHAUSTED" => Self::RetryExhausted,
            "MAIL_PROVIDER_ERROR" => Self::MailProviderError,
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            _ => Self::UnexpectedError,
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            Self::CircuitBreakerOpen => StatusCode::SERVICE_UNAVAILABLE,
            Self::RetryExhausted => StatusCode::GATEWAY_TIMEOUT,
            Self::MailProviderError => StatusCode::BAD_GATEWAY,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every 429 produced by the rate limiter.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please try again later.";

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests. Please try again later.")]
    RateLimited { limit: String, retry_after: Duration },

    #[error("{message}")]
    Notification { code: FailureCode, message: String },

    #[error("Message not found with id: {0}")]
    MessageNotFound(u64),

    #[error("Validation failed")]
    BadRequest { errors: BTreeMap<String, String> },

    #[error("Missing or invalid admin credentials")]
    Unauthorized,

    #[error("An unexpected error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => FailureCode::RateLimitExceeded.http_status(),
            Self::Notification { code, .. } => code.http_status(),
            Self::MessageNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => FailureCode::UnexpectedError.http_status(),
        }
    }
}
