//! Per-dispatch notification outcome, embedded in API responses.

use serde::Serialize;

use crate::error::FailureCode;

/// Terminal (or transitional) state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Success,
    MailDisabled,
    CircuitBreakerOpen,
    RetryExhausted,
    RetryInProgress,
    MailProviderError,
}

impl DeliveryState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::MailDisabled => "MAIL_DISABLED",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::RetryInProgress => "RETRY_IN_PROGRESS",
            Self::MailProviderError => "MAIL_PROVIDER_ERROR",
        }
    }

    /// Error code for states that represent a delivery failure.
    pub fn failure_code(self) -> Option<FailureCode> {
        match self {
            Self::CircuitBreakerOpen => Some(FailureCode::CircuitBreakerOpen),
            Self::RetryExhausted => Some(FailureCode::RetryExhausted),
            Self::MailProviderError => Some(FailureCode::MailProviderError),
            Self::Success | Self::MailDisabled | Self::RetryInProgress => None,
        }
    }
}

/// Outcome of a notification dispatch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatus {
    pub sent: bool,
    pub status: DeliveryState,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub error_cause: Option<String>,
}

impl NotificationStatus {
    pub fn success(retry_count: u32) -> Self {
        Self {
            sent: true,
            status: DeliveryState::Success,
            error_message: None,
            retry_count,
            error_cause: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sent: false,
            status: DeliveryState::MailDisabled,
            error_message: Some("Mail service is not configured".to_string()),
            retry_count: 0,
            error_cause: None,
        }
    }

    pub fn circuit_breaker_open(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            sent: false,
            status: DeliveryState::CircuitBreakerOpen,
            error_message: Some(format!(
                "Mail service temporarily unavailable - {reason}. Will retry later."
            )),
            retry_count: 0,
            error_cause: Some(reason),
        }
    }

    pub fn retry_exhausted(cause: impl Into<String>, attempts: u32) -> Self {
        let cause = cause.into();
        Self {
            sent: false,
            status: DeliveryState::RetryExhausted,
            error_message: Some(format!(
                "Failed to send notification after {attempts} attempts: {cause}"
            )),
            retry_count: attempts,
            error_cause: Some(cause),
        }
    }

    pub fn retry_in_progress(cause: impl Into<String>, attempt: u32) -> Self {
        let cause = cause.into();
        Self {
            sent: false,
            status: DeliveryState::RetryInProgress,
            error_message: Some(format!(
                "Notification delivery in progress (attempt {attempt}): {cause}"
            )),
            retry_count: attempt,
            error_cause: Some(cause),
        }
    }

    pub fn provider_error(cause: impl Into<String>, attempts: u32) -> Self {
        let cause = cause.into();
        Self {
            sent: false,
            status: DeliveryState::MailProviderError,
            error_message: Some(format!("Mail provider error: {cause}")),
            retry_count: attempts,
            error_cause: Some(cause),
        }
    }
}
