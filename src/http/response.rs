//! Response rendering.
//!
//! # Responsibilities
//! - Render [`ApiError`] as the uniform JSON error envelope
//! - Render rate-limit rejections as `{"error": ...}` with `Retry-After`
//!
//! # Design Decisions
//! - Timestamps are RFC 3339 UTC
//! - 5xx errors are logged here so handlers can simply return them

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ApiError, FailureCode, RATE_LIMIT_MESSAGE};

/// Error envelope returned by every failing endpoint except the rate limiter.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<FailureCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct RateLimitBody {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ApiError::RateLimited { retry_after, .. } = &self {
            let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            let mut response = (
                status,
                Json(RateLimitBody {
                    error: RATE_LIMIT_MESSAGE,
                }),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            return response;
        }

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let message = self.to_string();
        let (code, errors) = match self {
            ApiError::Notification { code, .. } => (Some(code), None),
            ApiError::BadRequest { errors } => (None, Some(errors)),
            ApiError::Internal(_) => (Some(FailureCode::UnexpectedError), None),
            _ => (None, None),
        };

        let body = ErrorBody {
            status: status.as_u16(),
            message,
            timestamp: Utc::now(),
            code,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use std::time::Duration;

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_body_and_header() {
        let response = ApiError::RateLimited {
            limit: "contact-message".into(),
            retry_after: Duration::from_millis(11_200),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
        assert_eq!(
            json(response).await,
            serde_json::json!({ "error": "Too many requests. Please try again later." })
        );
    }

    #[tokio::test]
    async fn test_notification_failure_envelope() {
        let response = ApiError::Notification {
            code: FailureCode::RetryExhausted,
            message: "Failed to send notification after 3 attempts: timeout".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = json(response).await;
        assert_eq!(body["status"], 504);
        assert_eq!(body["code"], "RETRY_EXHAUSTED");
        assert!(body["timestamp"].is_string());
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed() {
        let errors = BTreeMap::from([
            ("senderEmail".to_string(), "must be a well-formed email address".to_string()),
            ("senderName".to_string(), "must not be blank".to_string()),
        ]);
        let response = ApiError::BadRequest { errors }.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["message"], "Validation failed");
        assert!(body["errors"].is_object());
        assert_eq!(body["errors"]["senderEmail"], "must be a well-formed email address");
        assert_eq!(body["errors"]["senderName"], "must not be blank");
    }
}
