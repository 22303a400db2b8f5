//! HTTP handlers for contact messages.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::admin::AdminAccess;
use crate::error::ApiError;
use crate::http::server::AppState;
use crate::messages::model::{Message, MessageView, NewMessage};
use crate::notification::{DeliveryState, NotificationStatus};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/messages", post(create_message).get(list_messages))
        .route("/api/messages/{id}", get(get_message))
        .route("/api/messages/{id}/notify", post(resend_notification))
}

/// `POST /api/messages`: public contact form submission.
pub async fn create_message(
    State(state): State<AppState>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let Json(input) = payload.map_err(|rejection| ApiError::BadRequest {
        errors: [("body".to_string(), rejection.body_text())].into(),
    })?;
    let view = state.messages.create(input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_messages(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.messages.list().await?))
}

pub async fn get_message(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.messages.get(id).await?))
}

/// `POST /api/messages/{id}/notify`: retry the owner notification.
pub async fn resend_notification(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<NotificationStatus>), ApiError> {
    let status = state.messages.resend(id).await?;
    if let Some(code) = status.status.failure_code() {
        return Err(ApiError::Notification {
            code,
            message: status.error_message.unwrap_or_else(|| code.to_string()),
        });
    }

    let http = match status.status {
        DeliveryState::RetryInProgress => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    Ok((http, Json(status)))
}
