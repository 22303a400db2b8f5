use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AdminConfig;
use crate::error::ApiError;
use crate::http::server::AppState;

/// Whether `headers` carry the admin bearer key. Always true when admin auth is disabled.
pub fn is_authorized(config: &AdminConfig, headers: &HeaderMap) -> bool {
    if !config.enabled {
        return true;
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == config.api_key)
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_authorized(&state.config.admin, request.headers()) {
        return next.run(request).await;
    }
    tracing::warn!(path = %request.uri().path(), "Rejected admin request");
    ApiError::Unauthorized.into_response()
}

/// Extractor guarding individual handlers with the admin key.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_authorized(&state.config.admin, &parts.headers) {
            Ok(AdminAccess)
        } else {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin request");
            Err(ApiError::Unauthorized)
        }
    }
}
