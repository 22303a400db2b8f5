//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state from configuration
//! - Create the Axum router with message, health and admin routes
//! - Wire up middleware (request id, tracing, timeout, metrics, rate limit)
//! - Serve on a listener until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::lifecycle::Shutdown;
use crate::messages::{self, MessageService, MessageStore};
use crate::notification::{MailTransport, NotificationDispatcher};
use crate::observability::metrics;
use crate::resilience::CircuitState;
use crate::security::{rate_limit_middleware, RouteLimits};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<MessageService>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub limits: Arc<RouteLimits>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Wire the dispatcher, limiter and message service for `config`.
    pub fn from_config(
        config: ServiceConfig,
        transport: Option<Arc<dyn MailTransport>>,
        store: Arc<dyn MessageStore>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::from_config(&config, transport, shutdown));
        let messages = Arc::new(MessageService::new(
            store,
            dispatcher.clone(),
            config.mail.clone(),
        ));
        Self {
            messages,
            dispatcher,
            limits: Arc::new(RouteLimits::from_config(&config.rate_limit)),
            config: Arc::new(config),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    mail_enabled: bool,
    circuit_breaker: CircuitState,
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "UP",
        mail_enabled: state.dispatcher.is_enabled(),
        circuit_breaker: state.dispatcher.circuit_breaker().state(),
    })
}

async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

    Router::new()
        .route("/health", get(health))
        .merge(messages::handlers::routes())
        .merge(setup_admin_router(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.limits.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request.request_id().unwrap_or("-"),
                )
            }),
        )
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

/// HTTP server for the messages service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server, accepting connections on the given listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
