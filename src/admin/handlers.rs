use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::DeliveryMode;
use crate::http::server::AppState;
use crate::resilience::CircuitSnapshot;
use crate::security::LimitStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResilienceStatus {
    pub mail_enabled: bool,
    pub delivery: DeliveryMode,
    pub max_attempts: u32,
    pub circuit_breaker: CircuitSnapshot,
    pub rate_limits: Vec<LimitStats>,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_resilience(State(state): State<AppState>) -> Json<ResilienceStatus> {
    let dispatcher = &state.dispatcher;
    Json(ResilienceStatus {
        mail_enabled: dispatcher.is_enabled(),
        delivery: dispatcher.delivery_mode(),
        max_attempts: dispatcher.retry_policy().max_attempts(),
        circuit_breaker: dispatcher.circuit_breaker().snapshot(),
        rate_limits: state.limits.stats(),
    })
}
