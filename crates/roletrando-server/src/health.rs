use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::content::Bank;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: String,
    pub websocket_connections: usize,
    pub active_rooms: usize,
    pub themes: usize,
}

/// `GET /health`: liveness plus a few gauges.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let active_rooms = state.rooms.read().await.room_count();
    Json(HealthReport {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.stats.uptime(),
        websocket_connections: state.ws_connection_count.load(Ordering::Relaxed),
        active_rooms,
        themes: state.content.theme_names().len(),
    })
}

/// `GET /ready`: the default theme must be playable in both room kinds.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let (_, theme) = state.content.resolve(None);
    if theme.wheel.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready: no wheel phrases")
    } else if theme.bank(Bank::Quiz).is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready: no quiz questions")
    } else {
        (StatusCode::OK, "ready")
    }
}
