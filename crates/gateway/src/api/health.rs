//! `GET /health` — status, uptime, engines, channels, users.

use axum::extract::State;
use axum::Json;

use super::ApiState;

pub async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let uptime_secs = (chrono::Utc::now() - state.ctx.started_at).num_seconds();
    let engines = state.ctx.orchestrator.snapshot();
    let channels = state.ctx.channels.connected();
    let users = state.ctx.memory.user_count().await;

    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "engines": engines,
        "channels": channels,
        "users": users,
    }))
}
