//! `GET /api/usage/summary?user_id&days`.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "d_user")]
    pub user_id: String,
    #[serde(default = "d_days")]
    pub days: u32,
}

fn d_user() -> String {
    "local".into()
}
fn d_days() -> u32 {
    7
}

pub async fn summary(
    State(state): State<ApiState>,
    Query(query): Query<SummaryQuery>,
) -> Json<serde_json::Value> {
    let summary = state.ctx.usage.summary(&query.user_id, query.days).await;
    Json(serde_json::json!({
        "user_id": query.user_id,
        "days": query.days,
        "summary": summary,
    }))
}
