//! `POST /message` — run one turn and return the reply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::runtime::TurnRequest;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default = "d_user")]
    pub user_id: String,
    #[serde(default = "d_channel")]
    pub channel_id: String,
    pub text: String,
}

fn d_user() -> String {
    "local".into()
}
fn d_channel() -> String {
    "api".into()
}

pub async fn post_message(
    State(state): State<ApiState>,
    Json(body): Json<MessageBody>,
) -> impl IntoResponse {
    if body.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "text must not be empty" })),
        );
    }

    let outcome = state
        .dispatcher
        .dispatch_and_wait(TurnRequest {
            user_id: body.user_id,
            channel_id: body.channel_id,
            text: body.text,
        })
        .await;

    match outcome {
        Some(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({ "response": outcome.response })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "session busy, try again" })),
        ),
    }
}
