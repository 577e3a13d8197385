//! `WS /ws?token=<deviceToken>` — the device-facing socket.
//!
//! Authentication: bearer header or `token` query param, validated
//! against the pairing store (hash compare, failure throttling). An
//! invalid token still upgrades, then closes immediately with close
//! code 1008 and throttle metadata in the reason.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::runtime::TurnRequest;

use super::ApiState;

/// Policy-violation close code (RFC 6455).
const CLOSE_POLICY: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
) -> impl IntoResponse {
    let token = bearer_token(&headers)
        .or(query.token)
        .unwrap_or_default();
    let client_id = addr.ip().to_string();

    ws.on_upgrade(move |socket| handle_socket(socket, state, token, client_id))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

async fn handle_socket(socket: WebSocket, state: ApiState, token: String, client_id: String) {
    let (mut sink, mut stream) = socket.split();

    // ── Auth ───────────────────────────────────────────────────────
    let Some((user_id, channel)) = state.ctx.pairing.validate(&token, &client_id) else {
        tracing::warn!(client = %client_id, "ws auth failed, closing 1008");
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_POLICY,
                reason: "invalid or throttled device token".into(),
            })))
            .await;
        return;
    };

    // ── Hello ──────────────────────────────────────────────────────
    let connected = serde_json::json!({
        "type": "connected",
        "user_id": user_id,
        "channel": channel,
    });
    if sink
        .send(Message::Text(connected.to_string()))
        .await
        .is_err()
    {
        return;
    }
    tracing::info!(user_id = %user_id, channel = %channel, "ws device connected");

    // ── Frame loop ─────────────────────────────────────────────────
    while let Some(frame) = stream.next().await {
        let raw = match frame {
            Ok(Message::Text(raw)) => raw,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };

        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                let _ = sink
                    .send(Message::Text(
                        serde_json::json!({
                            "type": "error",
                            "error": "frames must be JSON objects",
                        })
                        .to_string(),
                    ))
                    .await;
                continue;
            }
        };
        let request_id = parsed["request_id"].as_str().unwrap_or_default().to_string();

        match parsed["type"].as_str() {
            Some("message") => {
                let content = parsed["content"].as_str().unwrap_or_default();
                if content.is_empty() {
                    let _ = sink
                        .send(Message::Text(
                            serde_json::json!({
                                "type": "error",
                                "request_id": request_id,
                                "error": "content is required",
                            })
                            .to_string(),
                        ))
                        .await;
                    continue;
                }

                let outcome = state
                    .dispatcher
                    .dispatch_and_wait(TurnRequest {
                        user_id: user_id.clone(),
                        channel_id: format!("ws:{channel}"),
                        text: content.to_string(),
                    })
                    .await;

                let reply = match outcome {
                    Some(outcome) => serde_json::json!({
                        "type": "response",
                        "request_id": request_id,
                        "content": outcome.response,
                    }),
                    None => serde_json::json!({
                        "type": "error",
                        "request_id": request_id,
                        "error": "session busy",
                    }),
                };
                if sink.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
            Some("ping") => {
                let status = serde_json::json!({
                    "type": "status",
                    "request_id": request_id,
                    "uptime_secs": (chrono::Utc::now() - state.ctx.started_at).num_seconds(),
                });
                if sink.send(Message::Text(status.to_string())).await.is_err() {
                    break;
                }
            }
            other => {
                let _ = sink
                    .send(Message::Text(
                        serde_json::json!({
                            "type": "error",
                            "request_id": request_id,
                            "error": format!("unknown frame type '{}'", other.unwrap_or("")),
                        })
                        .to_string(),
                    ))
                    .await;
            }
        }
    }

    tracing::info!(user_id = %user_id, "ws device disconnected");
}
