//! Loopback HTTP + WebSocket API.

pub mod health;
pub mod message;
pub mod usage;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::runtime::InboundDispatcher;
use crate::state::HostContext;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: HostContext,
    pub dispatcher: Arc<InboundDispatcher>,
}

pub fn build_router(ctx: HostContext) -> Router {
    let state = ApiState {
        dispatcher: Arc::new(InboundDispatcher::new(ctx.clone())),
        ctx,
    };

    Router::new()
        .route("/health", get(health::health))
        .route("/message", post(message::post_message))
        .route("/api/usage/summary", get(usage::summary))
        .route("/ws", get(ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
