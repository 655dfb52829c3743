// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the chat API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use parley_agent::ChatOrchestrator;
use parley_config::model::GatewayConfig;
use parley_core::ParleyError;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::{RateLimiter, rate_limit_middleware};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub limiter: Arc<RateLimiter>,
    /// Process start time for uptime calculation.
    pub started: Instant,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<ChatOrchestrator>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            orchestrator,
            limiter,
            started: Instant::now(),
        }
    }
}

/// Builds the application router.
///
/// Chat routes sit behind the rate limiter; `/health` does not.
pub fn build_router(state: GatewayState) -> Router {
    let chat_routes = Router::new()
        .route("/chat/message", post(handlers::post_message))
        .route("/chat/message/async", post(handlers::post_message_async))
        .route("/chat/history", get(handlers::get_history))
        .route("/chat/jobs/{id}", get(handlers::get_job))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ParleyError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
