//! HTTP request handlers for the gateway.
//!
//! Every request except the health check passes through the gate middleware
//! before being forwarded upstream.

use crate::gatekeeper::{gate, Gatekeeper};
use crate::upstream::{Upstream, UpstreamError};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gatekeeper deciding forward vs. terminate
    pub gatekeeper: Gatekeeper,
    /// Upstream receiving accepted requests
    pub upstream: Arc<Upstream>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
}

/// GET /health - Liveness of the gateway itself
async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Fallback - forward an accepted request upstream
async fn forward(State(state): State<AppState>, req: Request) -> Response {
    match state.upstream.forward(req).await {
        Ok(response) => response,
        Err(e) => upstream_failure(&e),
    }
}

/// Response sent when forwarding does not complete
fn upstream_failure(e: &UpstreamError) -> Response {
    match e {
        UpstreamError::Body(_) => {
            warn!(error = %e, "Request body rejected");
            (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
        }
        _ => {
            error!(error = %e, "Upstream forwarding failed");
            (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response()
        }
    }
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .fallback(forward)
        .layer(middleware::from_fn_with_state(state.gatekeeper.clone(), gate))
        // Added after the layer, so not gated
        .route("/health", get(health_check))
        .with_state(state)
}
