//! Tokengate Gatekeeper
//!
//! Request-time token validation gateway. Each inbound request must carry a
//! `JWT <token>` Authorization header; the token is checked against the remote
//! authorization service and, when valid, the returned claims are copied into
//! request headers before the request is forwarded upstream.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokengate_gatekeeper::{ClaimHeaderPolicy, Gatekeeper};
//! use tokengate_grpc::{ChannelConfig, ValidationClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ValidationClient::connect_lazy(&ChannelConfig::new("http://auth:50051"))?;
//! let gatekeeper = Gatekeeper::new(Arc::new(client), ClaimHeaderPolicy::default());
//!
//! // Install on any axum router
//! let app: axum::Router = axum::Router::new().layer(axum::middleware::from_fn_with_state(
//!     gatekeeper,
//!     tokengate_gatekeeper::gate,
//! ));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod handlers;
pub mod upstream;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use gatekeeper::{
    extract_token, gate, ClaimHeaderError, ClaimHeaderPolicy, Gatekeeper, Rejection,
    RequestDecision, AUTH_SCHEME_PREFIX,
};

use handlers::{create_router, AppState};
use std::sync::Arc;
use tokengate_grpc::ValidationClient;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use upstream::Upstream;

/// Build the gateway router from configuration
///
/// The authorization service channel is connected lazily, so this performs
/// no network I/O.
pub fn build_app(config: &GatewayConfig) -> Result<axum::Router, GatewayError> {
    config.validate()?;

    let client = ValidationClient::connect_lazy(&config.channel_config())?;
    let gatekeeper = Gatekeeper::new(
        Arc::new(client),
        ClaimHeaderPolicy::new(config.claim_header_prefix.clone()),
    );
    let upstream = Upstream::new(config.upstream_url.clone(), config.upstream_timeout())?;

    let state = AppState {
        gatekeeper,
        upstream: Arc::new(upstream),
    };

    Ok(create_router(state))
}

/// Start the gateway HTTP server
///
/// Initializes tracing, builds the router and serves until the listener
/// fails.
pub async fn start_server(config: GatewayConfig) -> Result<(), GatewayError> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    info!("Starting Tokengate");
    info!("Bind address: {}", config.bind_addr());
    info!("Authorization service: {}", config.auth_service_url);
    info!("Upstream: {}", config.upstream_url);

    let app = build_app(&config)?;

    // Bind and serve
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Gateway listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_app_from_default_config() {
        let config = GatewayConfig::default_test_config();
        assert!(build_app(&config).is_ok());
    }

    #[tokio::test]
    async fn test_build_app_rejects_bad_endpoint() {
        let mut config = GatewayConfig::default_test_config();
        config.auth_service_url = "not a uri".to_string();
        assert!(matches!(build_app(&config), Err(GatewayError::Client(_))));
    }
}
