//! Gateway error types

use thiserror::Error;

/// Errors that can occur while starting or running the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Authorization service client could not be created
    #[error("Auth client error: {0}")]
    Client(#[from] tokengate_grpc::ValidationError),

    /// Upstream client could not be created
    #[error("Upstream error: {0}")]
    Upstream(#[from] crate::upstream::UpstreamError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}
