//! Configuration file parsing for the gateway.
//!
//! Loads settings from TOML files including bind address, authorization
//! service endpoint, upstream and timeouts.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokengate_grpc::channel::{
    ChannelConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS,
};

/// Gateway configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),
}

/// Gateway configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// Authorization service gRPC endpoint (e.g., "http://auth:50051")
    pub auth_service_url: String,

    /// Service receiving accepted requests (e.g., "http://app:3000")
    pub upstream_url: String,

    /// Deadline for each CheckToken call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Timeout for connecting to the authorization service
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout for a forwarded upstream request
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_ms: u64,

    /// Prefix added to claim-derived header names (empty keeps names verbatim)
    #[serde(default)]
    pub claim_header_prefix: String,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default upstream timeout: 30 seconds
fn default_upstream_timeout() -> u64 {
    30_000
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_service_url.is_empty() {
            return Err(ConfigError::MissingField("auth_service_url".to_string()));
        }
        if self.upstream_url.is_empty() {
            return Err(ConfigError::MissingField("upstream_url".to_string()));
        }
        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        GatewayConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            auth_service_url: "http://localhost:50051".to_string(),
            upstream_url: "http://localhost:3000".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            upstream_timeout_ms: default_upstream_timeout(),
            claim_header_prefix: String::new(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Channel settings for the authorization service
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.auth_service_url.clone())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }

    /// Upstream request timeout
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default_test_config();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.request_timeout_ms, 5_000);
        assert!(config.claim_header_prefix.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = GatewayConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            auth_service_url = "http://auth:50051"
            upstream_url = "http://app:3000"
            request_timeout_ms = 750
            claim_header_prefix = "x-claim-"
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.auth_service_url, "http://auth:50051");
        assert_eq!(config.upstream_url, "http://app:3000");
        assert_eq!(config.request_timeout_ms, 750);
        assert_eq!(config.connect_timeout_ms, 2_000);
        assert_eq!(config.upstream_timeout_ms, 30_000);
        assert_eq!(config.claim_header_prefix, "x-claim-");

        let channel = config.channel_config();
        assert_eq!(channel.endpoint, "http://auth:50051");
        assert_eq!(channel.request_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_from_file_rejects_empty_auth_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            auth_service_url = ""
            upstream_url = "http://app:3000"
            "#
        )
        .unwrap();

        let result = GatewayConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::MissingField(f)) if f == "auth_service_url"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = GatewayConfig::from_file("/nonexistent/tokengate.toml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
