//! Channel configuration for the authorization service connection
//!
//! The channel is created once at startup and shared by every request.

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Default per-call deadline in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Authorization service URL (e.g. "http://auth:50051")
    pub endpoint: String,

    /// Deadline applied to every CheckToken call
    pub request_timeout: Duration,

    /// Timeout for establishing the underlying connection
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:50051".to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl ChannelConfig {
    /// Create a configuration for the given endpoint with default timeouts
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Override the per-call deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a lazily connected channel. No network I/O happens here; the
    /// first call establishes the connection.
    ///
    /// # Errors
    /// Returns error if the endpoint URL cannot be parsed
    pub fn connect_lazy(&self) -> Result<Channel, tonic::transport::Error> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())?
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout);

        Ok(endpoint.connect_lazy())
    }
}
