//! Validation client for the remote authorization service
//!
//! Sends one CheckToken call per credential and normalizes the typed payload
//! into a [`ClaimSet`].

use tonic::transport::Channel;
use tracing::debug;

use crate::channel::ChannelConfig;
use crate::payload::{decode_payload, ClaimSet, PayloadError};
use crate::proto::auth_service_client::AuthServiceClient;
use crate::proto::{self, CheckTokenRequest};

/// Errors raised by a validation call. An invalid token is not an error.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Transport failure, deadline exceeded or remote-side error
    #[error("validation call failed: {0}")]
    Call(#[source] tonic::Status),

    /// The call succeeded but its payload did not match the expected shape
    #[error("payload mapping failed: {0}")]
    Payload(#[from] PayloadError),

    /// The configured endpoint is unusable
    #[error("invalid authorization service endpoint: {0}")]
    Endpoint(#[from] tonic::transport::Error),
}

/// Verdict of the authorization service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Token accepted
    Valid,
    /// Token rejected
    Invalid,
}

impl From<i32> for TokenStatus {
    fn from(status: i32) -> Self {
        // Unknown numbers fail closed
        match proto::TokenStatus::try_from(status) {
            Ok(proto::TokenStatus::Valid) => TokenStatus::Valid,
            _ => TokenStatus::Invalid,
        }
    }
}

/// Result of one validation call
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Token verdict
    pub status: TokenStatus,
    /// Claims returned alongside the verdict
    pub claims: ClaimSet,
}

impl ValidationOutcome {
    /// Valid outcome carrying `claims`
    pub fn valid(claims: ClaimSet) -> Self {
        Self {
            status: TokenStatus::Valid,
            claims,
        }
    }

    /// Invalid outcome with no claims
    pub fn invalid() -> Self {
        Self {
            status: TokenStatus::Invalid,
            claims: ClaimSet::new(),
        }
    }

    /// Whether the token was accepted
    pub fn is_valid(&self) -> bool {
        self.status == TokenStatus::Valid
    }
}

/// Anything able to validate a bearer credential
#[tonic::async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token` and return the verdict with its claims
    async fn check_token(&self, token: &str) -> Result<ValidationOutcome, ValidationError>;
}

/// gRPC client for the authorization service
#[derive(Debug, Clone)]
pub struct ValidationClient {
    inner: AuthServiceClient<Channel>,
}

impl ValidationClient {
    /// Wrap an existing channel
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: AuthServiceClient::new(channel),
        }
    }

    /// Build a client over a lazily connected channel
    ///
    /// # Errors
    /// Returns error if the endpoint URL cannot be parsed
    pub fn connect_lazy(config: &ChannelConfig) -> Result<Self, ValidationError> {
        Ok(Self::new(config.connect_lazy()?))
    }
}

#[tonic::async_trait]
impl TokenValidator for ValidationClient {
    async fn check_token(&self, token: &str) -> Result<ValidationOutcome, ValidationError> {
        let request = CheckTokenRequest {
            token: token.to_string(),
        };

        // Channels are cheap to clone and multiplex concurrent calls
        let mut client = self.inner.clone();
        let response = client
            .check_token(request)
            .await
            .map_err(ValidationError::Call)?
            .into_inner();

        let claims = decode_payload(&response.payload)?;
        let status = TokenStatus::from(response.status);
        debug!(?status, claims = claims.len(), "CheckToken completed");

        Ok(ValidationOutcome { status, claims })
    }
}
