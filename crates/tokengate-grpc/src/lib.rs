#![warn(missing_docs)]

//! Tokengate gRPC Layer
//!
//! Client side of the remote authorization service contract.
//! Implements:
//! - Payload decoding of `google.protobuf.Any` wrapper values into claims
//! - The CheckToken validation client
//! - Channel configuration for the shared connection

// Include generated protobuf code
pub mod proto {
    //! Generated protobuf types and service definitions
    tonic::include_proto!("auth.v1");
}

pub mod channel;
pub mod client;
pub mod payload;

pub use channel::ChannelConfig;
pub use client::{TokenStatus, TokenValidator, ValidationClient, ValidationError, ValidationOutcome};
pub use payload::{decode_payload, ClaimSet, ClaimValue, PayloadError, ValueKind};
