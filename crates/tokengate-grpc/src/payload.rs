//! Claim payload decoding
//!
//! Maps the `google.protobuf.Any` values returned by the authorization service
//! into typed claim values. Only the protobuf wrapper types are recognized.

use std::collections::HashMap;
use std::fmt;

use base64::Engine as _;
use prost::Message;
use prost_types::Any;

/// Prefix shared by every recognized type URL
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Decoded claims for one validation call, keyed by claim name
pub type ClaimSet = HashMap<String, ClaimValue>;

/// Error type for payload decoding failures
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Type URL outside the recognized wrapper set
    #[error("unsupported value type {type_url:?} for claim {claim:?}")]
    UnsupportedType {
        /// Claim carrying the value
        claim: String,
        /// Offending type URL
        type_url: String,
    },

    /// Value bytes do not decode as the declared wrapper type
    #[error("malformed {kind} value for claim {claim:?}: {source}")]
    Malformed {
        /// Claim carrying the value
        claim: String,
        /// Declared kind
        kind: ValueKind,
        /// Underlying protobuf error
        #[source]
        source: prost::DecodeError,
    },
}

/// The closed set of wrapper types a claim value may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `google.protobuf.StringValue`
    Text,
    /// `google.protobuf.Int32Value`
    Int32,
    /// `google.protobuf.Int64Value`
    Int64,
    /// `google.protobuf.UInt32Value`
    UInt32,
    /// `google.protobuf.UInt64Value`
    UInt64,
    /// `google.protobuf.FloatValue`
    Float,
    /// `google.protobuf.DoubleValue`
    Double,
    /// `google.protobuf.BoolValue`
    Bool,
    /// `google.protobuf.BytesValue`
    Bytes,
}

impl ValueKind {
    /// Every recognized kind
    pub const ALL: [ValueKind; 9] = [
        ValueKind::Text,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::UInt32,
        ValueKind::UInt64,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Bool,
        ValueKind::Bytes,
    ];

    /// Fully qualified protobuf message name of the wrapper
    pub fn message_name(self) -> &'static str {
        match self {
            ValueKind::Text => "google.protobuf.StringValue",
            ValueKind::Int32 => "google.protobuf.Int32Value",
            ValueKind::Int64 => "google.protobuf.Int64Value",
            ValueKind::UInt32 => "google.protobuf.UInt32Value",
            ValueKind::UInt64 => "google.protobuf.UInt64Value",
            ValueKind::Float => "google.protobuf.FloatValue",
            ValueKind::Double => "google.protobuf.DoubleValue",
            ValueKind::Bool => "google.protobuf.BoolValue",
            ValueKind::Bytes => "google.protobuf.BytesValue",
        }
    }

    /// Type URL used when the wrapper is packed into an `Any`
    pub fn type_url(self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.message_name())
    }

    /// Resolve a type URL. Returns `None` for anything outside the wrapper set.
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        let name = type_url.strip_prefix(TYPE_URL_PREFIX)?;
        Self::ALL.into_iter().find(|kind| kind.message_name() == name)
    }

    fn decode(self, bytes: &[u8]) -> Result<ClaimValue, prost::DecodeError> {
        let value = match self {
            ValueKind::Text => ClaimValue::Text(String::decode(bytes)?),
            ValueKind::Int32 => ClaimValue::Int32(i32::decode(bytes)?),
            ValueKind::Int64 => ClaimValue::Int64(i64::decode(bytes)?),
            ValueKind::UInt32 => ClaimValue::UInt32(u32::decode(bytes)?),
            ValueKind::UInt64 => ClaimValue::UInt64(u64::decode(bytes)?),
            ValueKind::Float => ClaimValue::Float(f32::decode(bytes)?),
            ValueKind::Double => ClaimValue::Double(f64::decode(bytes)?),
            ValueKind::Bool => ClaimValue::Bool(bool::decode(bytes)?),
            ValueKind::Bytes => ClaimValue::Bytes(Vec::<u8>::decode(bytes)?),
        };
        Ok(value)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_name())
    }
}

/// A decoded claim value
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    /// UTF-8 text
    Text(String),
    /// Signed 32-bit integer
    Int32(i32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl ClaimValue {
    /// Wire kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            ClaimValue::Text(_) => ValueKind::Text,
            ClaimValue::Int32(_) => ValueKind::Int32,
            ClaimValue::Int64(_) => ValueKind::Int64,
            ClaimValue::UInt32(_) => ValueKind::UInt32,
            ClaimValue::UInt64(_) => ValueKind::UInt64,
            ClaimValue::Float(_) => ValueKind::Float,
            ClaimValue::Double(_) => ValueKind::Double,
            ClaimValue::Bool(_) => ValueKind::Bool,
            ClaimValue::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Pack this value into an `Any` using its wrapper type
    pub fn to_any(&self) -> Any {
        let value = match self {
            ClaimValue::Text(v) => v.encode_to_vec(),
            ClaimValue::Int32(v) => v.encode_to_vec(),
            ClaimValue::Int64(v) => v.encode_to_vec(),
            ClaimValue::UInt32(v) => v.encode_to_vec(),
            ClaimValue::UInt64(v) => v.encode_to_vec(),
            ClaimValue::Float(v) => v.encode_to_vec(),
            ClaimValue::Double(v) => v.encode_to_vec(),
            ClaimValue::Bool(v) => v.encode_to_vec(),
            ClaimValue::Bytes(v) => v.encode_to_vec(),
        };

        Any {
            type_url: self.kind().type_url(),
            value,
        }
    }
}

/// Text form used when a claim is copied into a request header.
/// Bytes are rendered as padded standard base64.
impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Text(v) => f.write_str(v),
            ClaimValue::Int32(v) => write!(f, "{}", v),
            ClaimValue::Int64(v) => write!(f, "{}", v),
            ClaimValue::UInt32(v) => write!(f, "{}", v),
            ClaimValue::UInt64(v) => write!(f, "{}", v),
            ClaimValue::Float(v) => write!(f, "{}", v),
            ClaimValue::Double(v) => write!(f, "{}", v),
            ClaimValue::Bool(v) => write!(f, "{}", v),
            ClaimValue::Bytes(v) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(v))
            }
        }
    }
}

/// Decode a single packed value belonging to `claim`
pub fn decode_value(claim: &str, value: &Any) -> Result<ClaimValue, PayloadError> {
    let kind = ValueKind::from_type_url(&value.type_url).ok_or_else(|| {
        PayloadError::UnsupportedType {
            claim: claim.to_string(),
            type_url: value.type_url.clone(),
        }
    })?;

    kind.decode(&value.value)
        .map_err(|source| PayloadError::Malformed {
            claim: claim.to_string(),
            kind,
            source,
        })
}

/// Decode a whole payload. The first bad entry fails the call and no partial
/// claim set is returned.
pub fn decode_payload(payload: &HashMap<String, Any>) -> Result<ClaimSet, PayloadError> {
    payload
        .iter()
        .map(|(claim, value)| Ok((claim.clone(), decode_value(claim, value)?)))
        .collect()
}
