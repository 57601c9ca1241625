//! Protocol error codes and the wire-level error object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved JSON-RPC error codes.
///
/// Standard protocol errors occupy −32700…−32600; application-specific
/// failures (native player surface) occupy −32000…−32099.
pub mod codes {
    /// Payload was not well-formed JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Envelope shape or protocol version was invalid.
    pub const INVALID_REQUEST: i64 = -32600;
    /// No handler is registered for the method name.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// A required parameter was missing or wrongly typed.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Unexpected server-side failure.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// The native control surface command failed to execute.
    pub const SURFACE_FAILURE: i64 = -32000;
    /// The player is not running or reports nothing playing.
    pub const PLAYER_UNAVAILABLE: i64 = -32001;
    /// A seek command was rejected by the player.
    pub const SEEK_FAILED: i64 = -32002;
}

/// Wire-level error object carried inside a [`Response`](super::Response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code (see [`codes`]).
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional diagnostic payload, typically the underlying failure text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Builds an error with the given code and message and no data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a diagnostic payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Payload was not well-formed JSON.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "parse error")
    }

    /// Envelope shape or version was invalid.
    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, detail)
    }

    /// Unknown method name.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    /// Missing or wrongly typed parameter.
    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, detail)
    }

    /// Unexpected server-side failure.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, detail)
    }

    /// Native surface command failed; the raw failure text travels as `data`.
    #[must_use]
    pub fn surface_failure(detail: impl Into<String>) -> Self {
        Self::new(codes::SURFACE_FAILURE, "player command failed")
            .with_data(Value::String(detail.into()))
    }

    /// The player is not reachable or reports nothing playing.
    #[must_use]
    pub fn player_unavailable() -> Self {
        Self::new(codes::PLAYER_UNAVAILABLE, "player unavailable")
    }

    /// Seek was rejected by the player.
    #[must_use]
    pub fn seek_failed(detail: impl Into<String>) -> Self {
        Self::new(codes::SEEK_FAILED, "seek failed").with_data(Value::String(detail.into()))
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Failures raised while decoding or classifying an inbound frame.
///
/// These must be handled at the transport boundary and converted into a
/// protocol-level error [`Response`](super::Response) (or dropped, on the
/// client side); they never propagate into handler code.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not well-formed JSON.
    #[error("malformed frame: {0}")]
    Parse(#[from] serde_json::Error),

    /// The frame was valid JSON but matched no envelope shape.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The frame was a request with an unsupported protocol version.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// Maps this failure to the wire-level error object to send back.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Parse(_) => RpcError::parse_error(),
            Self::InvalidEnvelope(detail) | Self::InvalidRequest(detail) => {
                RpcError::invalid_request(detail.clone())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes_are_in_reserved_range() {
        assert_eq!(RpcError::parse_error().code, -32700);
        assert_eq!(RpcError::invalid_request("x").code, -32600);
        assert_eq!(RpcError::method_not_found("x").code, -32601);
        assert_eq!(RpcError::invalid_params("x").code, -32602);
        assert_eq!(RpcError::internal("x").code, -32603);
    }

    #[test]
    fn application_codes_sit_below_standard_range() {
        for code in [
            RpcError::surface_failure("boom").code,
            RpcError::player_unavailable().code,
            RpcError::seek_failed("boom").code,
        ] {
            assert!((-32099..=-32000).contains(&code));
        }
    }

    #[test]
    fn surface_failure_carries_diagnostic_data() {
        let err = RpcError::surface_failure("osascript exited with status 1");
        assert_eq!(
            err.data,
            Some(Value::String("osascript exited with status 1".to_string()))
        );
    }

    #[test]
    fn data_is_omitted_from_wire_when_absent() {
        let Ok(json) = serde_json::to_string(&RpcError::player_unavailable()) else {
            panic!("serialization failed");
        };
        assert!(!json.contains("data"));
    }
}
