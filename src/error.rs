//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the REST side channel.
//! Each variant maps to one of the wire-level error codes from
//! [`crate::rpc::codes`] and to an HTTP status, so a failure reads the
//! same whether it arrived over WebSocket or HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::player::SurfaceError;
use crate::rpc::codes;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": -32602,
///     "message": "missing parameter: time",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code, shared with the WebSocket protocol.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Codes
///
/// | Code    | Category             | HTTP Status                |
/// |---------|----------------------|----------------------------|
/// | -32600  | Invalid request      | 400 Bad Request            |
/// | -32601  | Unknown command      | 404 Not Found              |
/// | -32602  | Invalid params       | 400 Bad Request            |
/// | -32000  | Control surface      | 502 Bad Gateway            |
/// | -32001  | Player unavailable   | 503 Service Unavailable    |
/// | -32002  | Seek failed          | 502 Bad Gateway            |
/// | -32603  | Internal             | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No such player command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A request parameter was missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The native control surface failed to run a command.
    #[error("control surface failure: {0}")]
    Surface(#[from] SurfaceError),

    /// The player application is not running or reports no track.
    #[error("player unavailable")]
    PlayerUnavailable,

    /// A seek command was rejected by the player.
    #[error("seek failed: {0}")]
    SeekFailed(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> i64 {
        match self {
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::UnknownCommand(_) => codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Surface(_) => codes::SURFACE_FAILURE,
            Self::PlayerUnavailable => codes::PLAYER_UNAVAILABLE,
            Self::SeekFailed(_) => codes::SEEK_FAILED,
            Self::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::UnknownCommand(_) => StatusCode::NOT_FOUND,
            Self::Surface(_) | Self::SeekFailed(_) => StatusCode::BAD_GATEWAY,
            Self::PlayerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
