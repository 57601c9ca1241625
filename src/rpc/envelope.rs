//! Envelope types and field-presence classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ProtocolError, RpcError};
use super::PROTOCOL_VERSION;

/// Correlation id linking a [`Request`] to its eventual [`Response`].
///
/// The transport allocates monotonically increasing integers; string ids
/// are accepted on the wire for interoperability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id, the form this crate's client transport allocates.
    Number(i64),
    /// String id, accepted from foreign clients.
    Text(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A method invocation expecting exactly one [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name in the flat namespace (e.g. `player.seek`).
    pub method: String,
    /// Method parameters, validated per-method by the dispatcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id echoed back on the response.
    pub id: RequestId,
}

impl Request {
    /// Builds an outbound request with the version stamped.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// The reply to a [`Request`]: exactly one of `result` / `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request being answered; `null` when the request id could
    /// not be recovered (parse failures).
    pub id: Option<RequestId>,
    /// Success payload, absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response. `id` is `None` only when the inbound
    /// frame was unparseable.
    #[must_use]
    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A one-way message: no `id`, the receiving side must not reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Optional payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Builds an outbound notification with the version stamped.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// One message unit on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Method invocation carrying an id.
    Request(Request),
    /// Reply correlated to a prior request.
    Response(Response),
    /// Fire-and-forget message.
    Notification(Notification),
}

impl Envelope {
    /// Decodes and classifies one frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Parse`] when the payload is not well-formed JSON,
    /// [`ProtocolError::InvalidEnvelope`] when it matches no envelope shape,
    /// and [`ProtocolError::InvalidRequest`] when a request carries an
    /// unsupported protocol version.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::classify(value)
    }

    /// Classifies a JSON value by field presence: `id` + `method` is a
    /// request, `id` + (`result` | `error`) is a response, `method` without
    /// `id` is a notification.
    ///
    /// # Errors
    ///
    /// See [`Envelope::parse`].
    pub fn classify(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(fields) = &value else {
            return Err(ProtocolError::InvalidEnvelope(
                "frame is not a JSON object".to_string(),
            ));
        };

        let has_id = fields.contains_key("id");
        let has_method = fields.contains_key("method");
        let has_outcome = fields.contains_key("result") || fields.contains_key("error");

        if has_id && has_method {
            let request: Request = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;
            if request.jsonrpc != PROTOCOL_VERSION {
                return Err(ProtocolError::InvalidRequest(format!(
                    "unsupported protocol version: {}",
                    request.jsonrpc
                )));
            }
            Ok(Self::Request(request))
        } else if has_id && has_outcome {
            let response: Response = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;
            if response.result.is_some() == response.error.is_some() {
                return Err(ProtocolError::InvalidEnvelope(
                    "response must carry exactly one of result/error".to_string(),
                ));
            }
            Ok(Self::Response(response))
        } else if has_method {
            let notification: Notification = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;
            Ok(Self::Notification(notification))
        } else {
            Err(ProtocolError::InvalidEnvelope(
                "frame matches no envelope shape".to_string(),
            ))
        }
    }

    /// Serializes the envelope to a wire frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error; envelopes built through the
    /// constructors in this module always serialize cleanly.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
