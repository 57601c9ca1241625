//! JSON-RPC 2.0 message model: envelopes, error objects, and validity rules.
//!
//! Every frame on the wire is one [`Envelope`]: a [`Request`] (carries an
//! `id` and expects exactly one [`Response`]), a [`Response`], or a
//! [`Notification`] (no `id`, never answered). Classification is driven by
//! field presence, not by an explicit type tag.

pub mod envelope;
pub mod error;

pub use envelope::{Envelope, Notification, Request, RequestId, Response};
pub use error::{ProtocolError, RpcError, codes};

/// Protocol version stamped on every outbound envelope.
pub const PROTOCOL_VERSION: &str = "2.0";
