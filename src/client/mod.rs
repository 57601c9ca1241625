//! Client-side transport: one logical connection to the gateway with
//! request/response correlation, notification fan-out, a bounded outbound
//! queue, and exponential-backoff reconnection.

pub mod backoff;
pub mod queue;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use queue::OutboundQueue;
pub use transport::{
    ConnectionState, NotificationSubscription, TransportError, WsTransport, WsTransportConfig,
};
