//! # playdeck-gateway
//!
//! WebSocket and REST gateway for a local desktop media player.
//!
//! The native control surface (an `osascript` subprocess driving the
//! player application) is slow and pull-only; this crate wraps it in a
//! JSON-RPC 2.0 request/response protocol plus a change-driven push
//! channel, so remote clients see a responsive, event-driven player.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WsTransport, HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Connections (ws/)
//!     │
//!     ├── CommandDispatcher (dispatch/)
//!     ├── SnapshotBroadcaster (broadcast/)
//!     │
//!     └── PlayerSurface → osascript → player app (player/)
//! ```
//!
//! The [`client`] module is the other half of the wire protocol: a
//! reconnecting transport for programs embedding a gateway client.

pub mod api;
pub mod app_state;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod player;
pub mod rpc;
pub mod ws;
