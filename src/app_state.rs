//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::broadcast::SnapshotBroadcaster;
use crate::dispatch::CommandDispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Command dispatcher bridging requests to the control surface.
    pub dispatcher: Arc<CommandDispatcher>,
    /// Poll-driven snapshot broadcaster for WebSocket subscriptions.
    pub broadcaster: SnapshotBroadcaster,
}
