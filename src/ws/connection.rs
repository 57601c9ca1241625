//! Per-connection read/write loop.
//!
//! Reads envelope frames from the client and dispatches them, and forwards
//! snapshot broadcasts from the client's session, in order, over one socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::STATE_CHANGED_METHOD;
use crate::broadcast::ClientSession;
use crate::dispatch::CommandDispatcher;
use crate::player::PlayerSnapshot;
use crate::rpc::{Envelope, Notification, Response};

/// Runs the loop for a single WebSocket connection.
///
/// - Reads envelopes from the client: requests are answered, notifications
///   are executed silently, anything unparseable gets an error response
///   with a null id.
/// - Forwards snapshots from the [`ClientSession`] as `player.stateChanged`
///   notifications.
///
/// The session guard is dropped when the loop ends, releasing the
/// broadcaster's client count.
pub async fn run_connection(
    socket: WebSocket,
    mut session: ClientSession,
    dispatcher: Arc<CommandDispatcher>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Retained state first, so the client renders before the next poll tick.
    if let Some(snapshot) = session.initial_snapshot() {
        if let Some(frame) = snapshot_frame(&snapshot)
            && ws_tx.send(Message::text(frame)).await.is_err()
        {
            return;
        }
    }

    loop {
        tokio::select! {
            // Incoming envelope from the client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(frame) = handle_frame(&text, &dispatcher).await
                            && ws_tx.send(Message::text(frame)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Snapshot broadcast from the poll loop
            snapshot = session.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        if let Some(frame) = snapshot_frame(&snapshot)
                            && ws_tx.send(Message::text(frame)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind snapshot broadcasts");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Serializes a snapshot into a `player.stateChanged` notification frame.
fn snapshot_frame(snapshot: &PlayerSnapshot) -> Option<String> {
    let params = serde_json::to_value(snapshot).ok()?;
    let notification = Notification::new(STATE_CHANGED_METHOD, Some(params));
    serde_json::to_string(&notification).ok()
}

/// Handles one inbound text frame, returning the frame to send back, if any.
///
/// The response-emission rule lives here: frames carrying an `id` always
/// get exactly one response; frames without one never get anything.
async fn handle_frame(text: &str, dispatcher: &CommandDispatcher) -> Option<String> {
    match Envelope::parse(text) {
        Ok(Envelope::Request(request)) => {
            let response = dispatcher.dispatch(&request).await;
            serde_json::to_string(&response).ok()
        }
        Ok(Envelope::Notification(notification)) => {
            dispatcher.dispatch_notification(&notification).await;
            None
        }
        Ok(Envelope::Response(response)) => {
            // Clients have no business answering the server.
            tracing::debug!(id = ?response.id, "ignoring response envelope from client");
            None
        }
        Err(error) => {
            tracing::debug!(error = %error, "dropping malformed frame");
            let response = Response::failure(None, error.to_rpc_error());
            serde_json::to_string(&response).ok()
        }
    }
}
