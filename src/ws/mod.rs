//! WebSocket layer: upgrade handling and the per-connection loop.
//!
//! The endpoint at `/ws` carries the JSON-RPC protocol: requests and
//! notifications inbound, responses and `player.stateChanged`
//! notifications outbound.

pub mod connection;
pub mod handler;

/// Method name of the snapshot broadcast notification.
pub const STATE_CHANGED_METHOD: &str = "player.stateChanged";

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::routing::get;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::app_state::AppState;
    use crate::broadcast::SnapshotBroadcaster;
    use crate::client::{TransportError, WsTransport, WsTransportConfig};
    use crate::dispatch::CommandDispatcher;
    use crate::player::{PlayerCommand, PlayerSnapshot, PlayerSurface, SurfaceError};
    use crate::rpc::codes;

    /// Surface double reporting one fixed playing track.
    #[derive(Debug)]
    struct FixedSurface(PlayerSnapshot);

    #[async_trait::async_trait]
    impl PlayerSurface for FixedSurface {
        async fn snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError> {
            Ok(Some(self.0.clone()))
        }

        async fn execute(&self, _command: PlayerCommand) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    /// Binds a gateway on an ephemeral port and returns its `ws://` URL.
    async fn spawn_gateway() -> String {
        let surface: Arc<dyn PlayerSurface> = Arc::new(FixedSurface(PlayerSnapshot {
            name: "Harvest Moon".into(),
            artist: "Neil Young".into(),
            album: "Harvest Moon".into(),
            current_time: 12.0,
            duration: 305.0,
            is_playing: true,
        }));
        let state = AppState {
            dispatcher: Arc::new(CommandDispatcher::new(Arc::clone(&surface))),
            broadcaster: SnapshotBroadcaster::new(surface, Duration::from_millis(25), 16),
        };
        let app = Router::new()
            .route("/ws", get(super::handler::ws_handler))
            .with_state(state);

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("local_addr failed");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("ws://{addr}/ws")
    }

    fn transport(url: &str) -> WsTransport {
        WsTransport::new(url, WsTransportConfig::default())
    }

    #[tokio::test]
    async fn ping_round_trips_over_a_live_socket() {
        let url = spawn_gateway().await;
        let client = transport(&url);
        let Ok(()) = client.connect().await else {
            panic!("connect failed");
        };

        let Ok(result) = client
            .request_with_timeout("system.ping", None, Duration::from_secs(5))
            .await
        else {
            panic!("ping failed");
        };
        assert!(result.get("uptimeSecs").is_some());

        client.disconnect();
    }

    #[tokio::test]
    async fn invalid_seek_is_rejected_with_invalid_params() {
        let url = spawn_gateway().await;
        let client = transport(&url);
        let Ok(()) = client.connect().await else {
            panic!("connect failed");
        };

        let outcome = client
            .request_with_timeout(
                "player.seek",
                Some(json!({"time": "soon"})),
                Duration::from_secs(5),
            )
            .await;

        let Err(TransportError::Rpc(error)) = outcome else {
            panic!("expected an RPC error");
        };
        assert_eq!(error.code, codes::INVALID_PARAMS);

        client.disconnect();
    }

    #[tokio::test]
    async fn connected_client_receives_a_state_changed_notification() {
        let url = spawn_gateway().await;
        let client = transport(&url);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let _subscription = client.on_notification(move |notification| {
            let _ = seen_tx.send((notification.method.clone(), notification.params.clone()));
        });

        let Ok(()) = client.connect().await else {
            panic!("connect failed");
        };

        let Ok(Some((method, params))) =
            tokio::time::timeout(Duration::from_secs(5), seen_rx.recv()).await
        else {
            panic!("no notification arrived");
        };
        assert_eq!(method, super::STATE_CHANGED_METHOD);
        let Some(params) = params else {
            panic!("notification carried no params");
        };
        assert_eq!(params["name"], "Harvest Moon");
        assert_eq!(params["isPlaying"], json!(true));

        client.disconnect();
    }
}
