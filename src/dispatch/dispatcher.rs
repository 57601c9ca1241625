//! Turns validated RPC envelopes into player-surface invocations.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Value, json};

use crate::player::{PlayerCommand, PlayerSnapshot, PlayerSurface, SurfaceError};
use crate::rpc::{Notification, Request, Response, RpcError};

/// Method names in the flat namespace. All control commands share the
/// `player.` prefix; the health check uses a single reserved name.
mod methods {
    pub const SEEK: &str = "player.seek";
    pub const PLAY: &str = "player.play";
    pub const PAUSE: &str = "player.pause";
    pub const PLAYPAUSE: &str = "player.playpause";
    pub const NEXT: &str = "player.next";
    pub const PREVIOUS: &str = "player.previous";
    pub const PING: &str = "system.ping";
}

/// Routes requests and notifications to the player surface and translates
/// every possible failure into a well-formed [`Response`].
///
/// A [`Request`] always produces exactly one response, success or error.
/// A [`Notification`] never produces anything; failures are logged here
/// and go no further. This lets control commands be issued fire-and-forget
/// or acknowledged through the same handlers.
#[derive(Debug)]
pub struct CommandDispatcher {
    surface: Arc<dyn PlayerSurface>,
    started_at: Instant,
}

impl CommandDispatcher {
    /// Creates a dispatcher over the given control surface.
    #[must_use]
    pub fn new(surface: Arc<dyn PlayerSurface>) -> Self {
        Self {
            surface,
            started_at: Instant::now(),
        }
    }

    /// Seconds since this dispatcher was constructed at process startup.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Snapshot accessor shared with the REST side channel.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SurfaceError`].
    pub async fn current_snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError> {
        self.surface.snapshot().await
    }

    /// Runs one control command for the REST side channel, without the
    /// RPC error translation [`dispatch`](Self::dispatch) applies.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SurfaceError`].
    pub async fn run_command(&self, command: PlayerCommand) -> Result<(), SurfaceError> {
        self.surface.execute(command).await
    }

    /// Handles a request, always producing exactly one response.
    pub async fn dispatch(&self, request: &Request) -> Response {
        match self.route(&request.method, request.params.as_ref()).await {
            Ok(result) => Response::success(request.id.clone(), result),
            Err(error) => {
                tracing::debug!(method = %request.method, id = %request.id, code = error.code,
                    "request failed");
                Response::failure(Some(request.id.clone()), error)
            }
        }
    }

    /// Handles a notification. Nothing is ever sent back, even on failure.
    pub async fn dispatch_notification(&self, notification: &Notification) {
        if let Err(error) = self
            .route(&notification.method, notification.params.as_ref())
            .await
        {
            tracing::warn!(method = %notification.method, code = error.code,
                message = %error.message, "notification failed");
        }
    }

    /// Validates parameters and invokes the appropriate handler.
    async fn route(&self, method: &str, params: Option<&Value>) -> Result<Value, RpcError> {
        match method {
            methods::SEEK => {
                let time = require_number(params, "time")?;
                self.execute(PlayerCommand::Seek(time)).await?;
                Ok(json!({ "time": time }))
            }
            methods::PLAY => self.execute(PlayerCommand::Play).await,
            methods::PAUSE => self.execute(PlayerCommand::Pause).await,
            methods::PLAYPAUSE => self.execute(PlayerCommand::PlayPause).await,
            methods::NEXT => self.execute(PlayerCommand::Next).await,
            methods::PREVIOUS => self.execute(PlayerCommand::Previous).await,
            methods::PING => Ok(json!({
                "timestamp": Utc::now().to_rfc3339(),
                "uptimeSecs": self.uptime_secs(),
            })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    /// Runs one surface command, mapping failures into the application
    /// error-code range.
    async fn execute(&self, command: PlayerCommand) -> Result<Value, RpcError> {
        match self.surface.execute(command).await {
            Ok(()) => Ok(json!({ "ok": true })),
            Err(error) if command.is_seek() => Err(RpcError::seek_failed(error.to_string())),
            Err(error) => Err(RpcError::surface_failure(error.to_string())),
        }
    }
}

/// Extracts a required finite, non-negative numeric parameter.
fn require_number(params: Option<&Value>, key: &str) -> Result<f64, RpcError> {
    let value = params
        .and_then(|p| p.get(key))
        .ok_or_else(|| RpcError::invalid_params(format!("missing parameter: {key}")))?;
    let number = value
        .as_f64()
        .ok_or_else(|| RpcError::invalid_params(format!("parameter {key} must be a number")))?;
    if !number.is_finite() || number < 0.0 {
        return Err(RpcError::invalid_params(format!(
            "parameter {key} must be a non-negative finite number"
        )));
    }
    Ok(number)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::rpc::{RequestId, codes};
    use std::sync::Mutex;

    /// Surface double that records commands and can be forced to fail.
    #[derive(Debug, Default)]
    struct RecordingSurface {
        commands: Mutex<Vec<PlayerCommand>>,
        fail_with: Mutex<Option<String>>,
    }

    impl RecordingSurface {
        fn failing(message: &str) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                fail_with: Mutex::new(Some(message.to_string())),
            }
        }

        fn recorded(&self) -> Vec<PlayerCommand> {
            self.commands.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl PlayerSurface for RecordingSurface {
        async fn snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError> {
            Ok(None)
        }

        async fn execute(&self, command: PlayerCommand) -> Result<(), SurfaceError> {
            if let Ok(guard) = self.fail_with.lock()
                && let Some(message) = guard.clone()
            {
                return Err(SurfaceError::Execution(message));
            }
            if let Ok(mut guard) = self.commands.lock() {
                guard.push(command);
            }
            Ok(())
        }
    }

    fn request(method: &str, params: Option<Value>, id: i64) -> Request {
        Request::new(method, params, RequestId::Number(id))
    }

    #[tokio::test]
    async fn seek_with_numeric_time_executes_and_echoes_id() {
        let surface = Arc::new(RecordingSurface::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&surface) as Arc<dyn PlayerSurface>);

        let response = dispatcher
            .dispatch(&request(methods::SEEK, Some(json!({"time": 42})), 5))
            .await;

        assert_eq!(response.id, Some(RequestId::Number(5)));
        assert!(response.error.is_none());
        assert_eq!(surface.recorded(), vec![PlayerCommand::Seek(42.0)]);
    }

    #[tokio::test]
    async fn seek_with_wrong_typed_time_never_reaches_the_surface() {
        let surface = Arc::new(RecordingSurface::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&surface) as Arc<dyn PlayerSurface>);

        let response = dispatcher
            .dispatch(&request(methods::SEEK, Some(json!({"time": "soon"})), 6))
            .await;

        let Some(error) = response.error else {
            panic!("expected error response");
        };
        assert_eq!(error.code, codes::INVALID_PARAMS);
        assert!(surface.recorded().is_empty());
    }

    #[tokio::test]
    async fn seek_with_missing_params_is_invalid() {
        let surface = Arc::new(RecordingSurface::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&surface) as Arc<dyn PlayerSurface>);

        let response = dispatcher.dispatch(&request(methods::SEEK, None, 7)).await;

        let Some(error) = response.error else {
            panic!("expected error response");
        };
        assert_eq!(error.code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let dispatcher =
            CommandDispatcher::new(Arc::new(RecordingSurface::default()) as Arc<dyn PlayerSurface>);

        let response = dispatcher.dispatch(&request("player.eject", None, 8)).await;

        let Some(error) = response.error else {
            panic!("expected error response");
        };
        assert_eq!(error.code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn surface_failure_maps_to_application_range_with_diagnostics() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(RecordingSurface::failing("osascript exited with status 1"))
                as Arc<dyn PlayerSurface>,
        );

        let response = dispatcher.dispatch(&request(methods::PLAY, None, 9)).await;

        let Some(error) = response.error else {
            panic!("expected error response");
        };
        assert_eq!(error.code, codes::SURFACE_FAILURE);
        let Some(Value::String(detail)) = error.data else {
            panic!("expected diagnostic data");
        };
        assert!(detail.contains("osascript exited with status 1"));
    }

    #[tokio::test]
    async fn seek_failure_gets_its_own_code() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(RecordingSurface::failing("position out of range")) as Arc<dyn PlayerSurface>,
        );

        let response = dispatcher
            .dispatch(&request(methods::SEEK, Some(json!({"time": 9000})), 10))
            .await;

        let Some(error) = response.error else {
            panic!("expected error response");
        };
        assert_eq!(error.code, codes::SEEK_FAILED);
    }

    #[tokio::test]
    async fn ping_reports_timestamp_and_uptime() {
        let dispatcher =
            CommandDispatcher::new(Arc::new(RecordingSurface::default()) as Arc<dyn PlayerSurface>);

        let response = dispatcher.dispatch(&request(methods::PING, None, 11)).await;

        let Some(result) = response.result else {
            panic!("expected success");
        };
        assert!(result.get("timestamp").is_some());
        assert!(result.get("uptimeSecs").is_some());
    }

    #[tokio::test]
    async fn failed_notification_produces_no_response() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(RecordingSurface::failing("boom")) as Arc<dyn PlayerSurface>,
        );

        // Returns unit; the only observable contract is that it does not panic.
        dispatcher
            .dispatch_notification(&Notification::new(methods::NEXT, None))
            .await;
    }

    #[tokio::test]
    async fn notification_with_known_method_executes() {
        let surface = Arc::new(RecordingSurface::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&surface) as Arc<dyn PlayerSurface>);

        dispatcher
            .dispatch_notification(&Notification::new(methods::PAUSE, None))
            .await;

        assert_eq!(surface.recorded(), vec![PlayerCommand::Pause]);
    }
}
