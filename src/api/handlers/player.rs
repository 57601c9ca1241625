//! Player endpoints: state lookup and control commands.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CommandResponse, PlayerSnapshotDto, PlayerStateResponse, SeekRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::player::PlayerCommand;

/// `GET /player` — Current player state.
///
/// # Errors
///
/// Returns [`GatewayError`] when the control surface fails.
#[utoipa::path(
    get,
    path = "/api/v1/player",
    tag = "Player",
    summary = "Current player state",
    description = "Returns the current track and transport state, or a null player when the application is stopped.",
    responses(
        (status = 200, description = "Current state", body = PlayerStateResponse),
        (status = 502, description = "Control surface failure", body = ErrorResponse),
    )
)]
pub async fn get_player(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.dispatcher.current_snapshot().await?;
    Ok(Json(PlayerStateResponse {
        player: snapshot.map(PlayerSnapshotDto::from),
    }))
}

/// `POST /player/{command}` — Run a transport command.
///
/// # Errors
///
/// Returns [`GatewayError`] for unknown commands or surface failures.
#[utoipa::path(
    post,
    path = "/api/v1/player/{command}",
    tag = "Player",
    summary = "Run a transport command",
    description = "Runs one of `play`, `pause`, `playpause`, `next`, `previous` against the player application.",
    params(("command" = String, Path, description = "Transport command name")),
    responses(
        (status = 200, description = "Command ran", body = CommandResponse),
        (status = 404, description = "Unknown command", body = ErrorResponse),
        (status = 502, description = "Control surface failure", body = ErrorResponse),
    )
)]
pub async fn run_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let command = match command.as_str() {
        "play" => PlayerCommand::Play,
        "pause" => PlayerCommand::Pause,
        "playpause" => PlayerCommand::PlayPause,
        "next" => PlayerCommand::Next,
        "previous" => PlayerCommand::Previous,
        other => return Err(GatewayError::UnknownCommand(other.to_string())),
    };
    state.dispatcher.run_command(command).await?;
    Ok(Json(CommandResponse { ok: true }))
}

/// `POST /player/seek` — Seek within the current track.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid positions or surface failures.
#[utoipa::path(
    post,
    path = "/api/v1/player/seek",
    tag = "Player",
    summary = "Seek within the current track",
    description = "Moves the playback position to the given offset in seconds.",
    request_body = SeekRequest,
    responses(
        (status = 200, description = "Seek ran", body = CommandResponse),
        (status = 400, description = "Invalid position", body = ErrorResponse),
        (status = 502, description = "Seek rejected by the player", body = ErrorResponse),
    )
)]
pub async fn seek(
    State(state): State<AppState>,
    Json(req): Json<SeekRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if !req.time.is_finite() || req.time < 0.0 {
        return Err(GatewayError::InvalidParams(
            "time must be a non-negative finite number".to_string(),
        ));
    }
    state
        .dispatcher
        .run_command(PlayerCommand::Seek(req.time))
        .await
        .map_err(|error| GatewayError::SeekFailed(error.to_string()))?;
    Ok(Json(CommandResponse { ok: true }))
}

/// Composes the player routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/player", get(get_player))
        .route("/player/seek", post(seek))
        .route("/player/{command}", post(run_command))
}
