//! Player DTOs shared by the REST handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::player::PlayerSnapshot;

/// Current player state as exposed over REST.
///
/// Field names match the WebSocket notification payload, so a client can
/// parse both with one model.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshotDto {
    /// Track title.
    pub name: String,
    /// Track artist.
    pub artist: String,
    /// Track album.
    pub album: String,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Track length in seconds.
    pub duration: f64,
    /// Whether the player is currently playing.
    pub is_playing: bool,
}

impl From<PlayerSnapshot> for PlayerSnapshotDto {
    fn from(snapshot: PlayerSnapshot) -> Self {
        Self {
            name: snapshot.name,
            artist: snapshot.artist,
            album: snapshot.album,
            current_time: snapshot.current_time,
            duration: snapshot.duration,
            is_playing: snapshot.is_playing,
        }
    }
}

/// `GET /player` response. `player` is `null` when the application is
/// stopped or reports no current track.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerStateResponse {
    /// Current snapshot, absent when nothing is playing or paused.
    pub player: Option<PlayerSnapshotDto>,
}

/// `POST /player/seek` request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SeekRequest {
    /// Target position in seconds.
    pub time: f64,
}

/// Acknowledgement for control commands.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    /// Always `true`; failures are reported through the error body.
    pub ok: bool,
}
