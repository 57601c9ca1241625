//! The control-surface trait the dispatcher and broadcaster depend on.

use async_trait::async_trait;

use super::snapshot::PlayerSnapshot;

/// Transport-style commands the player understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Toggle between playing and paused.
    PlayPause,
    /// Skip to the next track.
    Next,
    /// Return to the previous track.
    Previous,
    /// Jump to an absolute position in seconds.
    Seek(f64),
}

impl PlayerCommand {
    /// Returns `true` for the seek variant; seek failures map to a
    /// distinct error code.
    #[must_use]
    pub const fn is_seek(&self) -> bool {
        matches!(self, Self::Seek(_))
    }
}

/// Failures reported by the native control surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The automation subprocess could not be spawned or awaited.
    #[error("failed to run automation command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The automation command ran but reported a failure.
    #[error("automation command failed: {0}")]
    Execution(String),

    /// The command produced output this crate cannot interpret.
    #[error("unparseable player output: {0}")]
    Malformed(String),
}

/// Opaque synchronous-style access to the locally running player.
///
/// One call per operation: either a structured snapshot (with `None` as
/// the explicit nothing-playing sentinel) or a failure. Callers depend
/// only on this shape, never on the mechanism behind it.
#[async_trait]
pub trait PlayerSurface: Send + Sync + std::fmt::Debug {
    /// Takes a fresh snapshot of the player state.
    ///
    /// Returns `Ok(None)` when the player is running but nothing is
    /// playing.
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] when the underlying automation command
    /// fails or its output cannot be parsed.
    async fn snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError>;

    /// Executes a transport command against the player.
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] when the underlying automation command
    /// fails.
    async fn execute(&self, command: PlayerCommand) -> Result<(), SurfaceError>;
}
