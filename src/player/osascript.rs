//! Control surface backed by an `osascript` subprocess.
//!
//! Each operation shells out to `osascript -e <script>` targeting the
//! configured player application and parses its one-line text output.
//! This is slow (tens of milliseconds per call) and side-effecting, which
//! is exactly why the broadcaster rations calls behind a poll interval.

use tokio::process::Command;

use super::snapshot::PlayerSnapshot;
use super::surface::{PlayerCommand, PlayerSurface, SurfaceError};

/// Field separator used in the snapshot script output. Unit separator is
/// the one byte guaranteed not to appear in track metadata.
const FIELD_SEP: char = '\u{1f}';

/// Sentinel emitted by the snapshot script when nothing is playing.
const STOPPED_SENTINEL: &str = "__stopped__";

/// [`PlayerSurface`] implementation driving a scriptable player app
/// (e.g. `Music`) through AppleScript automation.
#[derive(Debug, Clone)]
pub struct OsascriptSurface {
    app: String,
}

impl OsascriptSurface {
    /// Creates a surface targeting the given application name.
    #[must_use]
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    /// The script producing one separator-delimited snapshot line.
    fn snapshot_script(&self) -> String {
        format!(
            concat!(
                "tell application \"{app}\"\n",
                "  if player state is stopped then return \"{stopped}\"\n",
                "  set sep to character id 31\n",
                "  set t to current track\n",
                "  return (name of t) & sep & (artist of t) & sep & (album of t) & sep",
                " & (player position as text) & sep & ((duration of t) as text) & sep",
                " & ((player state is playing) as text)\n",
                "end tell"
            ),
            app = self.app,
            stopped = STOPPED_SENTINEL,
        )
    }

    /// The one-liner for a transport command.
    fn command_script(&self, command: PlayerCommand) -> String {
        let action = match command {
            PlayerCommand::Play => "play".to_string(),
            PlayerCommand::Pause => "pause".to_string(),
            PlayerCommand::PlayPause => "playpause".to_string(),
            PlayerCommand::Next => "next track".to_string(),
            PlayerCommand::Previous => "previous track".to_string(),
            PlayerCommand::Seek(position) => format!("set player position to {position}"),
        };
        format!("tell application \"{}\" to {action}", self.app)
    }

    /// Runs a script and returns trimmed stdout.
    async fn run(&self, script: &str) -> Result<String, SurfaceError> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SurfaceError::Execution(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parses one snapshot line into a [`PlayerSnapshot`], with `None` for the
/// explicit nothing-playing sentinel.
fn parse_snapshot_line(line: &str) -> Result<Option<PlayerSnapshot>, SurfaceError> {
    if line == STOPPED_SENTINEL || line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(FIELD_SEP).collect();
    let &[name, artist, album, position, duration, playing] = fields.as_slice() else {
        return Err(SurfaceError::Malformed(format!(
            "expected 6 fields, got {}",
            fields.len()
        )));
    };

    let current_time: f64 = position
        .replace(',', ".")
        .parse()
        .map_err(|_| SurfaceError::Malformed(format!("bad position: {position}")))?;
    let duration: f64 = duration
        .replace(',', ".")
        .parse()
        .map_err(|_| SurfaceError::Malformed(format!("bad duration: {duration}")))?;

    Ok(Some(PlayerSnapshot {
        name: name.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        current_time,
        duration,
        is_playing: playing == "true",
    }))
}

#[async_trait::async_trait]
impl PlayerSurface for OsascriptSurface {
    async fn snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError> {
        let line = self.run(&self.snapshot_script()).await?;
        parse_snapshot_line(&line)
    }

    async fn execute(&self, command: PlayerCommand) -> Result<(), SurfaceError> {
        self.run(&self.command_script(command)).await?;
        Ok(())
    }
}
