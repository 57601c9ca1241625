//! Point-in-time reads of the player's state and change detection.

use serde::{Deserialize, Serialize};

/// Sub-second playback progress is natural; only a jump larger than this
/// (a seek, or drift) is worth a broadcast.
pub const TIME_TOLERANCE_SECS: f64 = 1.0;

/// Immutable read of the native player's state, produced once per poll
/// cycle and compared structurally against its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Track title.
    pub name: String,
    /// Track artist.
    pub artist: String,
    /// Album title.
    pub album: String,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Track length in seconds.
    pub duration: f64,
    /// Whether the player is currently playing.
    pub is_playing: bool,
}

impl PlayerSnapshot {
    /// Returns `true` when this snapshot differs from `previous` in a way
    /// clients care about: track identity, play state, or a position jump
    /// beyond [`TIME_TOLERANCE_SECS`].
    ///
    /// Album and duration are deliberately excluded: they cannot change
    /// without the track name changing too.
    #[must_use]
    pub fn differs_from(&self, previous: &Self) -> bool {
        self.name != previous.name
            || self.artist != previous.artist
            || (self.current_time - previous.current_time).abs() > TIME_TOLERANCE_SECS
            || self.is_playing != previous.is_playing
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn snapshot(current_time: f64, is_playing: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            name: "Blue in Green".to_string(),
            artist: "Miles Davis".to_string(),
            album: "Kind of Blue".to_string(),
            current_time,
            duration: 337.0,
            is_playing,
        }
    }

    #[test]
    fn sub_second_progress_is_not_a_change() {
        assert!(!snapshot(10.4, true).differs_from(&snapshot(10.0, true)));
    }

    #[test]
    fn a_seek_is_a_change() {
        assert!(snapshot(12.0, true).differs_from(&snapshot(10.0, true)));
    }

    #[test]
    fn a_backwards_seek_is_a_change() {
        assert!(snapshot(2.0, true).differs_from(&snapshot(10.0, true)));
    }

    #[test]
    fn play_state_flip_is_a_change_regardless_of_time() {
        assert!(snapshot(10.0, false).differs_from(&snapshot(10.0, true)));
    }

    #[test]
    fn track_change_is_a_change() {
        let mut next = snapshot(0.2, true);
        next.name = "So What".to_string();
        assert!(next.differs_from(&snapshot(0.0, true)));
    }

    #[test]
    fn camel_case_wire_names() {
        let Ok(json) = serde_json::to_string(&snapshot(1.0, true)) else {
            panic!("serialization failed");
        };
        assert!(json.contains("currentTime"));
        assert!(json.contains("isPlaying"));
    }
}
