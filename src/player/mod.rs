//! Native player boundary: snapshots, commands, and the control surface.
//!
//! The rest of the crate depends only on the [`PlayerSurface`] trait; the
//! actual mechanism (an `osascript` subprocess driving the player app) is
//! an implementation detail of [`OsascriptSurface`].

pub mod osascript;
pub mod snapshot;
pub mod surface;

pub use osascript::OsascriptSurface;
pub use snapshot::PlayerSnapshot;
pub use surface::{PlayerCommand, PlayerSurface, SurfaceError};
