//! Push side of the bridge: reference-counted polling and change-driven
//! snapshot broadcasts.

pub mod broadcaster;

pub use broadcaster::{ClientSession, SnapshotBroadcaster};
