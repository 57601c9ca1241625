//! Bounded FIFO for frames composed while disconnected.

use std::collections::VecDeque;

/// Fixed-capacity outbound queue with drop-oldest overflow.
///
/// Frames are flushed in enqueue order on reconnect; no reordering,
/// coalescing, or de-duplication. When full, the oldest frame is dropped
/// so the freshest commands survive a long disconnection.
#[derive(Debug)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    /// Creates a queue holding at most `capacity` frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Appends a frame, dropping the oldest one if the queue is full.
    pub fn push(&mut self, frame: String) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            tracing::warn!(dropped_total = self.dropped, "outbound queue full, dropped oldest frame");
        }
        self.frames.push_back(frame);
    }

    /// Removes and returns every queued frame in enqueue order.
    pub fn drain(&mut self) -> Vec<String> {
        self.frames.drain(..).collect()
    }

    /// Number of frames currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames dropped to overflow over this queue's lifetime.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
