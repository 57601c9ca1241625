//! Reconnection backoff schedule.

use std::time::Duration;

/// Exponential backoff with a delay cap and a bounded retry count.
///
/// The delay before retry number `attempt` (zero-based) is
/// `min(initial_delay · 2^attempt, max_delay)`; after `max_retries`
/// scheduled retries the transport gives up and stays disconnected.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Number of retries scheduled before giving up.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    /// `1s · 2^attempt` capped at `16s`, five retries.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            max_retries: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given zero-based retry, or `None` once the retry
    /// budget is exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}
