//! Reconnect policy.

use std::time::Duration;

/// Pause between a failed cycle and the next connection attempt.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// When and how often the producer reconnects.
///
/// Attempts count consecutive failed cycles. A successful handshake resets
/// the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait before reconnecting
    pub interval: Duration,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { interval: DEFAULT_RETRY_INTERVAL, max_attempts: None }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `failures` consecutive
    /// failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}
