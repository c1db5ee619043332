// Spoken notification throttling
//
// The on-screen text updates every frame; only the spoken channel is
// throttled. One timer per session covers every message kind.

use std::time::{Duration, Instant};

pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(3);

/// True when nothing has been spoken yet, or strictly more than `interval`
/// has passed since the last notification.
pub fn should_notify(now: Instant, last_notified_at: Option<Instant>, interval: Duration) -> bool {
    match last_notified_at {
        None => true,
        Some(last) => now.saturating_duration_since(last) > interval,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDebouncer {
    interval: Duration,
}

impl NotificationDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn should_notify(&self, now: Instant, last_notified_at: Option<Instant>) -> bool {
        should_notify(now, last_notified_at, self.interval)
    }

    /// Check and, when allowed, record `now` as the last notification time.
    /// The caller dispatches only after this returns true.
    pub fn try_acquire(&self, now: Instant, last_notified_at: &mut Option<Instant>) -> bool {
        if self.should_notify(now, *last_notified_at) {
            *last_notified_at = Some(now);
            true
        } else {
            false
        }
    }
}

impl Default for NotificationDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_INTERVAL)
    }
}
