//! Millisecond clocks used for message and session timestamps.

use std::sync::Arc;

/// A source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Issues strictly increasing timestamps on top of another clock.
///
/// Two stamps taken within the same millisecond (or after the source clock
/// stepped backwards) are separated by at least one millisecond, so ordering
/// by timestamp always matches issue order.
#[derive(Clone)]
pub struct MonotonicClock {
    source: Arc<dyn Clock>,
    last: i64,
}

impl MonotonicClock {
    pub fn new(source: Arc<dyn Clock>) -> Self {
        Self {
            source,
            last: i64::MIN,
        }
    }

    /// Records a timestamp issued elsewhere (e.g. loaded from storage) so
    /// later stamps stay above it.
    pub fn observe(&mut self, timestamp: i64) {
        self.last = self.last.max(timestamp);
    }

    /// Returns the next timestamp.
    pub fn tick(&mut self) -> i64 {
        let now = self.source.now_millis();
        let next = if now > self.last {
            now
        } else {
            self.last.saturating_add(1)
        };
        self.last = next;
        next
    }
}

impl std::fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicClock")
            .field("last", &self.last)
            .finish()
    }
}
