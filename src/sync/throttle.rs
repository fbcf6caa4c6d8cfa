use std::time::{Duration, Instant};

use crate::config::sync::SEND_INTERVAL_MS;

/// Admits at most one send per interval.
///
/// Callers pass the current instant so the gate can be driven by the render
/// clock (or a test clock) rather than reading the system time itself.
#[derive(Debug, Clone)]
pub struct SendThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl SendThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true and records `now` if the previous send is at least one interval old.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

impl Default for SendThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(SEND_INTERVAL_MS))
    }
}
