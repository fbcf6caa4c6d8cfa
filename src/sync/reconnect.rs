use std::time::Duration;

use log::{info, warn};

use crate::config::reconnect::{GIVE_UP_MESSAGE, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS};

/// Backoff parameters for the signaling link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }
}

/// Failure reported by the signaling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingErrorKind {
    /// Link to the broker dropped but the local id is still valid.
    Disconnected,
    Network,
    ServerError,
    /// Anything else (unavailable id, browser incompatibility, ...).
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Re-attach immediately, keeping the current id.
    ReconnectNow,
    /// Start a fresh link after the delay.
    RetryAfter { attempt: u32, delay: Duration },
    /// Out of attempts; show the message and stop.
    GiveUp(String),
    /// Not retryable; show the message.
    Surface(String),
}

/// Tracks consumed attempts between two successful opens.
#[derive(Debug, Clone, Default)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    pub fn on_error(&mut self, kind: &SignalingErrorKind) -> ReconnectDecision {
        match kind {
            SignalingErrorKind::Disconnected => {
                info!("[Reconnect] Disconnected, reconnecting");
                ReconnectDecision::ReconnectNow
            }
            SignalingErrorKind::Network | SignalingErrorKind::ServerError => {
                if self.attempts >= self.policy.max_attempts {
                    warn!("[Reconnect] Giving up after {} attempts", self.attempts);
                    return ReconnectDecision::GiveUp(GIVE_UP_MESSAGE.to_string());
                }
                self.attempts += 1;
                let delay = self.policy.base_delay * self.attempts;
                info!("[Reconnect] Attempt {} in {:?}", self.attempts, delay);
                ReconnectDecision::RetryAfter {
                    attempt: self.attempts,
                    delay,
                }
            }
            SignalingErrorKind::Other(message) => ReconnectDecision::Surface(message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly_then_gives_up() {
        let mut r = Reconnector::default();
        let delays: Vec<Duration> = (0..5)
            .map(|_| match r.on_error(&SignalingErrorKind::Network) {
                ReconnectDecision::RetryAfter { delay, .. } => delay,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            delays,
            [2, 4, 6, 8, 10].map(Duration::from_secs).to_vec()
        );
        assert_eq!(
            r.on_error(&SignalingErrorKind::ServerError),
            ReconnectDecision::GiveUp(GIVE_UP_MESSAGE.to_string())
        );
    }

    #[test]
    fn open_resets_attempts() {
        let mut r = Reconnector::default();
        r.on_error(&SignalingErrorKind::Network);
        r.on_error(&SignalingErrorKind::Network);
        r.on_open();
        assert_eq!(r.attempts(), 0);
        assert_eq!(
            r.on_error(&SignalingErrorKind::Network),
            ReconnectDecision::RetryAfter { attempt: 1, delay: Duration::from_secs(2) }
        );
    }

    #[test]
    fn disconnect_does_not_consume_attempts() {
        let mut r = Reconnector::default();
        for _ in 0..10 {
            assert_eq!(r.on_error(&SignalingErrorKind::Disconnected), ReconnectDecision::ReconnectNow);
        }
        assert_eq!(r.attempts(), 0);
    }

    #[test]
    fn custom_policy_is_honoured() {
        let mut r = Reconnector::new(ReconnectPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(100),
        });
        assert!(matches!(r.on_error(&SignalingErrorKind::Network), ReconnectDecision::RetryAfter { .. }));
        assert!(matches!(r.on_error(&SignalingErrorKind::Network), ReconnectDecision::GiveUp(_)));
    }

    #[test]
    fn other_errors_surface_without_retry() {
        let mut r = Reconnector::default();
        let kind = SignalingErrorKind::Other("unavailable-id".into());
        assert_eq!(r.on_error(&kind), ReconnectDecision::Surface("unavailable-id".into()));
        assert_eq!(r.attempts(), 0);
    }
}
