use std::time::{Duration, Instant};
use log::warn;

use crate::config::anti_spam::{BAN_DURATION_SECONDS, MAX_REQUESTS_PER_SECOND, MAX_RESPONSES_PER_SECOND};

/// Tracks anti-spam state for a single websocket session.
pub struct AntiSpamState {
    // Last error code sent (for suppression)
    last_error_code: Option<String>,
    // Start of the current one-second window
    window_start: Instant,
    // Error responses sent in the current window
    responses_this_window: u32,
    // Frames received in the current window
    requests_this_window: u32,
    banned_until: Option<Instant>,
}

impl AntiSpamState {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            last_error_code: None,
            window_start: now,
            responses_this_window: 0,
            requests_this_window: 0,
            banned_until: None,
        }
    }

    /// Call for every incoming frame.
    /// Returns true if the session is (now) banned.
    pub fn record_request(&mut self, peer_id: &str) -> bool {
        self.record_request_at(peer_id, Instant::now())
    }

    pub fn record_request_at(&mut self, peer_id: &str, now: Instant) -> bool {
        self.roll_window(now);
        self.requests_this_window += 1;
        if self.requests_this_window > MAX_REQUESTS_PER_SECOND {
            self.ban(peer_id, now, "Too many requests per second");
            return true;
        }
        self.is_banned_at(now)
    }

    /// Call for every error frame sent back to the client.
    /// Returns true if the session is (now) banned.
    pub fn record_response(&mut self, peer_id: &str) -> bool {
        self.record_response_at(peer_id, Instant::now())
    }

    pub fn record_response_at(&mut self, peer_id: &str, now: Instant) -> bool {
        self.roll_window(now);
        self.responses_this_window += 1;
        if self.responses_this_window > MAX_RESPONSES_PER_SECOND {
            self.ban(peer_id, now, "Too many error responses per second");
            return true;
        }
        self.is_banned_at(now)
    }

    /// Returns true if the error should be sent; repeats of the previous code are suppressed.
    pub fn should_send_error(&mut self, error_code: &str, peer_id: &str) -> bool {
        if self.last_error_code.as_deref() == Some(error_code) {
            warn!("[AntiSpam] Suppressed duplicate error '{}' for peer={}", error_code, peer_id);
            return false;
        }
        self.last_error_code = Some(error_code.to_string());
        true
    }

    /// Call when a valid message is accepted.
    pub fn reset_on_valid_action(&mut self) {
        self.last_error_code = None;
    }

    pub fn is_banned(&self) -> bool {
        self.is_banned_at(Instant::now())
    }

    fn is_banned_at(&self, now: Instant) -> bool {
        self.banned_until.is_some_and(|until| now < until)
    }

    /// Returns the remaining ban duration in seconds, or 0 if not banned.
    pub fn ban_remaining_secs(&self) -> u64 {
        self.banned_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    fn ban(&mut self, peer_id: &str, now: Instant, reason: &str) {
        let until = now + Duration::from_secs(BAN_DURATION_SECONDS);
        self.banned_until = Some(until);
        warn!("[AntiSpam] Banned peer={} for {}s: {}", peer_id, BAN_DURATION_SECONDS, reason);
    }

    fn roll_window(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.responses_this_window = 0;
            self.requests_this_window = 0;
        }
    }
}

impl Default for AntiSpamState {
    fn default() -> Self {
        Self::new()
    }
}
