/// Reconnection constants for the signaling link.
///
/// The delay grows linearly: attempt `n` waits `n * RECONNECT_DELAY_MS`.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Base delay (in milliseconds) between reconnection attempts.
pub const RECONNECT_DELAY_MS: u64 = 2000;

/// Message shown to the user once every attempt has failed.
pub const GIVE_UP_MESSAGE: &str = "Failed to connect after multiple attempts. Please try again later.";
