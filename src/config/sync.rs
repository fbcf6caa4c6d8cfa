/// Pose synchronisation constants.
///
/// This module defines the broadcast rate, smoothing rate and liveness window
/// shared by every peer taking part in a room.
pub const SEND_INTERVAL_MS: u64 = 50; // Minimum gap between two pose broadcasts (~20 Hz).

/// Exponential blend rate, per second, used to smooth remote avatars toward their latest sample.
pub const BLEND_RATE: f32 = 15.0;

/// Time (in milliseconds) without a pose update before a remote avatar is hidden.
pub const LIVENESS_TIMEOUT_MS: u64 = 5000;
