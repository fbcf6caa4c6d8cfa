/// Configuration for anti-spam and anti-flood protection.
/// All values are in seconds or counts per second.
/// A client streams position, pc-state and robot-state at ~20 Hz each (60 frames/s) on top of
/// discrete events, so the request ceiling sits well above that.
pub const MAX_RESPONSES_PER_SECOND: u32 = 5;
pub const MAX_REQUESTS_PER_SECOND: u32 = 200;
pub const BAN_DURATION_SECONDS: u64 = 300;
