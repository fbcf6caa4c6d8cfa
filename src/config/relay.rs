/// Relay server configuration constants.
///
/// This module defines the listening address, room capacity and websocket
/// heartbeat parameters.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080"; // Overridable with POSE_RELAY_ADDR.

/// Environment variable holding the bind address.
pub const BIND_ADDR_ENV: &str = "POSE_RELAY_ADDR";

/// Maximum number of peers sharing a room.
pub const MAX_PEERS_PER_ROOM: usize = 8;

/// Interval (in seconds) between websocket heartbeat pings.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;

/// Time (in seconds) without any client traffic before the session is closed.
pub const CLIENT_TIMEOUT_SECS: u64 = 15;

/// Maximum accepted length of a peer id.
pub const MAX_PEER_ID_LEN: usize = 64;

/// Minimum gap (in milliseconds) between two relayed pose or prop messages from one peer.
pub const RELAY_MIN_INTERVAL_MS: u64 = 25;
