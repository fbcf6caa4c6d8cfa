//! Room relay and pose synchronisation for multiplayer VR sessions.
//!
//! - `sync`: the peer-side engine (pose messages, rate-limited broadcast,
//!   avatar smoothing, connection lifecycle, reconnection, session loop).
//! - `server`: the actix relay that groups peers into rooms and passes their
//!   messages between them.

pub mod config;
pub mod server;
pub mod sync;
