//! Rooms: groups of peers relaying pose and shared-state messages to each other.

pub mod messages;
pub mod room;
pub mod server;
pub mod session;
