// src/server/state.rs

//! Application state for the relay server.
//!
//! Holds the address of the room server actor, shared between HTTP/WebSocket handlers.

use actix::Addr;
use crate::server::room::server::RoomServer;

/// Shared application state, injected into HTTP/WebSocket handlers.
pub struct AppState {
    /// Address of the room server actor (owns every room and its members).
    pub room_server: Addr<RoomServer>,
}

impl AppState {
    pub fn new(room_server: Addr<RoomServer>) -> Self {
        AppState { room_server }
    }
}
