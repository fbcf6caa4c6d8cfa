// src/server/mod.rs

//! Server layer root module.
//!
//! This module organizes the relay server components, including:
//! - Application state management
//! - HTTP/WebSocket routing
//! - Rooms (membership, relay between peers, websocket sessions)
//! - Anti-spam protection and error frames for websocket sessions

pub mod state;
pub mod router;
pub mod room;
pub mod anti_spam;
pub mod ws_error;
