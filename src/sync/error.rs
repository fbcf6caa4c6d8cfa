//! Error types for the pose sync engine

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while exchanging poses with peers
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Invalid transition for {peer}: {from} -> {event}")]
    InvalidTransition {
        peer: String,
        from: &'static str,
        event: &'static str,
    },

    #[error("Send failed to {0}")]
    SendFailed(String),
}
