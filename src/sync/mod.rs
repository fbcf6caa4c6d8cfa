//! Pose synchronisation engine.
//!
//! This module holds the peer-side logic shared by every multiplayer room:
//! - Pose samples and their wire form
//! - Tagged peer messages, validated on decode
//! - Rate-limited broadcast to open connections
//! - Smoothing and liveness of remote avatars
//! - Connection lifecycle and reconnection backoff
//! - The session controller driving all of the above from one event stream

pub mod error;
pub mod pose;
pub mod messages;
pub mod throttle;
pub mod connection;
pub mod broadcaster;
pub mod interpolator;
pub mod reconnect;
pub mod session;

pub use error::{SyncError, SyncResult};
pub use messages::PeerMessage;
pub use pose::{ControllerPose, Hand, PoseSample, Transform};
pub use session::{SessionContext, SessionController, SessionEvent};
