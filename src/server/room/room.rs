//! State of one room: its members and the relay rules between them.
//!
//! A room is plain data owned by the `RoomServer` actor; every operation runs
//! inside that actor's handlers, so no locking is involved.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use actix::prelude::{Recipient, SendError};
use log::{debug, info, warn};
use thiserror::Error;
use uuid::Uuid;

use super::messages::{Deliver, RoomId, ServerWsMessage};
use crate::config::relay::RELAY_MIN_INTERVAL_MS;
use crate::sync::broadcaster::FanOut;
use crate::sync::connection::{ConnectionEvent, ConnectionRegistry, PeerId, PeerLink};
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::messages::PeerMessage;
use crate::sync::throttle::SendThrottle;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Room {room} is full ({capacity} peers)")]
    Full { room: RoomId, capacity: usize },

    #[error("{0} is not a member of this room")]
    NotMember(PeerId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RoomError {
    /// Error code sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Full { .. } => "ROOM_FULL",
            Self::NotMember(_) => "NOT_IN_ROOM",
            Self::Json(_) => "INTERNAL_ERROR",
        }
    }
}

/// A room member's websocket session, seen as a peer link.
#[derive(Clone)]
pub struct SessionLink {
    pub peer_id: PeerId,
    pub session_id: Uuid,
    pub recipient: Recipient<Deliver>,
}

impl PeerLink for SessionLink {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn is_open(&self) -> bool {
        self.recipient.connected()
    }

    fn send(&self, text: &str) -> SyncResult<()> {
        self.recipient
            .try_send(Deliver::Text(text.to_string()))
            .map_err(|e| match e {
                SendError::Closed(_) => SyncError::ConnectionClosed(self.peer_id.clone()),
                SendError::Full(_) => SyncError::SendFailed(self.peer_id.clone()),
            })
    }
}

pub struct Room {
    id: RoomId,
    capacity: usize,
    members: ConnectionRegistry<SessionLink>,
    /// One window per sender and message kind; poses and props do not share it.
    throttles: HashMap<(PeerId, &'static str), SendThrottle>,
}

impl Room {
    pub fn new(id: RoomId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            members: ConnectionRegistry::new(),
            throttles: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers = self.members.peer_ids();
        peers.sort();
        peers
    }

    /// Adds a session to the room.
    ///
    /// A session reusing a member's peer id takes its place; the displaced
    /// session is returned so the caller can close it.
    pub fn join(&mut self, link: SessionLink) -> Result<Option<SessionLink>, RoomError> {
        let peer = link.peer_id.clone();
        let rejoining = self.members.get(&peer).is_some();
        if !rejoining && self.members.len() >= self.capacity {
            return Err(RoomError::Full {
                room: self.id.clone(),
                capacity: self.capacity,
            });
        }

        let replaced = self.members.insert_pending(link);
        if let Err(e) = self.members.mark_open(&peer) {
            warn!("[Room] {}: {}", self.id, e);
        }
        self.throttles.retain(|(owner, _), _| owner != &peer);

        let others: Vec<PeerId> = self.peers().into_iter().filter(|p| p != &peer).collect();
        let welcome = ServerWsMessage::Welcome {
            room_id: self.id.clone(),
            peer_id: peer.clone(),
            peers: others,
        };
        if let Some(link) = self.members.get(&peer) {
            if let Err(e) = link.send(&welcome.to_json()?) {
                debug!("[Room] Welcome to {} dropped: {}", peer, e);
            }
        }
        if replaced.is_none() {
            let joined = ServerWsMessage::PeerJoined { peer_id: peer.clone() }.to_json()?;
            self.send_to_others(&peer, &joined);
        }
        info!("[Room] {} joined {} ({} peers)", peer, self.id, self.members.len());
        Ok(replaced)
    }

    /// Removes a member, but only if `session_id` is still the session registered for it.
    pub fn leave(&mut self, peer: &str, session_id: Uuid) -> bool {
        match self.members.get(peer) {
            Some(link) if link.session_id == session_id => {}
            _ => return false,
        }
        self.members.remove(peer, ConnectionEvent::Closed);
        self.throttles.retain(|(owner, _), _| owner != peer);
        match (ServerWsMessage::PeerLeft { peer_id: peer.to_string() }).to_json() {
            Ok(text) => {
                self.send_to_others(peer, &text);
            }
            Err(e) => warn!("[Room] Failed to serialize PeerLeft: {}", e),
        }
        info!("[Room] {} left {} ({} peers)", peer, self.id, self.members.len());
        true
    }

    /// Relays `message` from `from` to every other open member.
    ///
    /// Returns `Ok(None)` when a continuous-state message arrives faster than
    /// the relay interval; only the freshest state matters, so it is dropped.
    pub fn relay(
        &mut self,
        from: &str,
        session_id: Uuid,
        message: PeerMessage,
        now: Instant,
    ) -> Result<Option<FanOut>, RoomError> {
        match self.members.get(from) {
            Some(link) if link.session_id == session_id => {}
            _ => return Err(RoomError::NotMember(from.to_string())),
        }
        if message.is_throttled() {
            let throttle = self
                .throttles
                .entry((from.to_string(), message.kind()))
                .or_insert_with(|| SendThrottle::new(Duration::from_millis(RELAY_MIN_INTERVAL_MS)));
            if !throttle.try_acquire(now) {
                debug!("[Room] Throttled {} from {}", message.kind(), from);
                return Ok(None);
            }
        }
        let text = ServerWsMessage::Relay {
            from: from.to_string(),
            message,
        }
        .to_json()?;
        Ok(Some(self.send_to_others(from, &text)))
    }

    fn send_to_others(&self, except: &str, text: &str) -> FanOut {
        let mut result = FanOut::default();
        for link in self.members.open_links().filter(|l| l.peer_id() != except) {
            match link.send(text) {
                Ok(()) => result.sent += 1,
                Err(e) => {
                    debug!("[Room] Dropped frame to {}: {}", link.peer_id(), e);
                    result.dropped += 1;
                }
            }
        }
        result
    }
}
