/// Room server actor.
///
/// Owns every room. Sessions join, leave and forward messages through it, so
/// room membership is only ever mutated from this actor's handlers.
/// Rooms are created on first join and dropped once their last peer leaves.
use actix::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use log::{debug, info, warn};

use super::messages::{Deliver, Forward, Join, Leave, ListPeers, RoomId};
use super::room::{Room, SessionLink};
use crate::config::relay::MAX_PEERS_PER_ROOM;
use crate::server::ws_error::{SESSION_KICKED, ws_session_kicked_reason};

pub struct RoomServer {
    rooms: HashMap<RoomId, Room>,
    capacity: usize,
}

impl RoomServer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PEERS_PER_ROOM)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            capacity,
        }
    }

    /// Drop the room if nobody is left in it.
    fn prune(&mut self, room_id: &str) {
        if self.rooms.get(room_id).is_some_and(|room| room.is_empty()) {
            self.rooms.remove(room_id);
            debug!("[RoomServer] Room {} closed", room_id);
        }
    }
}

impl Default for RoomServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for RoomServer {
    type Context = Context<Self>;
}

impl Handler<Join> for RoomServer {
    type Result = ();

    /// Handles a session joining a room, kicking any older session with the same peer id.
    fn handle(&mut self, msg: Join, _ctx: &mut Self::Context) -> Self::Result {
        let capacity = self.capacity;
        let room = self
            .rooms
            .entry(msg.room_id.clone())
            .or_insert_with(|| {
                info!("[RoomServer] Room {} opened", msg.room_id);
                Room::new(msg.room_id.clone(), capacity)
            });

        let link = SessionLink {
            peer_id: msg.peer_id.clone(),
            session_id: msg.session_id,
            recipient: msg.recipient.clone(),
        };
        match room.join(link) {
            Ok(Some(replaced)) => {
                debug!("[RoomServer] Peer {} reconnected in {} (old session kicked)", msg.peer_id, msg.room_id);
                replaced.recipient.do_send(Deliver::Close {
                    code: SESSION_KICKED,
                    reason: ws_session_kicked_reason().to_string(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!("[RoomServer] Join refused for {}: {}", msg.peer_id, e);
                msg.recipient.do_send(Deliver::Close {
                    code: e.code(),
                    reason: e.to_string(),
                });
                self.prune(&msg.room_id);
            }
        }
    }
}

impl Handler<Leave> for RoomServer {
    type Result = ();

    fn handle(&mut self, msg: Leave, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(room) = self.rooms.get_mut(&msg.room_id) {
            if !room.leave(&msg.peer_id, msg.session_id) {
                // Not the registered session (already replaced or never joined).
                debug!("[RoomServer] Ignored leave from stale session of {}", msg.peer_id);
            }
        }
        self.prune(&msg.room_id);
    }
}

impl Handler<Forward> for RoomServer {
    type Result = ();

    fn handle(&mut self, msg: Forward, _ctx: &mut Self::Context) -> Self::Result {
        let Some(room) = self.rooms.get_mut(&msg.room_id) else {
            warn!("[RoomServer] Forward to unknown room {}", msg.room_id);
            return;
        };
        let kind = msg.message.kind();
        match room.relay(&msg.peer_id, msg.session_id, msg.message, Instant::now()) {
            Ok(Some(out)) => {
                debug!("[RoomServer] {} from {} relayed to {} peers", kind, msg.peer_id, out.sent);
            }
            Ok(None) => {}
            Err(e) => warn!("[RoomServer] Relay refused for {}: {}", msg.peer_id, e),
        }
    }
}

impl Handler<ListPeers> for RoomServer {
    type Result = MessageResult<ListPeers>;

    fn handle(&mut self, msg: ListPeers, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(
            self.rooms
                .get(&msg.room_id)
                .map(|room| room.peers())
                .unwrap_or_default(),
        )
    }
}
