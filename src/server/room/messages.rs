use actix::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::connection::PeerId;
use crate::sync::messages::PeerMessage;

pub type RoomId = String;

/// Frames the relay sends to clients.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", content = "data")]
pub enum ServerWsMessage {
    /// Sent once to a peer that just joined.
    Welcome {
        room_id: RoomId,
        peer_id: PeerId,
        peers: Vec<PeerId>,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    /// A message from another peer, passed through unchanged.
    Relay {
        from: PeerId,
        message: PeerMessage,
    },
}

impl ServerWsMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Delivery from the room server to one websocket session.
#[derive(Message, Clone, Debug, PartialEq)]
#[rtype(result = "()")]
pub enum Deliver {
    /// Already-serialized JSON frame.
    Text(String),
    /// Send an error frame with this code and close the socket.
    Close { code: &'static str, reason: String },
}

/// Message: a websocket session joins a room.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Join {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    pub session_id: Uuid,
    pub recipient: Recipient<Deliver>,
}

/// Message: a websocket session leaves its room.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Leave {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    pub session_id: Uuid,
}

/// Message: a validated peer message to relay to the rest of the room.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Forward {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    pub session_id: Uuid,
    pub message: PeerMessage,
}

/// Message: list the peers currently in a room.
#[derive(Message)]
#[rtype(result = "Vec<PeerId>")]
pub struct ListPeers {
    pub room_id: RoomId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_use_action_data_envelope() {
        let text = ServerWsMessage::PeerJoined { peer_id: "abc".into() }.to_json().unwrap();
        assert_eq!(text, r#"{"action":"PeerJoined","data":{"peer_id":"abc"}}"#);
    }

    #[test]
    fn relay_keeps_peer_message_shape() {
        let relay = ServerWsMessage::Relay {
            from: "a".into(),
            message: PeerMessage::decode(r#"{"type":"page-change","data":{"page":3}}"#).unwrap(),
        };
        let value: serde_json::Value = serde_json::from_str(&relay.to_json().unwrap()).unwrap();
        assert_eq!(value["data"]["message"]["type"], "page-change");
        assert_eq!(value["data"]["message"]["data"]["page"], 3);
    }
}
