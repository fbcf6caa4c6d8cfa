/// WebSocket session handler for one peer in a room.
///
/// This actor manages a single peer's connection, registers it with the room
/// server, validates every incoming payload as a `PeerMessage` before
/// forwarding it, and writes room frames back to the client.
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse, http::StatusCode};
use actix_web_actors::ws;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::messages::{Deliver, Forward, Join, Leave, RoomId};
use super::server::RoomServer;
use crate::config::relay::{CLIENT_TIMEOUT_SECS, HEARTBEAT_INTERVAL_SECS, MAX_PEER_ID_LEN};
use crate::server::anti_spam::AntiSpamState;
use crate::server::ws_error::{BAD_REQUEST, INVALID_MESSAGE, http_error_response, ws_ban_message, ws_error_message};
use crate::sync::connection::PeerId;
use crate::sync::messages::PeerMessage;

pub struct PeerSession {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    pub session_id: Uuid,
    pub room_server: Addr<RoomServer>,
    hb: Instant,
    anti_spam: AntiSpamState,
}

impl PeerSession {
    pub fn new(room_id: RoomId, peer_id: PeerId, room_server: Addr<RoomServer>) -> Self {
        Self {
            room_id,
            peer_id,
            session_id: Uuid::new_v4(),
            room_server,
            hb: Instant::now(),
            anti_spam: AntiSpamState::new(),
        }
    }

    /// Pings the client and closes the session once it stops answering.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS), |act, ctx| {
            if Instant::now().duration_since(act.hb) > Duration::from_secs(CLIENT_TIMEOUT_SECS) {
                info!("[Session] {} timed out in {}", act.peer_id, act.room_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let peer_id = self.peer_id.clone();
        if self.anti_spam.record_request(&peer_id) {
            self.ban_and_close(ctx);
            return;
        }
        match PeerMessage::decode(text) {
            Ok(message) => {
                self.anti_spam.reset_on_valid_action();
                self.room_server.do_send(Forward {
                    room_id: self.room_id.clone(),
                    peer_id,
                    session_id: self.session_id,
                    message,
                });
            }
            Err(e) => {
                debug!("[Session] Invalid payload from {}: {}", self.peer_id, e);
                let context = serde_json::json!({ "peer_id": self.peer_id, "reason": e.to_string() });
                self.reply_error(ctx, INVALID_MESSAGE, "Invalid peer message", Some(context));
            }
        }
    }

    /// Sends an error unless it repeats the previous one; bans if the session keeps erroring.
    fn reply_error(
        &mut self,
        ctx: &mut ws::WebsocketContext<Self>,
        code: &str,
        message: &str,
        context: Option<serde_json::Value>,
    ) {
        if !self.anti_spam.should_send_error(code, &self.peer_id) {
            return;
        }
        if self.anti_spam.record_response(&self.peer_id) {
            self.ban_and_close(ctx);
            return;
        }
        ctx.text(ws_error_message(code, message, context));
    }

    fn ban_and_close(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(ws_ban_message(&self.peer_id, self.anti_spam.ban_remaining_secs()));
        self.close_with(ctx, "Banned for spam");
    }

    /// Sends `code` as an error frame, then closes the socket.
    fn close_with_error(&mut self, ctx: &mut ws::WebsocketContext<Self>, code: &str, message: &str) {
        let context = serde_json::json!({ "peer_id": self.peer_id, "room_id": self.room_id });
        ctx.text(ws_error_message(code, message, Some(context)));
        self.close_with(ctx, code);
    }

    fn close_with(&mut self, ctx: &mut ws::WebsocketContext<Self>, description: &str) {
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some(description.to_string()),
        }));
        ctx.stop();
    }
}

impl Actor for PeerSession {
    type Context = ws::WebsocketContext<Self>;

    /// Registers the peer in its room and starts the heartbeat.
    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
        self.room_server.do_send(Join {
            room_id: self.room_id.clone(),
            peer_id: self.peer_id.clone(),
            session_id: self.session_id,
            recipient: ctx.address().recipient(),
        });
    }

    /// Removes the peer from its room.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.room_server.do_send(Leave {
            room_id: self.room_id.clone(),
            peer_id: self.peer_id.clone(),
            session_id: self.session_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PeerSession {
    /// Handles incoming WebSocket frames from the client.
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("[Session] Protocol error from {}: {}", self.peer_id, e);
                ctx.stop();
                return;
            }
        };
        match msg {
            ws::Message::Text(text) => {
                self.hb = Instant::now();
                self.handle_text(&text, ctx);
            }
            ws::Message::Ping(bytes) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => self.hb = Instant::now(),
            ws::Message::Binary(_) => {
                self.reply_error(ctx, INVALID_MESSAGE, "Binary frames are not supported", None);
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop => (),
        }
    }
}

impl Handler<Deliver> for PeerSession {
    type Result = ();

    /// Handles frames sent from the room server to this session.
    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        match msg {
            Deliver::Text(text) => ctx.text(text),
            Deliver::Close { code, reason } => {
                info!("[Session] Closing {} in {}: {}", self.peer_id, self.room_id, code);
                self.close_with_error(ctx, code, &reason);
            }
        }
    }
}

/// Room and peer ids: 1 to MAX_PEER_ID_LEN characters of `[A-Za-z0-9_-]`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_PEER_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extracts `peer_id` from a query string, URL-decoded.
pub fn peer_id_from_query(query: &str) -> Option<String> {
    for kv in query.split('&') {
        let mut split = kv.splitn(2, '=');
        if let (Some("peer_id"), Some(value)) = (split.next(), split.next()) {
            let decoded = urlencoding::decode(value)
                .unwrap_or_else(|_| Cow::Borrowed(""))
                .into_owned();
            return Some(decoded);
        }
    }
    None
}

/// WebSocket endpoint for a room.
///
/// Accepts an optional `peer_id` query parameter; peers without one get a fresh UUID.
pub async fn ws_room(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    data: web::Data<crate::server::state::AppState>,
) -> Result<HttpResponse, Error> {
    let room_id = path.into_inner();
    if !is_valid_id(&room_id) {
        return Ok(http_error_response(BAD_REQUEST, "Invalid room id", None, StatusCode::BAD_REQUEST));
    }

    let peer_id = peer_id_from_query(req.query_string()).unwrap_or_else(|| Uuid::new_v4().to_string());
    if !is_valid_id(&peer_id) {
        let context = serde_json::json!({ "room_id": room_id });
        return Ok(http_error_response(BAD_REQUEST, "Invalid peer id", Some(context), StatusCode::BAD_REQUEST));
    }

    info!("[Session] {} connecting to room {}", peer_id, room_id);
    ws::start(
        PeerSession::new(room_id, peer_id, data.room_server.clone()),
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_ids() {
        assert!(is_valid_id("room-1"));
        assert!(is_valid_id("3f2c_peer"));
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id(&"x".repeat(MAX_PEER_ID_LEN + 1)));
    }

    #[test]
    fn reads_peer_id_from_query() {
        assert_eq!(peer_id_from_query("foo=1&peer_id=abc"), Some("abc".to_string()));
        assert_eq!(peer_id_from_query("peer_id=a%2Db"), Some("a-b".to_string()));
        assert_eq!(peer_id_from_query("foo=1"), None);
        assert_eq!(peer_id_from_query(""), None);
    }
}
