/// Centralized helpers for WebSocket and HTTP error responses.
///
/// Use these helpers to ensure all error messages are consistent, explicit, and include a code and context.
use actix_web::{HttpResponse, http::StatusCode};
use serde_json::{Value, json};

pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
pub const SESSION_KICKED: &str = "SESSION_KICKED";
pub const BANNED: &str = "BANNED";
pub const BAD_REQUEST: &str = "BAD_REQUEST";

/// Formats a WebSocket error frame as a JSON string.
///
/// # Arguments
/// - `code`: Unique error code (e.g. "INVALID_MESSAGE").
/// - `message`: Human-readable error message.
/// - `context`: Optional context (e.g. peer_id, room_id).
pub fn ws_error_message(code: &str, message: &str, context: Option<Value>) -> String {
    json!({
        "action": "Error",
        "data": {
            "code": code,
            "message": message,
            "context": context.unwrap_or(Value::Null),
        }
    })
    .to_string()
}

/// Error frame telling a peer it has been banned for flooding.
pub fn ws_ban_message(peer_id: &str, ban_remaining_secs: u64) -> String {
    ws_error_message(
        BANNED,
        "You have been banned for spamming. Please try again later.",
        Some(json!({ "peer_id": peer_id, "ban_remaining_secs": ban_remaining_secs })),
    )
}

/// Reason given to a session replaced by a newer one with the same peer id.
pub fn ws_session_kicked_reason() -> &'static str {
    "You have been disconnected because another session has joined with your peer id."
}

/// Returns an HTTP error response with a JSON body.
pub fn http_error_response(
    code: &str,
    message: &str,
    context: Option<Value>,
    status: StatusCode,
) -> HttpResponse {
    let body = json!({
        "error": {
            "code": code,
            "message": message,
            "context": context.unwrap_or(Value::Null),
        }
    });
    HttpResponse::build(status).json(body)
}
