//! HTTP and WebSocket routing configuration.
//!
//! Peers connect to a room over WebSocket; a small HTTP endpoint lists who is in a room.

use actix_web::{web, Error, HttpResponse, http::StatusCode};

use crate::server::room::messages::ListPeers;
use crate::server::room::session::{is_valid_id, ws_room};
use crate::server::state::AppState;
use crate::server::ws_error::{BAD_REQUEST, http_error_response};

/// Configure the application's HTTP/WebSocket routes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/ws/room/{room_id}")
            .to(ws_room)
    )
    .service(
        web::resource("/rooms/{room_id}/peers")
            .route(web::get().to(room_peers))
    );
}

/// Lists the peer ids currently in a room (empty for unknown rooms).
async fn room_peers(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let room_id = path.into_inner();
    if !is_valid_id(&room_id) {
        return Ok(http_error_response(BAD_REQUEST, "Invalid room id", None, StatusCode::BAD_REQUEST));
    }
    let peers = data
        .room_server
        .send(ListPeers { room_id: room_id.clone() })
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "room_id": room_id, "peers": peers })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::Actor;
    use actix_web::{App, test};
    use crate::server::room::server::RoomServer;

    #[actix_web::test]
    async fn lists_peers_of_an_empty_room() {
        let state = web::Data::new(AppState::new(RoomServer::new().start()));
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/rooms/lobby/peers").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["room_id"], "lobby");
        assert_eq!(body["peers"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn rejects_invalid_room_id() {
        let state = web::Data::new(AppState::new(RoomServer::new().start()));
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/rooms/bad%20id/peers").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn plain_http_to_ws_route_is_refused() {
        let state = web::Data::new(AppState::new(RoomServer::new().start()));
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/ws/room/lobby?peer_id=a").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }
}
