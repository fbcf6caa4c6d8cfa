//! Main entry point for the relay server.
//!
//! Initializes logging and the room server actor, then launches the HTTP server
//! with the room WebSocket endpoint.

use actix::Actor;
use actix_web::{web, App, HttpServer};
use log::info;

use pose_relay::config::relay::{BIND_ADDR_ENV, DEFAULT_BIND_ADDR};
use pose_relay::server::room::server::RoomServer;
use pose_relay::server::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger from environment variable (RUST_LOG).
    env_logger::init();

    // Start the RoomServer actor (owns every room and its members).
    let room_server = RoomServer::new().start();

    // Shared application state for HTTP/WebSocket handlers.
    let state = web::Data::new(AppState::new(room_server));

    let bind_addr = std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    info!("[Main] Listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(state.clone())
            .configure(pose_relay::server::router::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
