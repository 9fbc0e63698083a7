use axum::Router;
use log::info;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use adoption_chat::chat;
use adoption_chat::integration;
use adoption_chat::state::AppState;

#[tokio::main]
async fn main() {
    let cfg = integration::Config::default();
    let state = AppState::init(&cfg).await;

    let app = Router::new()
        .merge(chat::ws(state.clone()))
        .merge(chat::api(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cfg.env.allow_origin())
                .allow_methods(cfg.env.allow_methods())
                .allow_headers(cfg.env.allow_headers()),
        );

    let addr = cfg.env.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));

    info!("Listening on {addr}");
    if let Err(e) = axum::serve(listener, app).await {
        panic!("Server stopped: {e}");
    }
}
