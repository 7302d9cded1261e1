mod handlers;
mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::PawMapSession;

pub fn build_router(session: PawMapSession) -> Router {
    let state = Arc::new(AppState { session });

    Router::new()
        .route("/api/nearby", get(handlers::nearby))
        .route("/api/saved", get(handlers::list_saved).post(handlers::save_place))
        .route("/api/saved/{id}", delete(handlers::unsave_place))
        .route("/api/nearest", get(handlers::list_nearest).post(handlers::add_nearest))
        .route("/api/nearest/{id}", delete(handlers::remove_nearest))
        .route("/api/directions", get(handlers::directions))
        .route("/api/pets", get(handlers::list_pets))
        .route("/api/pets/commands", post(handlers::pet_command))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(addr: SocketAddr, session: PawMapSession) -> std::io::Result<()> {
    let app = build_router(session);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "PawMap server listening");
    eprintln!("  PawMap server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}
