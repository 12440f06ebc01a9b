//! API route definitions

use crate::api::handlers;
use crate::session::SessionServices;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<SessionServices>,
}

/// Build the complete router.
pub fn create_router(services: Arc<SessionServices>) -> Router {
    let state = AppState { services };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/stream", get(handlers::analyze_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
