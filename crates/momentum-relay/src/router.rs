use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the relay router. CORS is open so the app can call it from any
/// origin on the local network.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health-check", get(handlers::health_check))
        .route("/api/send-failure-email", post(handlers::send_failure_email))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
