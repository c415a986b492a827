use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Runtime amplitude threshold
        .route(
            "/threshold",
            get(handlers::get_threshold).put(handlers::set_threshold),
        )
        // Capture lifecycle
        .route("/captures", post(handlers::start_capture))
        .route("/captures/:capture_id", get(handlers::get_capture))
        .route(
            "/captures/:capture_id/cancel",
            post(handlers::cancel_capture),
        )
        // Session introspection
        .route("/session", get(handlers::get_session))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
