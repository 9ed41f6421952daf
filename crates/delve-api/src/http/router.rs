//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Research jobs
        .route(
            "/research",
            post(handlers::research::create_research).get(handlers::research::list_research),
        )
        .route("/research/{id}", get(handlers::research::get_research))
        .route(
            "/research/{id}/cancel",
            post(handlers::research::cancel_research),
        )
        .route(
            "/research/{id}/events",
            get(handlers::research::research_events),
        )
        // Chat streaming
        .route("/chat/stream", post(handlers::chat::stream_chat));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness check.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
