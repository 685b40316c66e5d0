//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Workstations
        .route("/workstations", get(handlers::list_workstations))
        .route("/workstations/register", post(handlers::register_workstation))
        .route("/workstations/:name", get(handlers::get_workstation))
        .route("/workstations/:name/propagation", get(handlers::check_propagation))
        .route("/workstations/:name/events", get(handlers::list_workstation_events));

    let router = Router::new()
        .nest("/api", api_routes)
        .fallback(handlers::route_not_found)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
