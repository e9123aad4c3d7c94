//! HTTP router construction.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Build the gateway router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/parse", get(api::parse))
        .route("/posts", get(api::list_posts))
        .route(
            "/post/{id}",
            get(api::get_post)
                .put(api::update_post)
                .delete(api::delete_post),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
