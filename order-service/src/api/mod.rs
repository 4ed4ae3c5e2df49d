//! HTTP routes

pub mod health;
pub mod orders;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::core::AppState;

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/order", post(orders::create_order))
        .route("/order/{uid}", get(orders::get_order))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
