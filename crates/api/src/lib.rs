//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes for the payment ledger
//! - Request/response types
//! - Error mapping from the ledger taxonomy to HTTP responses
//!
//! Authentication is handled upstream of this service and is
//! intentionally absent here.

pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Retry budget for conflicting allocations.
    pub allocation_retries: u32,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
