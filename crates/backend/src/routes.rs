use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::system::handlers::importers;
use crate::system::importers::ImportSystem;
use crate::system::middleware::request_logger::request_logger;

/// Конфигурация всех роутов приложения
pub fn configure_routes(system: ImportSystem) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // IMPORTERS
        // ========================================
        .route("/api/importers", get(importers::list_importers))
        .route("/api/importers/runs", get(importers::list_runs))
        .route("/api/importers/runs/:session_id", get(importers::get_run))
        .route("/api/importers/:id", get(importers::get_importer))
        .route("/api/importers/:id/import", post(importers::start_import))
        .route("/api/importers/:id/remove", post(importers::start_removal))
        .layer(middleware::from_fn(request_logger))
        .with_state(system)
}
