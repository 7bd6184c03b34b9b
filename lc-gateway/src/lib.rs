// LC Gateway - HTTP surface over the LC orchestration service

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use lc_core::metrics::Metrics;
use lc_core::{Address, LcService};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LcService>,
    pub metrics: Arc<Metrics>,
    /// Signer used when a request carries no X-Signer-Address header
    pub default_signer: Option<Address>,
    pub service_name: String,
}

/// Build the application router
pub fn router(state: AppState, max_document_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/lc/create", post(handlers::create_lc))
        .route("/api/lc/approve/:lc_id", post(handlers::approve_lc))
        .route(
            "/api/lc/submit-documents/:lc_id",
            post(handlers::submit_documents).layer(DefaultBodyLimit::max(max_document_bytes)),
        )
        .route("/api/lc/close/:lc_id", post(handlers::close_lc))
        .route("/api/lc/details/:lc_id", get(handlers::get_lc_details))
        .route("/api/lc/operations/:reference", get(handlers::operation_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
