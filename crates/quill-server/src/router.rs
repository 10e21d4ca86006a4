use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use quill_anchor::LedgerAnchor;
use quill_sdk::DocumentService;
use quill_store::{BlobStore, VersionStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;

/// Document service with its backends chosen at runtime.
pub type DynDocumentService =
    DocumentService<Arc<dyn LedgerAnchor>, Arc<dyn VersionStore>, Arc<dyn BlobStore>>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DynDocumentService>,
}

impl AppState {
    pub fn new(service: DynDocumentService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the axum router with all Quill endpoints.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/documents", post(handler::create_handler))
        .route("/v1/documents/:id", get(handler::document_handler))
        .route("/v1/documents/:id/sign", post(handler::sign_handler))
        .route("/v1/documents/:id/reject", post(handler::reject_handler))
        .route("/v1/documents/:id/versions", get(handler::history_handler))
        .route("/v1/documents/:id/versions/:number", get(handler::version_handler))
        .route(
            "/v1/documents/:id/versions/:number/content",
            get(handler::content_handler),
        )
        .route("/v1/verify", post(handler::verify_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
