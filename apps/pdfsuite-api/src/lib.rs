//! pdfsuite server
//!
//! Serves the two collaborators the orchestrator talks to:
//!
//! - blob storage under `/storage/v1/...`, kept on the local filesystem
//! - functions under `/functions/v1/:name` that run `pdfsuite-ops`

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod processing;
pub mod state;
pub mod storage;

pub use error::ServerError;
pub use state::AppState;
pub use storage::BlobStore;

use handlers::{
    handle_delete, handle_download, handle_function, handle_health, handle_upload,
};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Blob storage
        .route(
            "/storage/v1/object/:bucket/*path",
            post(handle_upload).delete(handle_delete),
        )
        .route("/storage/v1/public/:bucket/*path", get(handle_download))
        // Functions
        .route("/functions/v1/:name", post(handle_function))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}
