//! HTTP handlers for the pdfsuite server

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pdfsuite_core::InvokePayload;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::ServerError;
use crate::processing::{run_function, FunctionResponse};
use crate::state::{AppState, FunctionTarget};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfsuite-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub key: String,
}

/// Handler: POST /storage/v1/object/:bucket/*path
pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ServerError> {
    state.check_bucket(&bucket)?;
    state.store.put(&bucket, &path, &body).await?;
    info!("Uploaded {}/{} ({} bytes)", bucket, path, body.len());
    Ok(Json(UploadResponse {
        key: format!("{}/{}", bucket, path),
    }))
}

/// Handler: DELETE /storage/v1/object/:bucket/*path
pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state.check_bucket(&bucket)?;
    state.store.delete(&bucket, &path).await?;
    info!("Deleted {}/{}", bucket, path);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler: GET /storage/v1/public/:bucket/*path
pub async fn handle_download(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    state.check_bucket(&bucket)?;
    let bytes = state.store.get(&bucket, &path).await?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response())
}

/// Handler: POST /functions/v1/:name
pub async fn handle_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<InvokePayload>,
) -> Result<Json<FunctionResponse>, ServerError> {
    let kind = match state.function_target(&name) {
        Some(FunctionTarget::Dispatch) => payload.operation,
        Some(FunctionTarget::Operation(kind)) if kind == payload.operation => kind,
        Some(FunctionTarget::Operation(kind)) => {
            return Err(ServerError::InvalidRequest(format!(
                "function {} runs {}, payload asked for {}",
                name, kind, payload.operation
            )))
        }
        None => return Err(ServerError::UnknownFunction(name)),
    };

    info!("Function {} invoked for {}", name, kind);
    run_function(&state, kind, payload).await.map(Json)
}
