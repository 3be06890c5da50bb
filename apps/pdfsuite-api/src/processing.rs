//! Function execution: load inputs from storage, run the operation, store results

use crate::error::ServerError;
use crate::state::AppState;
use pdfsuite_core::options::WatermarkKind;
use pdfsuite_core::{InvokePayload, InvokeResponse, OperationKind, OperationOptions};
use pdfsuite_ops::{PdfOpsError, ProcessMetrics};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Folder results are written to inside the bucket
pub const RESULTS_FOLDER: &str = "results";

/// Function reply: the invoke response schema plus processing metrics
#[derive(Debug, Serialize)]
pub struct FunctionResponse {
    #[serde(flatten)]
    pub response: InvokeResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ProcessMetrics>,
}

async fn load_inputs(state: &AppState, paths: &[String]) -> Result<Vec<Vec<u8>>, ServerError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        inputs.push(state.store.get(&state.bucket, path).await?);
    }
    Ok(inputs)
}

async fn load_watermark_image(
    state: &AppState,
    options: &OperationOptions,
) -> Result<Option<Vec<u8>>, ServerError> {
    let OperationOptions::Watermark(watermark) = options else {
        return Ok(None);
    };
    if watermark.kind != WatermarkKind::Image {
        return Ok(None);
    }
    let path = watermark
        .image_ref
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequest("imageRef is required".into()))?;
    Ok(Some(state.store.get(&state.bucket, path).await?))
}

/// Run one operation end to end
pub async fn run_function(
    state: &AppState,
    kind: OperationKind,
    payload: InvokePayload,
) -> Result<FunctionResponse, ServerError> {
    if !pdfsuite_ops::is_supported(kind) {
        return Err(PdfOpsError::Unsupported(kind.to_string()).into());
    }
    if payload.file_paths.is_empty() {
        return Err(ServerError::InvalidRequest("No files provided".into()));
    }

    let options = OperationOptions::parse(kind, payload.options)?;
    options.validate()?;
    debug!("Running {} on {:?}", kind, payload.file_paths);

    let inputs = load_inputs(state, &payload.file_paths).await?;
    let image = load_watermark_image(state, &options).await?;

    let result = tokio::task::spawn_blocking(move || {
        pdfsuite_ops::process(&options, &inputs, image.as_deref())
    })
    .await
    .map_err(|e| ServerError::Internal(format!("processing task failed: {}", e)))??;

    let mut urls = Vec::with_capacity(result.documents.len());
    for document in &result.documents {
        let path = format!("{}/{}.pdf", RESULTS_FOLDER, Uuid::new_v4());
        state.store.put(&state.bucket, &path, document).await?;
        urls.push(state.public_object_url(&state.bucket, &path));
    }

    info!(
        "{} finished: {} output(s), {} pages, {} -> {} bytes in {}ms",
        kind,
        urls.len(),
        result.metrics.page_count,
        result.metrics.input_size_bytes,
        result.metrics.output_size_bytes,
        result.metrics.processing_time_ms
    );

    let response = match urls.len() {
        1 => InvokeResponse::succeeded(urls.remove(0)),
        _ => InvokeResponse::succeeded_many(urls),
    };
    Ok(FunctionResponse {
        response,
        metrics: Some(result.metrics),
    })
}
