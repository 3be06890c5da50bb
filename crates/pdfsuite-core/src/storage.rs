//! Blob storage collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::file::PendingFile;

/// Bucket used when none is configured
pub const DEFAULT_BUCKET: &str = "pdfs";

/// Where an uploaded file ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Path inside the bucket, handed to the remote function
    pub file_path: String,
    pub public_url: String,
}

/// Accepts a file and a logical folder, returns where the file was stored.
///
/// Implementations must be safe to call concurrently. Nothing is cleaned up
/// if a later step fails.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn upload(&self, file: &PendingFile, folder: &str) -> Result<StoredFile, StorageError>;
}

/// Storage key for `file` inside `folder`
pub fn object_path(file: &PendingFile, folder: &str) -> String {
    let folder = folder.trim_matches('/');
    let name = format!("{}_{}", file.id(), file.sanitized_name());
    if folder.is_empty() {
        name
    } else {
        format!("{}/{}", folder, name)
    }
}
