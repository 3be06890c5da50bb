//! Blob storage on the local filesystem
//!
//! Objects live at `<root>/<bucket>/<path>`. Every key is checked segment by
//! segment so nothing can resolve outside the root.

use crate::error::ServerError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

/// Reject empty, relative-navigation and absolute segments
fn checked_segments(key: &str) -> Result<Vec<&str>, ServerError> {
    if key.is_empty() {
        return Err(ServerError::InvalidPath("empty key".into()));
    }
    key.split('/')
        .map(|segment| {
            let bad = segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['\\', '\0', ':']);
            if bad {
                Err(ServerError::InvalidPath(key.to_string()))
            } else {
                Ok(segment)
            }
        })
        .collect()
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, bucket: &str, path: &str) -> Result<PathBuf, ServerError> {
        let bucket = checked_segments(bucket)?;
        if bucket.len() != 1 {
            return Err(ServerError::InvalidPath(format!(
                "bucket must be a single segment: {}",
                bucket.join("/")
            )));
        }
        let mut location = self.root.join(bucket[0]);
        for segment in checked_segments(path)? {
            location.push(segment);
        }
        Ok(location)
    }

    pub async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), ServerError> {
        let location = self.locate(bucket, path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&location, bytes).await?;
        tracing::debug!("Stored {} bytes at {}/{}", bytes.len(), bucket, path);
        Ok(())
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ServerError> {
        let location = self.locate(bucket, path)?;
        match fs::read(&location).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("{}/{}", bucket, path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, bucket: &str, path: &str) -> Result<(), ServerError> {
        let location = self.locate(bucket, path)?;
        match fs::remove_file(&location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("{}/{}", bucket, path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
