//! User-selected inputs awaiting processing

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque identifier assigned to a file when it is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Derived thumbnail for a pending file
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// One input file. Runs hold it behind an `Arc`, so the bytes are never copied.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    id: FileId,
    name: String,
    media_type: String,
    bytes: Vec<u8>,
    preview: Option<Preview>,
}

impl PendingFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        Ok(Self {
            id: FileId::new(),
            name,
            media_type: media_type.into(),
            bytes,
            preview: None,
        })
    }

    /// Attach a preview. Only possible before the file is shared.
    pub fn with_preview(mut self, preview: Preview) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Name reduced to characters that are safe inside a storage key
    pub fn sanitized_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let trimmed = cleaned.trim_start_matches('.');
        if trimmed.is_empty() {
            "file".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .field("has_preview", &self.preview.is_some())
            .finish()
    }
}
