use serde::Serialize;
use thiserror::Error;

use crate::file::FileId;
use crate::operation::OperationKind;
use crate::run::RunPhase;

/// Local input problems, detected before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files selected")]
    NoInputs,

    #[error("{kind} needs at least {min} files, got {actual}")]
    TooFewInputs {
        kind: OperationKind,
        min: usize,
        actual: usize,
    },

    #[error("{kind} accepts at most {max} file(s), got {actual}")]
    TooManyInputs {
        kind: OperationKind,
        max: usize,
        actual: usize,
    },

    #[error("{file} is not a supported file type ({media_type})")]
    UnsupportedType { file: String, media_type: String },

    #[error("{file} exceeds the {limit_mib} MB size limit")]
    FileTooLarge {
        file: String,
        size: u64,
        limit_mib: u64,
    },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("File name must not be empty")]
    EmptyFileName,
}

/// Failure reported by a storage adapter for a single file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage configuration is missing: {0}")]
    Configuration(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Storage request failed: {0}")]
    Transport(String),
}

/// Failure reported by a remote invoker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The remote function answered `{ "success": false, "error": ... }`
    #[error("{0}")]
    Remote(String),

    #[error("Remote call failed: {0}")]
    Transport(String),

    #[error("remote function returned HTTP {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invoker configuration is missing: {0}")]
    Configuration(String),
}

/// One input that could not be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub file_id: FileId,
    pub file_name: String,
    pub cause: String,
}

/// Why a run ended in `Failed`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to upload one or more files: {}", describe_failures(.0))]
    UploadFailed(Vec<UploadFailure>),

    #[error("{0}")]
    InvokeFailed(String),

    #[error("Processing reported success but returned no result reference")]
    InvalidResponse,
}

fn describe_failures(failures: &[UploadFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.file_name, f.cause))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InvalidInput,
    Upload,
    Processing,
}

impl RunError {
    pub fn category(&self) -> FailureCategory {
        match self {
            RunError::Validation(_) => FailureCategory::InvalidInput,
            RunError::UploadFailed(_) => FailureCategory::Upload,
            RunError::InvokeFailed(_) | RunError::InvalidResponse => FailureCategory::Processing,
        }
    }
}

impl From<InvokeError> for RunError {
    fn from(err: InvokeError) -> Self {
        RunError::InvokeFailed(err.to_string())
    }
}

/// A lifecycle call that is not allowed in the run's current phase
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A run is already in progress ({0})")]
    AlreadyRunning(RunPhase),

    #[error("The run has finished ({0}); reset it before starting again")]
    NeedsReset(RunPhase),

    #[error("Only a finished run can be reset (currently {0})")]
    NotFinished(RunPhase),
}
