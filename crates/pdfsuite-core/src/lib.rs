//! pdfsuite-core: orchestration for remote PDF operations
//!
//! A run validates its inputs locally, uploads them concurrently to blob
//! storage, invokes a remote function with the ordered storage paths and
//! turns the reply into a downloadable artifact.
//!
//! ```ignore
//! let storage = Arc::new(HttpStorage::new(config.clone()));
//! let invoker = Arc::new(HttpInvoker::new(config));
//! let orchestrator = Orchestrator::new(OperationKind::Merge, storage, invoker);
//! orchestrator.set_inputs(files)?;
//! let snapshot = orchestrator.start().await?;
//! ```

pub mod error;
pub mod file;
#[cfg(feature = "http-client")]
pub mod http;
pub mod invoker;
pub mod operation;
pub mod options;
pub mod orchestrator;
pub mod run;
pub mod storage;
pub mod validation;

pub use error::{
    FailureCategory, InvokeError, RunError, StorageError, TransitionError, UploadFailure,
    ValidationError,
};
pub use file::{FileId, PendingFile, Preview};
#[cfg(feature = "http-client")]
pub use http::{ClientConfig, HttpInvoker, HttpStorage};
pub use invoker::{
    FunctionRouting, InvokePayload, InvokeResponse, RemoteInvoker, ResultArtifact,
};
pub use operation::{OperationKind, UnknownOperation};
pub use options::OperationOptions;
pub use orchestrator::{Orchestrator, OrchestratorConfig, ProgressCallback};
pub use run::{OperationRun, ProgressUpdate, RunPhase, RunSnapshot};
pub use storage::{StorageAdapter, StoredFile};
pub use validation::SizeLimits;
