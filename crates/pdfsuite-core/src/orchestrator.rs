//! Upload, invoke and collect pipeline
//!
//! An [`Orchestrator`] owns a single [`OperationRun`] and drives it through
//! `Idle -> Validating -> Uploading -> Invoking -> Succeeded | Failed`.
//! Collaborators are injected as trait objects.
//!
//! Dropping the future returned by [`Orchestrator::start`] fails the run as
//! abandoned, so it can be reset and started again. Requests already in
//! flight may still complete remotely.

use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{RunError, TransitionError, UploadFailure, ValidationError};
use crate::file::{FileId, PendingFile};
use crate::invoker::{InvokePayload, RemoteInvoker, ResultArtifact};
use crate::operation::OperationKind;
use crate::options::OperationOptions;
use crate::run::{
    OperationRun, ProgressUpdate, RunPhase, RunSnapshot, PROGRESS_DONE, PROGRESS_INVOKING,
    PROGRESS_RESPONDED, PROGRESS_UPLOADING,
};
use crate::storage::StorageAdapter;
use crate::validation::{validate_run, SizeLimits};

pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Callback receiving every progress change
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on the remote call
    pub invoke_timeout: Duration,
    /// Storage folder for uploads; the operation name when unset
    pub upload_folder: Option<String>,
    pub limits: SizeLimits,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            upload_folder: None,
            limits: SizeLimits::default(),
        }
    }
}

pub struct Orchestrator {
    storage: Arc<dyn StorageAdapter>,
    invoker: Arc<dyn RemoteInvoker>,
    config: OrchestratorConfig,
    run: Mutex<OperationRun>,
    progress_callback: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(
        kind: OperationKind,
        storage: Arc<dyn StorageAdapter>,
        invoker: Arc<dyn RemoteInvoker>,
    ) -> Self {
        Self {
            storage,
            invoker,
            config: OrchestratorConfig::default(),
            run: Mutex::new(OperationRun::new(kind)),
            progress_callback: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Callback signature: (phase, percent, message)
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn kind(&self) -> OperationKind {
        self.lock_run().kind()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock_run().snapshot()
    }

    /// Replace the inputs. After a finished run this starts over from Idle.
    pub fn set_inputs(&self, inputs: Vec<Arc<PendingFile>>) -> Result<(), TransitionError> {
        let mut run = self.lock_run();
        prepare_for_edit(&mut run)?;
        run.inputs = inputs;
        Ok(())
    }

    pub fn add_input(&self, file: Arc<PendingFile>) -> Result<(), TransitionError> {
        let mut run = self.lock_run();
        prepare_for_edit(&mut run)?;
        run.inputs.push(file);
        Ok(())
    }

    /// Returns whether a file with `id` was present
    pub fn remove_input(&self, id: FileId) -> Result<bool, TransitionError> {
        let mut run = self.lock_run();
        prepare_for_edit(&mut run)?;
        let before = run.inputs.len();
        run.inputs.retain(|f| f.id() != id);
        Ok(run.inputs.len() != before)
    }

    /// Replace the options. After a finished run this starts over from Idle.
    pub fn set_options(&self, options: OperationOptions) -> Result<(), TransitionError> {
        let mut run = self.lock_run();
        prepare_for_edit(&mut run)?;
        run.options = Some(options);
        Ok(())
    }

    /// Back to Idle from Succeeded or Failed. Inputs and options are kept and
    /// nothing stored remotely is deleted.
    pub fn reset(&self) -> Result<(), TransitionError> {
        let mut run = self.lock_run();
        if !run.phase.is_terminal() {
            return Err(TransitionError::NotFinished(run.phase));
        }
        run.clear();
        info!(operation = %run.kind(), "Run reset");
        Ok(())
    }

    /// Drive the run to a terminal phase.
    ///
    /// Rejected without side effects unless the run is Idle. Once accepted,
    /// every outcome is recorded in the run and the final snapshot is returned.
    pub async fn start(&self) -> Result<RunSnapshot, TransitionError> {
        let (kind, inputs, options) = {
            let mut run = self.lock_run();
            match run.phase {
                RunPhase::Idle => {}
                phase if phase.is_active() => return Err(TransitionError::AlreadyRunning(phase)),
                phase => return Err(TransitionError::NeedsReset(phase)),
            }
            run.phase = RunPhase::Validating;
            (run.kind(), run.inputs.clone(), run.options.clone())
        };
        let guard = AbandonGuard {
            orchestrator: self,
            kind,
            armed: true,
        };
        info!(operation = %kind, inputs = inputs.len(), "Run started");
        self.report(None, 0, "Validating inputs".to_string());

        let outcome = self.execute(kind, &inputs, options.as_ref()).await;

        let update = {
            let mut run = self.lock_run();
            match outcome {
                Ok(artifact) => {
                    info!(operation = %kind, url = artifact.url(), "Run succeeded");
                    run.succeed(artifact);
                    ProgressUpdate {
                        phase: run.phase(),
                        percent: run.progress_percent(),
                        message: format!("PDF {} successfully", kind.past_tense()),
                    }
                }
                Err(error) => {
                    warn!(operation = %kind, category = ?error.category(), "Run failed: {}", error);
                    let message = error.to_string();
                    run.fail(error);
                    ProgressUpdate {
                        phase: run.phase(),
                        percent: run.progress_percent(),
                        message,
                    }
                }
            }
        };
        guard.disarm();
        self.emit(&update);
        Ok(self.snapshot())
    }

    async fn execute(
        &self,
        kind: OperationKind,
        inputs: &[Arc<PendingFile>],
        options: Option<&OperationOptions>,
    ) -> Result<ResultArtifact, RunError> {
        let options = validate_run(kind, inputs, options, &self.config.limits)?;

        let mut uploads: Vec<Arc<PendingFile>> = inputs.to_vec();
        let image = options.pending_image().cloned();
        if let Some(image) = &image {
            uploads.push(Arc::clone(image));
        }
        self.report(
            Some(RunPhase::Uploading),
            PROGRESS_UPLOADING,
            format!("Uploading {} file(s)", uploads.len()),
        );
        let mut file_paths = self.upload_all(kind, &uploads).await?;

        let options = match image {
            Some(_) => match file_paths.pop() {
                Some(path) => options.with_image_ref(&path),
                None => options,
            },
            None => options,
        };
        let options = serde_json::to_value(&options)
            .map_err(|e| ValidationError::InvalidOptions(e.to_string()))?;

        self.report(
            Some(RunPhase::Invoking),
            PROGRESS_INVOKING,
            format!("Processing {}", kind),
        );
        let payload = InvokePayload {
            operation: kind,
            file_paths,
            options,
        };
        debug!(operation = %kind, files = ?payload.file_paths, "Invoking remote function");

        let timeout = self.config.invoke_timeout;
        let response = match tokio::time::timeout(timeout, self.invoker.invoke(kind, &payload)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Err(error.into()),
            Err(_) => {
                return Err(RunError::InvokeFailed(format!(
                    "{} timed out after {} ms",
                    kind,
                    timeout.as_millis()
                )))
            }
        };
        self.report(None, PROGRESS_RESPONDED, "Processing response".to_string());
        debug!(operation = %kind, ?response, "Remote function responded");

        response.into_artifact()
    }

    /// Upload every file concurrently and wait for all of them. Paths come
    /// back in input order.
    async fn upload_all(
        &self,
        kind: OperationKind,
        files: &[Arc<PendingFile>],
    ) -> Result<Vec<String>, RunError> {
        let folder = self
            .config
            .upload_folder
            .clone()
            .unwrap_or_else(|| kind.as_str().to_string());
        let storage = &self.storage;
        let folder = folder.as_str();

        let results = join_all(files.iter().map(|file| async move {
            let result = storage.upload(file, folder).await;
            (file, result)
        }))
        .await;

        let mut paths = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        for (file, result) in results {
            match result {
                Ok(stored) => {
                    debug!(file = file.name(), path = %stored.file_path, "Uploaded");
                    paths.push(stored.file_path);
                }
                Err(error) => {
                    warn!(file = file.name(), "Upload failed: {}", error);
                    failures.push(UploadFailure {
                        file_id: file.id(),
                        file_name: file.name().to_string(),
                        cause: error.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(paths)
        } else {
            Err(RunError::UploadFailed(failures))
        }
    }

    /// Update phase and progress, then notify outside the lock
    fn report(&self, phase: Option<RunPhase>, percent: u8, message: String) {
        let update = {
            let mut run = self.lock_run();
            if let Some(phase) = phase {
                run.phase = phase;
                info!(operation = %run.kind(), %phase, "Phase changed");
            }
            run.advance(percent.min(PROGRESS_DONE));
            ProgressUpdate {
                phase: run.phase(),
                percent: run.progress_percent(),
                message,
            }
        };
        self.emit(&update);
    }

    fn emit(&self, update: &ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }

    fn lock_run(&self) -> MutexGuard<'_, OperationRun> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fails the run when the `start` future is dropped before recording an outcome
struct AbandonGuard<'a> {
    orchestrator: &'a Orchestrator,
    kind: OperationKind,
    armed: bool,
}

impl AbandonGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let update = {
            let mut run = self.orchestrator.lock_run();
            if !run.phase.is_active() {
                return;
            }
            warn!(operation = %self.kind, phase = %run.phase, "Run abandoned");
            let error = RunError::InvokeFailed(format!(
                "{} was abandoned before it finished",
                self.kind
            ));
            let message = error.to_string();
            run.fail(error);
            ProgressUpdate {
                phase: run.phase(),
                percent: run.progress_percent(),
                message,
            }
        };
        self.orchestrator.emit(&update);
    }
}

fn prepare_for_edit(run: &mut OperationRun) -> Result<(), TransitionError> {
    if run.phase.is_active() {
        return Err(TransitionError::AlreadyRunning(run.phase));
    }
    if run.phase.is_terminal() {
        run.clear();
    }
    Ok(())
}
