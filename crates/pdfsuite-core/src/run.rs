//! Run state owned by the orchestrator

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{FailureCategory, RunError};
use crate::file::{FileId, PendingFile};
use crate::invoker::ResultArtifact;
use crate::operation::OperationKind;
use crate::options::OperationOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Validating,
    Uploading,
    Invoking,
    Succeeded,
    Failed,
}

impl RunPhase {
    /// Validating, Uploading or Invoking
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunPhase::Validating | RunPhase::Uploading | RunPhase::Invoking
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Uploading => "uploading",
            RunPhase::Invoking => "invoking",
            RunPhase::Succeeded => "succeeded",
            RunPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress milestones
pub(crate) const PROGRESS_UPLOADING: u8 = 10;
pub(crate) const PROGRESS_INVOKING: u8 = 30;
pub(crate) const PROGRESS_RESPONDED: u8 = 90;
pub(crate) const PROGRESS_DONE: u8 = 100;

/// One execution attempt of an operation against a fixed set of inputs
#[derive(Debug, Clone)]
pub struct OperationRun {
    kind: OperationKind,
    pub(crate) inputs: Vec<Arc<PendingFile>>,
    pub(crate) options: Option<OperationOptions>,
    pub(crate) phase: RunPhase,
    progress: u8,
    pub(crate) artifact: Option<ResultArtifact>,
    pub(crate) failure: Option<RunError>,
}

impl OperationRun {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            options: None,
            phase: RunPhase::Idle,
            progress: 0,
            artifact: None,
            failure: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn inputs(&self) -> &[Arc<PendingFile>] {
        &self.inputs
    }

    pub fn options(&self) -> Option<&OperationOptions> {
        self.options.as_ref()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress
    }

    pub fn result_artifact(&self) -> Option<&ResultArtifact> {
        self.artifact.as_ref()
    }

    pub fn failure(&self) -> Option<&RunError> {
        self.failure.as_ref()
    }

    /// Raise progress; lower values are ignored
    pub(crate) fn advance(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(PROGRESS_DONE));
    }

    pub(crate) fn succeed(&mut self, artifact: ResultArtifact) {
        self.phase = RunPhase::Succeeded;
        self.artifact = Some(artifact);
        self.failure = None;
        self.advance(PROGRESS_DONE);
    }

    pub(crate) fn fail(&mut self, error: RunError) {
        self.phase = RunPhase::Failed;
        self.artifact = None;
        self.failure = Some(error);
        self.advance(PROGRESS_DONE);
    }

    /// Back to Idle, keeping inputs and options
    pub(crate) fn clear(&mut self) {
        self.phase = RunPhase::Idle;
        self.progress = 0;
        self.artifact = None;
        self.failure = None;
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            kind: self.kind,
            phase: self.phase,
            progress_percent: self.progress,
            result_artifact: self.artifact.clone(),
            failure_reason: self.failure.as_ref().map(|e| e.to_string()),
            failure_category: self.failure.as_ref().map(RunError::category),
            input_ids: self.inputs.iter().map(|f| f.id()).collect(),
        }
    }
}

/// Cloneable view of a run for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub kind: OperationKind,
    pub phase: RunPhase,
    pub progress_percent: u8,
    pub result_artifact: Option<ResultArtifact>,
    pub failure_reason: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub input_ids: Vec<FileId>,
}

/// Delivered to the progress callback on every phase or milestone change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub phase: RunPhase,
    pub percent: u8,
    pub message: String,
}
