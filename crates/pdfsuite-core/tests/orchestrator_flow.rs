//! End-to-end behaviour of the orchestrator against in-memory collaborators

use async_trait::async_trait;
use pdfsuite_core::options::{RotateOptions, Rotation, UnlockOptions, WatermarkOptions};
use pdfsuite_core::storage::object_path;
use pdfsuite_core::{
    FailureCategory, InvokeError, InvokePayload, InvokeResponse, OperationKind,
    OperationOptions, Orchestrator, OrchestratorConfig, PendingFile, ProgressUpdate,
    RemoteInvoker, RunError, RunPhase, StorageAdapter, StorageError, StoredFile,
    TransitionError, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================
// Fake collaborators
// ============================================================

#[derive(Default)]
struct FakeStorage {
    attempts: AtomicUsize,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    completed: Mutex<Vec<String>>,
    /// When set, the upload of this file waits for `release`
    gated: Option<String>,
    entered: Notify,
    release: Notify,
}

impl FakeStorage {
    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageAdapter for FakeStorage {
    async fn upload(&self, file: &PendingFile, folder: &str) -> Result<StoredFile, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.gated.as_deref() == Some(file.name()) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if let Some(delay) = self.delays.get(file.name()) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.lock().unwrap().push(file.name().to_string());
        if let Some(cause) = self.failures.get(file.name()) {
            return Err(StorageError::Rejected(cause.clone()));
        }
        let file_path = object_path(file, folder);
        Ok(StoredFile {
            public_url: format!("https://files.test/{}", file_path),
            file_path,
        })
    }
}

enum Reply {
    Respond(InvokeResponse),
    Transport(String),
    Hang,
}

struct FakeInvoker {
    reply: Reply,
    calls: Mutex<Vec<InvokePayload>>,
}

impl FakeInvoker {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<InvokePayload> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteInvoker for FakeInvoker {
    async fn invoke(
        &self,
        _kind: OperationKind,
        payload: &InvokePayload,
    ) -> Result<InvokeResponse, InvokeError> {
        self.calls.lock().unwrap().push(payload.clone());
        match &self.reply {
            Reply::Respond(response) => Ok(response.clone()),
            Reply::Transport(message) => Err(InvokeError::Transport(message.clone())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(InvokeResponse::succeeded("https://late.test/r.pdf"))
            }
        }
    }
}

fn pdf(name: &str) -> Arc<PendingFile> {
    Arc::new(PendingFile::new(name, "application/pdf", b"%PDF-1.7 test".to_vec()).unwrap())
}

fn ok_reply() -> Reply {
    Reply::Respond(InvokeResponse::succeeded("https://results.test/out.pdf"))
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    storage: Arc<FakeStorage>,
    invoker: Arc<FakeInvoker>,
    updates: Arc<Mutex<Vec<ProgressUpdate>>>,
}

fn harness(kind: OperationKind, storage: FakeStorage, reply: Reply) -> Harness {
    harness_with_config(kind, storage, reply, OrchestratorConfig::default())
}

fn harness_with_config(
    kind: OperationKind,
    storage: FakeStorage,
    reply: Reply,
    config: OrchestratorConfig,
) -> Harness {
    let storage = Arc::new(storage);
    let invoker = Arc::new(FakeInvoker::new(reply));
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let orchestrator = Orchestrator::new(kind, storage.clone(), invoker.clone())
        .with_config(config)
        .with_progress_callback(move |update| sink.lock().unwrap().push(update.clone()));
    Harness {
        orchestrator: Arc::new(orchestrator),
        storage,
        invoker,
        updates,
    }
}

impl Harness {
    fn percents(&self) -> Vec<u8> {
        self.updates.lock().unwrap().iter().map(|u| u.percent).collect()
    }

    fn phases(&self) -> Vec<RunPhase> {
        self.updates.lock().unwrap().iter().map(|u| u.phase).collect()
    }
}

// ============================================================
// Validation
// ============================================================

#[tokio::test]
async fn no_inputs_fails_before_any_upload_for_every_kind() {
    for kind in OperationKind::ALL {
        let h = harness(kind, FakeStorage::default(), ok_reply());
        let snapshot = h.orchestrator.start().await.unwrap();

        assert_eq!(snapshot.phase, RunPhase::Failed, "{}", kind);
        assert_eq!(snapshot.failure_reason.as_deref(), Some("No files selected"));
        assert_eq!(snapshot.failure_category, Some(FailureCategory::InvalidInput));
        assert_eq!(h.storage.attempts(), 0);
        assert!(h.invoker.calls().is_empty());
    }
}

#[tokio::test]
async fn merge_needs_two_inputs() {
    let h = harness(OperationKind::Merge, FakeStorage::default(), ok_reply());
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();
    h.orchestrator.start().await.unwrap();

    let run_error = format!(
        "{}",
        RunError::from(ValidationError::TooFewInputs {
            kind: OperationKind::Merge,
            min: 2,
            actual: 1
        })
    );
    assert_eq!(h.orchestrator.snapshot().failure_reason, Some(run_error));
    assert_eq!(h.storage.attempts(), 0);

    h.orchestrator.reset().unwrap();
    h.orchestrator.add_input(pdf("b.pdf")).unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(h.storage.attempts(), 2);
}

#[tokio::test]
async fn unsupported_type_blocks_every_upload() {
    let text = Arc::new(PendingFile::new("notes.txt", "text/plain", b"hello".to_vec()).unwrap());

    let h = harness(OperationKind::Rotate, FakeStorage::default(), ok_reply());
    h.orchestrator.set_inputs(vec![text.clone()]).unwrap();
    h.orchestrator
        .set_options(OperationOptions::Rotate(RotateOptions {
            degrees_by_page: BTreeMap::from([(1, Rotation::Clockwise90)]),
        }))
        .unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert!(snapshot.failure_reason.unwrap().contains("notes.txt"));
    assert_eq!(h.storage.attempts(), 0);

    let h = harness(OperationKind::Merge, FakeStorage::default(), ok_reply());
    h.orchestrator
        .set_inputs(vec![pdf("a.pdf"), text, pdf("c.pdf")])
        .unwrap();
    h.orchestrator.start().await.unwrap();
    assert_eq!(h.orchestrator.snapshot().phase, RunPhase::Failed);
    assert_eq!(h.storage.attempts(), 0);
}

#[tokio::test]
async fn oversized_input_fails_before_upload() {
    let big = Arc::new(
        PendingFile::new("big.pdf", "application/pdf", vec![0u8; 11 * 1024 * 1024]).unwrap(),
    );
    let h = harness(OperationKind::Compress, FakeStorage::default(), ok_reply());
    h.orchestrator.set_inputs(vec![big]).unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();

    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(
        snapshot.failure_reason.as_deref(),
        Some("big.pdf exceeds the 10 MB size limit")
    );
    assert_eq!(h.storage.attempts(), 0);
    assert_eq!(h.percents(), vec![0, 100]);
}

// ============================================================
// Uploading
// ============================================================

#[tokio::test(start_paused = true)]
async fn payload_keeps_input_order_when_uploads_finish_out_of_order() {
    let storage = FakeStorage {
        delays: HashMap::from([
            ("A.pdf".to_string(), Duration::from_millis(20)),
            ("B.pdf".to_string(), Duration::from_millis(40)),
            ("C.pdf".to_string(), Duration::from_millis(0)),
        ]),
        ..FakeStorage::default()
    };
    let h = harness(OperationKind::Merge, storage, ok_reply());
    let inputs = vec![pdf("A.pdf"), pdf("B.pdf"), pdf("C.pdf")];
    h.orchestrator.set_inputs(inputs.clone()).unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(h.storage.completed(), vec!["C.pdf", "A.pdf", "B.pdf"]);

    let calls = h.invoker.calls();
    assert_eq!(calls.len(), 1);
    let expected: Vec<String> = inputs.iter().map(|f| object_path(f, "merge")).collect();
    assert_eq!(calls[0].file_paths, expected);
    assert_eq!(calls[0].operation, OperationKind::Merge);
}

#[tokio::test(start_paused = true)]
async fn one_failed_upload_fails_the_run_without_invoking() {
    let storage = FakeStorage {
        delays: HashMap::from([("C.pdf".to_string(), Duration::from_millis(50))]),
        failures: HashMap::from([("B.pdf".to_string(), "quota exceeded".to_string())]),
        ..FakeStorage::default()
    };
    let h = harness(OperationKind::Merge, storage, ok_reply());
    h.orchestrator
        .set_inputs(vec![pdf("A.pdf"), pdf("B.pdf"), pdf("C.pdf")])
        .unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(snapshot.failure_category, Some(FailureCategory::Upload));
    let reason = snapshot.failure_reason.unwrap();
    assert!(reason.contains("B.pdf"));
    assert!(reason.contains("quota exceeded"));
    assert!(!reason.contains("A.pdf"));

    // Every upload settled before the run failed
    assert_eq!(h.storage.completed().len(), 3);
    assert!(h.invoker.calls().is_empty());
    assert!(snapshot.result_artifact.is_none());
}

#[tokio::test]
async fn upload_folder_can_be_overridden() {
    let config = OrchestratorConfig {
        upload_folder: Some("inbox".to_string()),
        ..OrchestratorConfig::default()
    };
    let h = harness_with_config(OperationKind::Compress, FakeStorage::default(), ok_reply(), config);
    let file = pdf("a.pdf");
    h.orchestrator.set_inputs(vec![file.clone()]).unwrap();
    h.orchestrator.start().await.unwrap();
    assert_eq!(h.invoker.calls()[0].file_paths, vec![object_path(&file, "inbox")]);
}

#[tokio::test]
async fn watermark_image_is_uploaded_and_referenced() {
    let h = harness(OperationKind::Watermark, FakeStorage::default(), ok_reply());
    let input = pdf("doc.pdf");
    let logo = Arc::new(PendingFile::new("logo.png", "image/png", vec![1, 2, 3]).unwrap());
    h.orchestrator.set_inputs(vec![input.clone()]).unwrap();
    h.orchestrator
        .set_options(OperationOptions::Watermark(WatermarkOptions::image(logo.clone())))
        .unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(h.storage.attempts(), 2);

    let call = &h.invoker.calls()[0];
    assert_eq!(call.file_paths, vec![object_path(&input, "watermark")]);
    assert_eq!(call.options["kind"], json!("image"));
    assert_eq!(call.options["imageRef"], json!(object_path(&logo, "watermark")));
}

// ============================================================
// Invoking
// ============================================================

#[tokio::test]
async fn remote_failure_message_is_kept_verbatim() {
    let h = harness(
        OperationKind::Unlock,
        FakeStorage::default(),
        Reply::Respond(InvokeResponse::failed("bad password")),
    );
    h.orchestrator.set_inputs(vec![pdf("locked.pdf")]).unwrap();
    h.orchestrator
        .set_options(OperationOptions::Unlock(UnlockOptions {
            password: "guess".to_string(),
        }))
        .unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(snapshot.failure_reason.as_deref(), Some("bad password"));
    assert_eq!(snapshot.failure_category, Some(FailureCategory::Processing));
    assert!(snapshot.result_artifact.is_none());
    assert_eq!(snapshot.progress_percent, 100);
    assert_eq!(h.invoker.calls()[0].options, json!({ "password": "guess" }));
}

#[tokio::test]
async fn transport_error_fails_like_a_remote_error() {
    let h = harness(
        OperationKind::Compress,
        FakeStorage::default(),
        Reply::Transport("connection refused".to_string()),
    );
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();

    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(
        snapshot.failure_reason.as_deref(),
        Some("Remote call failed: connection refused")
    );
    assert_eq!(snapshot.failure_category, Some(FailureCategory::Processing));
}

#[tokio::test(start_paused = true)]
async fn invoke_timeout_fails_the_run() {
    let config = OrchestratorConfig {
        invoke_timeout: Duration::from_millis(500),
        ..OrchestratorConfig::default()
    };
    let h = harness_with_config(OperationKind::Compress, FakeStorage::default(), Reply::Hang, config);
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert!(snapshot.failure_reason.unwrap().contains("timed out"));
}

#[tokio::test]
async fn success_without_url_is_an_invalid_response() {
    let h = harness(
        OperationKind::Compress,
        FakeStorage::default(),
        Reply::Respond(InvokeResponse {
            success: true,
            ..InvokeResponse::default()
        }),
    );
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();

    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(
        snapshot.failure_reason,
        Some(RunError::InvalidResponse.to_string())
    );
}

// ============================================================
// Lifecycle
// ============================================================

#[tokio::test]
async fn success_then_reset_then_start_begins_at_zero() {
    let h = harness(OperationKind::Compress, FakeStorage::default(), ok_reply());
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();

    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(
        snapshot.result_artifact.unwrap().url(),
        "https://results.test/out.pdf"
    );
    assert_eq!(h.percents(), vec![0, 10, 30, 90, 100]);
    assert_eq!(
        h.phases(),
        vec![
            RunPhase::Validating,
            RunPhase::Uploading,
            RunPhase::Invoking,
            RunPhase::Invoking,
            RunPhase::Succeeded
        ]
    );

    h.orchestrator.reset().unwrap();
    let idle = h.orchestrator.snapshot();
    assert_eq!(idle.phase, RunPhase::Idle);
    assert_eq!(idle.progress_percent, 0);
    assert!(idle.result_artifact.is_none());

    h.updates.lock().unwrap().clear();
    h.orchestrator.start().await.unwrap();
    assert_eq!(h.percents().first(), Some(&0));
    assert_eq!(h.storage.attempts(), 2);
}

#[tokio::test]
async fn start_while_uploading_is_rejected() {
    let storage = FakeStorage {
        gated: Some("a.pdf".to_string()),
        ..FakeStorage::default()
    };
    let h = harness(OperationKind::Compress, storage, ok_reply());
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();

    let running = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    h.storage.entered.notified().await;
    assert_eq!(h.orchestrator.snapshot().phase, RunPhase::Uploading);

    assert_eq!(
        h.orchestrator.start().await.unwrap_err(),
        TransitionError::AlreadyRunning(RunPhase::Uploading)
    );
    assert_eq!(
        h.orchestrator.set_inputs(vec![]).unwrap_err(),
        TransitionError::AlreadyRunning(RunPhase::Uploading)
    );
    assert_eq!(
        h.orchestrator.reset().unwrap_err(),
        TransitionError::NotFinished(RunPhase::Uploading)
    );

    h.storage.release.notify_one();
    let snapshot = running.await.unwrap().unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(h.storage.attempts(), 1);
    assert_eq!(h.invoker.calls().len(), 1);
}

#[tokio::test]
async fn dropped_start_fails_the_run_and_allows_a_restart() {
    let storage = FakeStorage {
        gated: Some("a.pdf".to_string()),
        ..FakeStorage::default()
    };
    let h = harness(OperationKind::Compress, storage, ok_reply());
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();

    // Give up on the run while its upload is still pending
    tokio::select! {
        _ = h.orchestrator.start() => panic!("the gated upload cannot finish"),
        _ = h.storage.entered.notified() => {}
    }

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(snapshot.progress_percent, 100);
    assert_eq!(snapshot.failure_category, Some(FailureCategory::Processing));
    assert_eq!(
        snapshot.failure_reason.as_deref(),
        Some("compress was abandoned before it finished")
    );
    assert_eq!(h.percents().last(), Some(&100));
    assert!(h.invoker.calls().is_empty());

    h.orchestrator.reset().unwrap();
    h.storage.release.notify_one();
    let snapshot = h.orchestrator.start().await.unwrap();
    assert_eq!(snapshot.phase, RunPhase::Succeeded);
    assert_eq!(h.storage.attempts(), 2);
    assert_eq!(h.invoker.calls().len(), 1);
}

#[tokio::test]
async fn options_are_required_where_there_are_no_defaults() {
    let h = harness(OperationKind::Rotate, FakeStorage::default(), ok_reply());
    h.orchestrator.set_inputs(vec![pdf("a.pdf")]).unwrap();
    let snapshot = h.orchestrator.start().await.unwrap();

    assert_eq!(snapshot.phase, RunPhase::Failed);
    assert_eq!(
        snapshot.failure_reason.as_deref(),
        Some("Invalid options: rotate needs options")
    );
    assert_eq!(h.storage.attempts(), 0);
}
