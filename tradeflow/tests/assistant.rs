//! Components built by the assistant follow the admin retry file.

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tradeflow::commands::{config_init, recover_text, render_retry_config};
use tradeflow::prelude::*;
use tradeflow_llm::{Completion, CompletionRequest, LlmError};
use tradeflow_ocr::{OcrError, OcrOutcome, OperationStatus, PollResponse, TimeoutBudget};

#[derive(Default)]
struct AlwaysBusy {
    calls: Mutex<u32>,
}

#[async_trait]
impl CompletionBackend for AlwaysBusy {
    fn name(&self) -> &'static str {
        "busy"
    }

    fn model(&self) -> &str {
        "busy-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
        *self.calls.lock().unwrap() += 1;
        Err(LlmError::Status {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

#[derive(Default)]
struct Unavailable {
    submits: Mutex<u32>,
}

#[async_trait]
impl OcrService for Unavailable {
    async fn submit(&self, _document: &[u8]) -> Result<String, OcrError> {
        *self.submits.lock().unwrap() += 1;
        Err(OcrError::Status {
            status: 502,
            body: String::new(),
        })
    }

    async fn poll(&self, _operation_id: &str) -> Result<PollResponse, OcrError> {
        Ok(PollResponse {
            status: OperationStatus::Running,
            lines: Vec::new(),
        })
    }
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("retry.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

fn assistant(path: &std::path::Path) -> Assistant {
    Assistant::new(AppConfig::default().with_retry_config_path(path))
}

#[tokio::test(start_paused = true)]
async fn generator_uses_admin_attempt_count() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "max_retries: 4\nretry_delay_seconds: 1\njitter: false\n");
    let backend = Arc::new(AlwaysBusy::default());

    let err = assistant(&path)
        .generator_on(backend.clone())
        .generate_records("Extract.", "records")
        .await
        .unwrap_err();

    assert!(matches!(err, tradeflow_llm::GenerationError::Backend { .. }));
    assert_eq!(*backend.calls.lock().unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn reload_applies_to_components_built_afterwards() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "max_retries: 2\nretry_delay_seconds: 0\n");
    let assistant = assistant(&path);
    assert_eq!(assistant.retry_config().max_retries, 2);

    fs::write(&path, "retry_on_failure: false\n").unwrap();
    assert!(!assistant.reload_retry_config().retry_on_failure);

    let backend = Arc::new(AlwaysBusy::default());
    let _ = assistant
        .generator_on(backend.clone())
        .generate_records("Extract.", "records")
        .await;
    assert_eq!(*backend.calls.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn ocr_pipeline_retries_submission_under_admin_policy() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "max_retries: 3\nretry_delay_seconds: 0.5\njitter: false\n");
    let config = AppConfig::default()
        .with_retry_config_path(&path)
        .with_ocr_budget(TimeoutBudget::new(Duration::from_secs(5), Duration::ZERO));
    let service = Arc::new(Unavailable::default());

    let result = Assistant::new(config)
        .ocr_pipeline_on(service.clone())
        .process(b"%PDF", 1, false)
        .await;

    assert_eq!(result.outcome, OcrOutcome::Errored);
    assert_eq!(*service.submits.lock().unwrap(), 3);
}

#[test]
fn missing_provider_is_a_config_error() {
    let config = AppConfig::from_lookup(|_| None);
    let err = Assistant::new(config).generator().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn config_init_writes_defaults_and_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("retry.yaml");

    config_init(&path, false).unwrap();
    let loaded = AdminRetryConfig::try_load(&path).unwrap();
    assert_eq!(loaded, AdminRetryConfig::default());

    let err = config_init(&path, false).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    config_init(&path, true).unwrap();

    let rendered = render_retry_config(&RetryConfigCache::open(Some(path.clone()))).unwrap();
    assert!(rendered.starts_with(&format!("# source: {}", path.display())));
}

#[test]
fn recover_text_handles_cut_off_reply() {
    let report = recover_text("[{\"lc\":\"LC-1\"},{\"lc\":\"LC-2\"},{\"lc\":", Expect::Array);
    assert_eq!(report.value.as_array().unwrap().len(), 2);
    assert!(report.stage.unwrap().suggests_truncation());
}
