//! Record generation against a scripted backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tradeflow_llm::generation::{estimate_tokens, GenerationConfig};
use tradeflow_llm::{
    Completion, CompletionBackend, CompletionRequest, FinishReason, GenerationError, LlmError,
    RecordGenerator,
};
use tradeflow_recovery::Stage;
use tradeflow_retry::{AdminRetryConfig, ChannelSink, ProgressReporter, RetryPolicy};

/// Replays canned replies and records every request it receives.
#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Scripted {
    fn new(replies: Vec<Result<Completion, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn last_user_prompt(&self) -> String {
        let requests = self.requests();
        requests.last().unwrap().messages.last().unwrap().content.clone()
    }
}

#[async_trait]
impl CompletionBackend for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::text("")))
    }
}

fn ok(text: &str) -> Result<Completion, LlmError> {
    Ok(Completion::text(text))
}

fn cut_off(text: &str) -> Result<Completion, LlmError> {
    Ok(Completion {
        content: text.to_owned(),
        finish_reason: Some(FinishReason::Length),
    })
}

fn status(code: u16) -> Result<Completion, LlmError> {
    Err(LlmError::Status {
        status: code,
        body: "error".into(),
    })
}

fn generator(backend: &Arc<Scripted>, config: GenerationConfig) -> RecordGenerator {
    RecordGenerator::with_config(backend.clone(), config)
        .with_completion_policy(RetryPolicy::new(3, Duration::from_millis(100)).with_jitter(false))
}

#[tokio::test(start_paused = true)]
async fn markdown_reply_with_trailing_comma_is_accepted_first_time() {
    let backend = Scripted::new(vec![ok(
        "Here is your data:\n```json\n[{\"a\":1},{\"a\":2},]\n```",
    )]);
    let generated = generator(&backend, GenerationConfig::default())
        .generate_records("Extract.", "two records")
        .await
        .unwrap();

    assert_eq!(generated.value, vec![json!({"a": 1}), json!({"a": 2})]);
    assert_eq!(generated.metrics.total_attempts, 1);
    assert_eq!(generated.metrics.stage, Some(Stage::BracketRepair));
    assert_eq!(
        generated.metrics.estimated_input_tokens,
        estimate_tokens("Extract.") + estimate_tokens("two records")
    );
    assert!(!generated.metrics.partial);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_reply_triggers_feedback_attempt() {
    let backend = Scripted::new(vec![
        ok("I could not find any letters of credit."),
        ok("[{\"lc_number\": \"LC-7\"}]"),
    ]);
    let generated = generator(&backend, GenerationConfig::default())
        .generate_records("Extract.", "list LCs")
        .await
        .unwrap();

    assert_eq!(generated.value, vec![json!({"lc_number": "LC-7"})]);
    assert_eq!(generated.metrics.total_attempts, 2);
    assert_eq!(generated.metrics.stage, Some(Stage::DirectParse));

    let prompt = backend.last_user_prompt();
    assert!(prompt.starts_with("list LCs"));
    assert!(prompt.contains("Attempt 1/3"));
    assert!(prompt.contains("I could not find any letters of credit."));
}

#[tokio::test(start_paused = true)]
async fn truncated_reply_raises_token_limit() {
    let backend = Scripted::new(vec![
        cut_off("[{\"a\":1},{\"a\":2"),
        ok("[{\"a\":1},{\"a\":2}]"),
    ]);
    let config = GenerationConfig::default().with_max_tokens(2000, 8000);
    let generated = generator(&backend, config)
        .generate_records("Extract.", "records")
        .await
        .unwrap();

    assert_eq!(generated.value.len(), 2);
    assert!(!generated.metrics.partial);
    let limits: Vec<_> = backend.requests().iter().map(|r| r.max_tokens).collect();
    assert_eq!(limits, [Some(2000), Some(3000)]);
    assert_eq!(generated.metrics.final_max_tokens, 3000);
    assert!(backend.last_user_prompt().contains("cut off after 1 complete"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_truncation_returns_best_partial() {
    let backend = Scripted::new(vec![
        cut_off("[{\"a\":1},{\"a\""),
        cut_off("[{\"a\":1},{\"a\":2},{\"a\""),
        cut_off("[{\"a\":1},{\"a"),
    ]);
    let config = GenerationConfig::default().with_max_tokens(1000, 2000);
    let generated = generator(&backend, config)
        .generate_records("Extract.", "records")
        .await
        .unwrap();

    assert_eq!(generated.value, vec![json!({"a": 1}), json!({"a": 2})]);
    assert!(generated.metrics.partial);
    assert_eq!(generated.metrics.total_attempts, 3);
    let limits: Vec<_> = backend.requests().iter().map(|r| r.max_tokens).collect();
    assert_eq!(limits, [Some(1000), Some(1500), Some(2000)]);
}

#[tokio::test(start_paused = true)]
async fn schema_failures_without_partials_exhaust_attempts() {
    let backend = Scripted::new(vec![
        ok("[{\"amount\": \"ten\"}]"),
        ok("[{\"amount\": -1}]"),
    ]);
    let schema = json!({
        "type": "object",
        "properties": {"amount": {"type": "number", "minimum": 0}},
        "required": ["amount"]
    });
    let config = GenerationConfig::default()
        .with_max_attempts(2)
        .with_partial_results(false);
    let err = generator(&backend, config)
        .with_schema(schema)
        .unwrap()
        .generate_records("Extract.", "amounts")
        .await
        .unwrap_err();

    match err {
        GenerationError::MaxRetriesExceeded {
            attempts,
            history,
            raw_output,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(history.len(), 2);
            assert!(history[0].errors[0].starts_with("record 0:"));
            assert_eq!(raw_output, "[{\"amount\": -1}]");
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
    assert!(backend.last_user_prompt().contains("Expected schema:"));
}

#[tokio::test(start_paused = true)]
async fn invalid_records_are_dropped_from_partial_result() {
    let backend = Scripted::new(vec![ok("[{\"amount\": 5}, {\"amount\": \"x\"}]")]);
    let schema = json!({"type": "object", "properties": {"amount": {"type": "number"}}});
    let config = GenerationConfig::default().with_max_attempts(1);
    let generated = generator(&backend, config)
        .with_schema(schema)
        .unwrap()
        .generate_records("Extract.", "amounts")
        .await
        .unwrap();

    assert_eq!(generated.value, vec![json!({"amount": 5})]);
    assert!(generated.metrics.partial);
}

#[tokio::test(start_paused = true)]
async fn retry_disabled_makes_one_attempt() {
    let backend = Scripted::new(vec![ok("nothing here"), ok("[{\"a\":1}]")]);
    let admin = AdminRetryConfig {
        retry_on_failure: false,
        ..AdminRetryConfig::default()
    };
    let err = generator(&backend, GenerationConfig::from_admin(&admin))
        .generate_records("Extract.", "records")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::MaxRetriesExceeded { attempts: 1, .. }));
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_completion_errors_are_retried_within_one_attempt() {
    let backend = Scripted::new(vec![status(429), status(503), ok("[{\"a\":1}]")]);
    let generated = generator(&backend, GenerationConfig::default())
        .generate_records("Extract.", "records")
        .await
        .unwrap();

    assert_eq!(generated.metrics.total_attempts, 1);
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn completion_retries_are_reported_as_progress() {
    let backend = Scripted::new(vec![status(429), ok("[{\"a\":1}]")]);
    let (sink, mut rx) = ChannelSink::new();
    let generated = generator(&backend, GenerationConfig::default())
        .with_progress(ProgressReporter::new(Arc::new(sink), "session-9"))
        .generate_records("Extract.", "records")
        .await
        .unwrap();
    assert_eq!(generated.value.len(), 1);

    let mut retry_messages = Vec::new();
    while let Ok((_, event)) = rx.try_recv() {
        if event.stage == "llm_retry" {
            retry_messages.push(event.message);
        }
    }
    assert_eq!(retry_messages.first().map(String::as_str), Some("retry 2/3 in 0.1s"));
}

#[tokio::test(start_paused = true)]
async fn fatal_completion_error_is_returned() {
    let backend = Scripted::new(vec![status(401)]);
    let err = generator(&backend, GenerationConfig::default())
        .generate_records("Extract.", "records")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GenerationError::Backend {
            attempt: 1,
            source: LlmError::Status { status: 401, .. }
        }
    ));
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn object_generation_recovers_from_prose() {
    let backend = Scripted::new(vec![ok(
        "Sure! {\"intent\": \"lc_status\", \"confidence\": 0.9,} Hope that helps.",
    )]);
    let generated = generator(&backend, GenerationConfig::default())
        .generate_object("Classify.", "status of LC-12?")
        .await
        .unwrap();

    assert_eq!(generated.value["intent"], "lc_status");
    assert_eq!(generated.metrics.stage, Some(Stage::ObjectSpan));
}

#[tokio::test(start_paused = true)]
async fn schema_invalid_object_is_never_returned_as_partial() {
    let backend = Scripted::new(vec![ok("{\"foo\": 1}"), ok("{\"foo\": 2}")]);
    let schema = json!({
        "type": "object",
        "properties": {"intent": {"type": "string"}},
        "required": ["intent"]
    });
    let config = GenerationConfig::default().with_max_attempts(2);
    let err = generator(&backend, config)
        .with_schema(schema)
        .unwrap()
        .generate_object("Classify.", "status of LC-12?")
        .await
        .unwrap_err();

    match err {
        GenerationError::MaxRetriesExceeded { attempts, history, .. } => {
            assert_eq!(attempts, 2);
            assert_eq!(history[0].recovered, json!({"foo": 1}));
            assert!(!history[0].errors.is_empty());
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn typed_generation_skips_mismatched_records() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Lc {
        lc_number: String,
    }

    let backend = Scripted::new(vec![ok("[{\"lc_number\": \"LC-1\"}, {\"lc_number\": 5}]")]);
    let generated = generator(&backend, GenerationConfig::default())
        .generate_typed::<Lc>("Extract.", "records")
        .await
        .unwrap();

    assert_eq!(
        generated.value,
        vec![Lc {
            lc_number: "LC-1".into()
        }]
    );
}
