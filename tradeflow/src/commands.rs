//! Implementations behind the `tradeflow` subcommands.
//!
//! Results go to stdout as JSON; logs and progress lines go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tradeflow_recovery::{recover_array, recover_object, Expect, Stage};
use tradeflow_retry::{AdminRetryConfig, ChannelSink, ProgressReporter, RetryConfigCache};

use crate::assistant::Assistant;
use crate::config::AppConfig;
use crate::errors::Error;

/// Outcome of running the recovery chain over one reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoverReport {
    /// Recovered array or object; empty when nothing could be salvaged.
    pub value: Value,
    /// Stage that produced `value`.
    pub stage: Option<Stage>,
}

/// Runs the recovery chain for `expect` over `text`.
#[must_use]
pub fn recover_text(text: &str, expect: Expect) -> RecoverReport {
    match expect {
        Expect::Array => {
            let recovered = recover_array(text);
            RecoverReport {
                value: Value::Array(recovered.value),
                stage: recovered.stage,
            }
        }
        Expect::Object => {
            let recovered = recover_object(text);
            RecoverReport {
                value: Value::Object(recovered.value),
                stage: recovered.stage,
            }
        }
    }
}

/// Reads `input` (stdin when `None`) and prints the recovered JSON.
pub fn recover(input: Option<&Path>, expect: Expect) -> Result<(), Error> {
    let text = read_input(input)?;
    let report = recover_text(&text, expect);
    match report.stage {
        Some(stage) => tracing::info!(%stage, "reply recovered"),
        None => tracing::warn!("nothing could be recovered"),
    }
    println!("{}", serde_json::to_string_pretty(&report.value)?);
    Ok(())
}

/// Renders the effective admin retry config as YAML, headed by its source.
pub fn render_retry_config(cache: &RetryConfigCache) -> anyhow::Result<String> {
    let source = cache
        .path()
        .map_or_else(|| "built-in defaults".to_owned(), |p| p.display().to_string());
    let body = serde_yaml::to_string(&*cache.get()).context("could not render retry config")?;
    Ok(format!("# source: {source}\n{body}"))
}

/// Prints the admin retry config in effect.
pub fn config_show(config: &AppConfig) -> Result<(), Error> {
    print!("{}", render_retry_config(&config.retry_cache())?);
    Ok(())
}

/// Writes a default admin retry config to `path`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn config_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    AdminRetryConfig::default()
        .save(path)
        .with_context(|| format!("could not write {}", path.display()))?;
    println!("[SUCCESS] Wrote default retry config to {}", path.display());
    Ok(())
}

/// Where `config init` writes when no path is given.
pub fn default_config_path(config: &AppConfig) -> anyhow::Result<PathBuf> {
    config
        .retry_config_path
        .clone()
        .context("could not determine a config directory; pass --path")
}

/// Options for the `generate` subcommand.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Generate one object instead of a list of records.
    pub object: bool,
    /// JSON Schema file every record (or the object) must satisfy.
    pub schema: Option<PathBuf>,
}

/// Runs one generation call and prints the value with its metrics.
pub async fn generate(config: AppConfig, options: &GenerateOptions) -> Result<(), Error> {
    let schema = options
        .schema
        .as_deref()
        .map(read_schema)
        .transpose()?;

    let (progress, printer) = progress_printer();
    let output = {
        let assistant = Assistant::new(config).with_progress(progress);
        let mut generator = assistant.generator()?;
        if let Some(schema) = schema {
            generator = generator.with_schema(schema)?;
        }
        if options.object {
            let generated = generator.generate_object(&options.system, &options.prompt).await?;
            json!({ "value": generated.value, "metrics": generated.metrics })
        } else {
            let generated = generator.generate_records(&options.system, &options.prompt).await?;
            json!({ "value": generated.value, "metrics": generated.metrics })
        }
    };
    finish_progress(printer).await;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Runs one document through OCR and prints the result.
pub async fn ocr(
    config: AppConfig,
    document: &Path,
    pages_estimate: u32,
    high_quality: bool,
) -> Result<(), Error> {
    let bytes = tokio::fs::read(document)
        .await
        .with_context(|| format!("could not read {}", document.display()))?;

    let (progress, printer) = progress_printer();
    let result = {
        let assistant = Assistant::new(config).with_progress(progress);
        assistant
            .ocr_pipeline()?
            .process(&bytes, pages_estimate, high_quality)
            .await
    };
    finish_progress(printer).await;

    if let Some(error) = &result.error {
        tracing::warn!(outcome = ?result.outcome, error, "OCR did not succeed");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("could not read stdin")?;
            Ok(text)
        }
    }
}

fn read_schema(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read schema {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// A reporter under a fresh client id whose events are printed to stderr.
///
/// The printer task ends once every clone of the reporter is dropped.
fn progress_printer() -> (ProgressReporter, JoinHandle<()>) {
    let (sink, receiver) = ChannelSink::new();
    let client_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(%client_id, "progress session started");
    let printer = tokio::spawn(async move {
        let mut events = UnboundedReceiverStream::new(receiver);
        while let Some((_client, event)) = events.next().await {
            eprintln!(
                "[{:>3}%] {}: {}",
                event.progress_percent, event.stage, event.message
            );
        }
    });
    (ProgressReporter::new(Arc::new(sink), client_id), printer)
}

async fn finish_progress(printer: JoinHandle<()>) {
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "progress printer stopped");
    }
}
