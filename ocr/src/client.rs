//! OCR service seam and the Azure Computer Vision Read client.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::OcrError;
use crate::types::{OperationStatus, PollResponse, TextLine};

/// Longest error body kept in [`OcrError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// An asynchronous OCR service: submit once, then poll until done.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Submits a document and returns the operation handle.
    async fn submit(&self, document: &[u8]) -> Result<String, OcrError>;

    /// Queries the status (and, once finished, the results) of an operation.
    async fn poll(&self, operation_id: &str) -> Result<PollResponse, OcrError>;
}

/// Azure Computer Vision endpoint and key.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureVisionSettings {
    /// Resource endpoint, e.g. `https://name.cognitiveservices.azure.com`.
    pub endpoint: String,
    /// Subscription key.
    pub api_key: String,
}

impl fmt::Debug for AzureVisionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureVisionSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .finish()
    }
}

impl AzureVisionSettings {
    /// Reads `AZURE_VISION_ENDPOINT` and `AZURE_VISION_KEY` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OcrError> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| OcrError::Config(format!("{key} is not set")))
        };
        Ok(Self {
            endpoint: require("AZURE_VISION_ENDPOINT")?,
            api_key: require("AZURE_VISION_KEY")?,
        })
    }

    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, OcrError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Client for the Read API v3.2.
#[derive(Debug, Clone)]
pub struct AzureReadClient {
    client: reqwest::Client,
    settings: AzureVisionSettings,
}

impl AzureReadClient {
    /// Creates a client over an existing HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, settings: AzureVisionSettings) -> Self {
        Self { client, settings }
    }

    /// Submission URL.
    #[must_use]
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/vision/v3.2/read/analyze",
            self.settings.endpoint.trim_end_matches('/')
        )
    }
}

async fn error_for(response: reqwest::Response) -> OcrError {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
        body.truncate(idx);
    }
    OcrError::Status { status, body }
}

#[async_trait]
impl OcrService for AzureReadClient {
    async fn submit(&self, document: &[u8]) -> Result<String, OcrError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.settings.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(document.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for(response).await);
        }
        let location = response
            .headers()
            .get("Operation-Location")
            .and_then(|value| value.to_str().ok())
            .ok_or(OcrError::MissingOperationLocation)?;
        tracing::debug!(bytes = document.len(), "OCR document submitted");
        Ok(location.to_owned())
    }

    async fn poll(&self, operation_id: &str) -> Result<PollResponse, OcrError> {
        let response = self
            .client
            .get(operation_id)
            .header("Ocp-Apim-Subscription-Key", &self.settings.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for(response).await);
        }
        let body = response.text().await?;
        parse_read_result(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadPage>,
}

#[derive(Debug, Deserialize)]
struct ReadPage {
    page: u32,
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadLine {
    text: String,
    #[serde(default)]
    bounding_box: Vec<f64>,
    #[serde(default)]
    words: Vec<ReadWord>,
}

#[derive(Debug, Deserialize)]
struct ReadWord {
    confidence: f64,
}

impl ReadLine {
    fn into_text_line(self, page: u32) -> TextLine {
        let confidence = if self.words.is_empty() {
            0.0
        } else {
            self.words.iter().map(|w| w.confidence).sum::<f64>() / self.words.len() as f64
        };
        TextLine {
            text: self.text,
            bounding_box: self.bounding_box,
            bounding_page: page,
            confidence,
        }
    }
}

/// Decodes a Read API operation body.
pub fn parse_read_result(body: &str) -> Result<PollResponse, OcrError> {
    let operation: ReadOperation =
        serde_json::from_str(body).map_err(|e| OcrError::Decode(e.to_string()))?;
    let lines = operation
        .analyze_result
        .map(|result| {
            result
                .read_results
                .into_iter()
                .flat_map(|page| {
                    let number = page.page;
                    page.lines.into_iter().map(move |line| line.into_text_line(number))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(PollResponse {
        status: operation.status,
        lines,
    })
}
