//! OpenAI-compatible chat completion wire format.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::types::{ChatMessage, Completion, CompletionRequest, FinishReason};

/// Longest error body kept in [`LlmError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
pub(crate) struct ChatBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatBody<'a> {
    /// Body for `request`, naming `model` only when the endpoint expects it.
    pub(crate) fn new(request: &'a CompletionRequest, model: Option<&'a str>) -> Self {
        Self {
            model: request.model.as_deref().or(model),
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    /// Body for endpoints that route by URL and take no model name.
    pub(crate) fn without_model(request: &'a CompletionRequest) -> Self {
        Self {
            model: None,
            ..Self::new(request, None)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Decodes a chat completion body into the first choice.
pub(crate) fn decode_completion(body: &str) -> Result<Completion, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;
    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })
}

fn truncate_body(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
        body.truncate(idx);
        body.push_str("...");
    }
    body
}

/// Sends `body` and turns the response into a [`Completion`] or a classified error.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    body: &ChatBody<'_>,
) -> Result<Completion, LlmError> {
    let response = request.json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        });
    }
    let text = response.text().await?;
    decode_completion(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_first_choice() {
        let completion = decode_completion(
            r#"{"choices":[{"message":{"role":"assistant","content":"[{\"a\":1}]"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(completion.content, r#"[{"a":1}]"#);
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_decode_truncated_reply() {
        let completion = decode_completion(
            r#"{"choices":[{"message":{"content":"[{\"a\":1},{\"a\""},"finish_reason":"length"}]}"#,
        )
        .unwrap();
        assert!(completion.hit_token_limit());
    }

    #[test]
    fn test_null_content_is_empty() {
        let completion =
            decode_completion(r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#)
                .unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.finish_reason, Some(FinishReason::ContentFilter));
    }

    #[test]
    fn test_no_choices() {
        assert!(matches!(decode_completion(r#"{"choices":[]}"#), Err(LlmError::EmptyResponse)));
        assert!(matches!(decode_completion("<html>"), Err(LlmError::Decode(_))));
    }

    #[test]
    fn test_body_model_override() {
        let request = CompletionRequest::prompt("s", "u").with_max_tokens(100);
        let body = serde_json::to_value(ChatBody::new(&request, Some("gpt-4o-mini"))).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 100);

        let request = request.with_model("gpt-4o");
        let body = serde_json::to_value(ChatBody::new(&request, None)).unwrap();
        assert_eq!(body["model"], "gpt-4o");

        let body = serde_json::to_value(ChatBody::without_model(&request)).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_error_body_truncated() {
        let body = truncate_body("é".repeat(2000));
        assert_eq!(body.chars().count(), MAX_ERROR_BODY + 3);
    }
}
