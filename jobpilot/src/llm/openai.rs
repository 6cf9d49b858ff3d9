//! Chat-completions client for the form-step oracle.
//!
//! One request per step: the screenshot travels as a `data:` image part and
//! the reply must be a single JSON action, so JSON mode is on by default.

use super::{check_status, CompletionOptions, CompletionResponse, LLMProvider, Message, TokenUsage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Vision chat-completions provider (OpenAI or any compatible endpoint).
///
/// ```ignore
/// use jobpilot::{ActionOracle, OpenAIProvider};
/// use std::sync::Arc;
///
/// let oracle = ActionOracle::new(Arc::new(OpenAIProvider::new(key, "gpt-4o")));
/// let decision = oracle.decide(&screenshot_png, &profile, &job).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAIProvider {
    /// Provider against the public API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: model.into(),
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Change the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request<'a>(&'a self, messages: &'a [Message], options: &CompletionOptions) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ChatCompletion {
    /// The action text of the first choice. A refusal (the model declining to
    /// act on a screenshot) is an error so the step aborts cleanly.
    fn into_response(self) -> Result<CompletionResponse> {
        let usage = self.usage.unwrap_or_default();
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(Error::MissingField("choices[0]"))?;

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
            return Err(Error::Llm(format!("model refused the step: {}", refusal)));
        }
        if choice.finish_reason.as_deref() == Some("length") {
            log::warn!("Oracle reply hit the token limit; the action may be truncated");
        }

        let content = choice
            .message
            .content
            .ok_or(Error::MissingField("choices[0].message.content"))?;

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
        client: &reqwest::Client,
    ) -> Result<CompletionResponse> {
        let response = client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request(&messages, options))
            .send()
            .await?;
        let response = check_status(response).await?;

        let completion: ChatCompletion = response.json().await?;
        completion.into_response()
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completion(value: serde_json::Value) -> ChatCompletion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_openai_provider_new() {
        let provider = OpenAIProvider::new("sk-test", "gpt-4o");
        assert!(provider.is_configured());
        assert_eq!(provider.model, "gpt-4o");
        assert!(!OpenAIProvider::new("", "gpt-4o").is_configured());

        let provider = provider
            .with_api_url("https://gateway.internal/v1/chat/completions")
            .with_model("gpt-4o-mini");
        assert_eq!(provider.api_url, "https://gateway.internal/v1/chat/completions");
        assert_eq!(provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_request_carries_screenshot_and_json_mode() {
        let provider = OpenAIProvider::new("sk-test", "gpt-4o");
        let messages = vec![
            Message::system("Reply with one JSON action."),
            Message::user_with_image("Fill the form for Ada Lovelace.", "iVBORw0KGgo="),
        ];
        let body = serde_json::to_value(provider.request(&messages, &CompletionOptions::default()))
            .unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(
            body["messages"][1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,iVBORw0KGgo="
        );

        let plain = CompletionOptions {
            json_mode: false,
            ..Default::default()
        };
        let body = serde_json::to_value(provider.request(&messages, &plain)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_reply_yields_action_text_and_usage() {
        let response = completion(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"action\":\"click_button\",\"selector\":\"button:has-text(\\\"Next\\\")\",\"reasoning\":\"contact step done\"}"
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 30, "total_tokens": 1230}
        }))
        .into_response()
        .unwrap();

        assert!(response.content.contains("click_button"));
        assert_eq!(response.usage.total_tokens, 1230);
    }

    #[test]
    fn test_refusal_and_empty_replies_are_errors() {
        let refused = completion(json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]
        }))
        .into_response();
        assert!(matches!(refused, Err(Error::Llm(msg)) if msg.contains("refused")));

        let empty = completion(json!({"choices": []})).into_response();
        assert!(matches!(empty, Err(Error::MissingField("choices[0]"))));

        let no_content = completion(json!({"choices": [{"message": {}}]})).into_response();
        assert!(matches!(
            no_content,
            Err(Error::MissingField("choices[0].message.content"))
        ));
    }
}
