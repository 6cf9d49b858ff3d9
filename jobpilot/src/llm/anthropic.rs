//! Anthropic Messages API provider.

use super::{
    check_status, CompletionOptions, CompletionResponse, ContentPart, LLMProvider, Message,
    MessageContent, TokenUsage,
};
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Default Anthropic API base.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Default vision model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic LLM provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Use a custom API base (proxies, gateways).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Change the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Whether the key looks like an Anthropic key.
    pub fn has_expected_key_prefix(&self) -> bool {
        self.api_key.starts_with("sk-ant-")
    }
}

/// Split system text out and convert the rest to Anthropic content blocks.
fn to_anthropic_messages(messages: &[Message]) -> (Option<String>, Vec<serde_json::Value>) {
    let mut system: Option<String> = None;
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        if msg.role == "system" {
            let text = msg.text();
            system = Some(match system {
                Some(existing) => format!("{existing}\n\n{text}"),
                None => text,
            });
            continue;
        }

        let content = match &msg.content {
            MessageContent::Text(text) => serde_json::json!(text),
            MessageContent::MultiPart(parts) => {
                let blocks: Vec<serde_json::Value> = parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => {
                            Some(serde_json::json!({ "type": "text", "text": text }))
                        }
                        ContentPart::ImageUrl { image_url } => {
                            let (media_type, data) = image_url.as_base64()?;
                            Some(serde_json::json!({
                                "type": "image",
                                "source": {
                                    "type": "base64",
                                    "media_type": media_type,
                                    "data": data,
                                }
                            }))
                        }
                    })
                    .collect();
                serde_json::Value::Array(blocks)
            }
        };
        out.push(serde_json::json!({ "role": msg.role, "content": content }));
    }

    (system, out)
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
        client: &reqwest::Client,
    ) -> Result<CompletionResponse> {
        let (system, messages) = to_anthropic_messages(&messages);

        let mut body = serde_json::json!({
            "model": &self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = serde_json::Value::String(system);
        }

        let response = client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let json: serde_json::Value = response.json().await?;
        log::trace!("anthropic response: {}", json);

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"].as_str() == Some("text"))
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or(Error::MissingField("content[].text"))?;

        let usage = json
            .get("usage")
            .map(|u| {
                let input = u["input_tokens"].as_u64().unwrap_or(0) as u32;
                let output = u["output_tokens"].as_u64().unwrap_or(0) as u32;
                TokenUsage {
                    prompt_tokens: input,
                    completion_tokens: output,
                    total_tokens: input + output,
                }
            })
            .unwrap_or_default();

        Ok(CompletionResponse { content, usage })
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_are_hoisted() {
        let messages = vec![
            Message::system("rules"),
            Message::system("more rules"),
            Message::user_with_image("next?", "AAAA"),
        ];
        let (system, out) = to_anthropic_messages(&messages);
        assert_eq!(system.as_deref(), Some("rules\n\nmore rules"));
        assert_eq!(out.len(), 1);
        let blocks = out[0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "image");
        assert_eq!(blocks[0]["source"]["media_type"], "image/png");
        assert_eq!(blocks[0]["source"]["data"], "AAAA");
        assert_eq!(blocks[1]["text"], "next?");
    }

    #[test]
    fn test_key_prefix_and_base_url() {
        let provider = AnthropicProvider::new("sk-ant-api03-x", DEFAULT_MODEL)
            .with_base_url("https://gateway.local/");
        assert!(provider.has_expected_key_prefix());
        assert_eq!(provider.base_url, "https://gateway.local");
        assert!(!AnthropicProvider::new("sk-proj-1", DEFAULT_MODEL).has_expected_key_prefix());
    }
}
