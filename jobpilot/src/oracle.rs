//! Vision oracle: screenshot in, one validated [`Decision`] out.

use crate::actions::{AgentAction, Decision};
use crate::config::UsageStats;
use crate::error::DecisionError;
use crate::llm::{CompletionOptions, LLMProvider, Message};
use crate::model::{JobRecord, UserProfile};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Default hard budget for one oracle round-trip.
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(60);

/// Keys the response object may carry.
const ALLOWED_KEYS: &[&str] = &["action", "selector", "value", "reasoning"];

const SYSTEM_PROMPT: &str = r#"You are helping fill out a job application form in a web browser.
You see a screenshot of the current page and choose exactly ONE next action.

Respond ONLY with a single JSON object, no prose:
{
  "action": "fill_field" | "click_button" | "submit" | "done",
  "selector": "CSS selector for the element (omit for done)",
  "value": "value to enter (fill_field only)",
  "reasoning": "why you chose this action"
}

Rules:
- Use only the keys above.
- Selectors may be CSS or the form tag:has-text("Visible text").
- If the form is complete or already submitted, use "done".
- If you see an "Easy Apply" or "Apply" button, click it first.
- Never invent answers the user context does not support; prefer "done" over guessing."#;

/// Wraps an [`LLMProvider`] and turns its reply into a validated [`Decision`].
///
/// There are no retries here. A failed or malformed reply is returned as a
/// [`DecisionError`] and the caller decides what to do with it.
#[derive(Clone)]
pub struct ActionOracle {
    provider: Arc<dyn LLMProvider>,
    client: reqwest::Client,
    options: CompletionOptions,
    timeout: Duration,
    usage: Arc<UsageStats>,
}

impl ActionOracle {
    /// Create an oracle over a provider with default options.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            options: CompletionOptions::default(),
            timeout: DEFAULT_DECISION_TIMEOUT,
            usage: Arc::new(UsageStats::new()),
        }
    }

    /// Share usage counters with the caller.
    pub fn with_usage(mut self, usage: Arc<UsageStats>) -> Self {
        self.usage = usage;
        self
    }

    /// Usage counters of this oracle.
    pub fn usage(&self) -> &Arc<UsageStats> {
        &self.usage
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set completion options.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Ask for the next action given a viewport PNG.
    pub async fn decide(
        &self,
        screenshot: &[u8],
        profile: &UserProfile,
        job: &JobRecord,
    ) -> Result<Decision, DecisionError> {
        self.usage.increment_oracle_calls();
        let result = self.request(screenshot, profile, job).await;
        if result.is_err() {
            self.usage.increment_decision_errors();
        }
        result
    }

    async fn request(
        &self,
        screenshot: &[u8],
        profile: &UserProfile,
        job: &JobRecord,
    ) -> Result<Decision, DecisionError> {
        let image = base64::engine::general_purpose::STANDARD.encode(screenshot);
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user_with_image(build_user_prompt(profile, job), image),
        ];

        let call = self.provider.complete(messages, &self.options, &self.client);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(DecisionError::Transport(e.to_string())),
            Err(_) => return Err(DecisionError::Timeout(self.timeout)),
        };

        self.usage.add_tokens(
            response.usage.prompt_tokens as u64,
            response.usage.completion_tokens as u64,
        );
        log::debug!(
            "{} replied ({} tokens): {}",
            self.provider.provider_name(),
            response.usage.total_tokens,
            response.content
        );

        parse_decision(&response.content)
    }
}

/// User-facing part of the prompt: identity, career context and the job.
pub fn build_user_prompt(profile: &UserProfile, job: &JobRecord) -> String {
    let mut prompt = String::with_capacity(512);
    prompt.push_str("User context:\n");
    prompt.push_str(&format!("- Name: {}\n", profile.full_name()));
    prompt.push_str(&format!("- Email: {}\n", profile.email));
    if !profile.phone.is_empty() {
        prompt.push_str(&format!("- Phone: {}\n", profile.phone));
    }
    if !profile.career_summary.is_empty() {
        prompt.push_str(&format!("- Career summary: {}\n", profile.career_summary));
    }
    if let Some(resume) = profile.resume_reference.as_deref() {
        prompt.push_str(&format!("- Resume: {}\n", resume));
    }

    prompt.push_str("\nJob:\n");
    if !job.title.is_empty() {
        prompt.push_str(&format!("- Title: {}\n", job.title));
    }
    if !job.company.is_empty() {
        prompt.push_str(&format!("- Company: {}\n", job.company));
    }
    prompt.push_str(&format!("- URL: {}\n", job.url));

    prompt.push_str("\nAnalyze the screenshot and reply with the JSON object for the next action.");
    prompt
}

/// Locate the first balanced `{...}` object in free text.
///
/// Braces inside JSON strings are ignored, so prose, markdown fences and
/// trailing commentary around the object are all tolerated.
pub fn extract_first_json_object(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &ch) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == b'\\' {
                escaped = true;
            } else if ch == b'"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Fetch an optional string key. `null` counts as absent.
fn string_field<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &'static str,
) -> Result<Option<&'a str>, DecisionError> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(DecisionError::InvalidType(key)),
    }
}

fn required_selector(
    obj: &serde_json::Map<String, serde_json::Value>,
) -> Result<String, DecisionError> {
    match string_field(obj, "selector")? {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(DecisionError::InvalidType("selector")),
        None => Err(DecisionError::MissingKey("selector")),
    }
}

/// Strictly validate an oracle reply.
pub fn parse_decision(text: &str) -> Result<Decision, DecisionError> {
    let raw = extract_first_json_object(text).ok_or(DecisionError::NoJsonObject)?;
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DecisionError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| DecisionError::Malformed("not an object".to_string()))?;

    if let Some(key) = obj.keys().find(|k| !ALLOWED_KEYS.contains(&k.as_str())) {
        return Err(DecisionError::UnexpectedKey(key.clone()));
    }

    let tag = string_field(obj, "action")?.ok_or(DecisionError::MissingKey("action"))?;
    let reasoning = string_field(obj, "reasoning")?
        .ok_or(DecisionError::MissingKey("reasoning"))?
        .to_string();

    let action = match tag {
        "fill_field" => {
            let selector = required_selector(obj)?;
            let value = string_field(obj, "value")?.ok_or(DecisionError::MissingKey("value"))?;
            AgentAction::FillField {
                selector,
                value: value.to_string(),
            }
        }
        "click_button" => AgentAction::ClickElement {
            selector: required_selector(obj)?,
        },
        "submit" => AgentAction::Submit {
            selector: required_selector(obj)?,
        },
        "done" => AgentAction::Done,
        other => return Err(DecisionError::UnknownAction(other.to_string())),
    };

    Ok(Decision { action, reasoning })
}
