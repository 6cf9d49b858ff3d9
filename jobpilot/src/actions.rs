//! Oracle actions, element targets and per-step records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decision produced by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    /// Set a form field's value.
    FillField {
        /// Target selector.
        selector: String,
        /// Value to enter.
        value: String,
    },
    /// Click a button or link.
    #[serde(rename = "click_button")]
    ClickElement {
        /// Target selector.
        selector: String,
    },
    /// Click the control that submits the application.
    Submit {
        /// Target selector.
        selector: String,
    },
    /// The form is complete; stop the loop.
    Done,
}

impl AgentAction {
    /// Wire tag of the action.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FillField { .. } => "fill_field",
            Self::ClickElement { .. } => "click_button",
            Self::Submit { .. } => "submit",
            Self::Done => "done",
        }
    }

    /// Selector the action targets, if any.
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::FillField { selector, .. }
            | Self::ClickElement { selector }
            | Self::Submit { selector } => Some(selector),
            Self::Done => None,
        }
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FillField { selector, .. } => write!(f, "fill_field {}", selector),
            Self::ClickElement { selector } => write!(f, "click_button {}", selector),
            Self::Submit { selector } => write!(f, "submit {}", selector),
            Self::Done => write!(f, "done"),
        }
    }
}

/// An action plus the oracle's rationale for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The chosen action.
    pub action: AgentAction,
    /// Free-text rationale.
    pub reasoning: String,
}

/// How a page element is located.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementTarget {
    /// Plain CSS selector.
    Css(String),
    /// First element of `tag` whose visible text contains `text`.
    /// An empty tag means any clickable element.
    Text {
        /// Element tag name.
        tag: String,
        /// Text fragment to look for.
        text: String,
    },
}

impl ElementTarget {
    /// CSS target.
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Text-match target.
    pub fn text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Parse a selector, accepting the `tag:has-text("...")` form models
    /// commonly emit in addition to plain CSS.
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if let Some(idx) = selector.find(":has-text(") {
            let tag = &selector[..idx];
            let rest = &selector[idx + ":has-text(".len()..];
            if let Some(inner) = rest.strip_suffix(')') {
                let inner = inner.trim();
                let unquoted = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
                if let Some(text) = unquoted {
                    if tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                        return Self::text(tag, text);
                    }
                }
            }
        }
        Self::Css(selector.to_string())
    }
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => f.write_str(selector),
            Self::Text { tag, text } => write!(f, "{}:has-text(\"{}\")", tag, text),
        }
    }
}

impl From<&str> for ElementTarget {
    fn from(selector: &str) -> Self {
        Self::parse(selector)
    }
}

/// Record of one agent step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step number (1-indexed).
    pub step: usize,
    /// Description of the action.
    pub action: String,
    /// Whether it succeeded.
    pub success: bool,
    /// Oracle rationale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Selector that finally worked, when a fallback was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Error if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StepRecord {
    /// Create a new step record.
    pub fn new(step: usize, action: impl Into<String>, success: bool) -> Self {
        Self {
            step,
            action: action.into(),
            success,
            ..Default::default()
        }
    }

    /// Set the rationale.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Set the error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set duration.
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_has_text() {
        assert_eq!(
            ElementTarget::parse(r#"button:has-text("Easy Apply")"#),
            ElementTarget::text("button", "Easy Apply")
        );
        assert_eq!(
            ElementTarget::parse("a:has-text('Sign in')"),
            ElementTarget::text("a", "Sign in")
        );
        assert_eq!(
            ElementTarget::parse(r#":has-text("Next")"#),
            ElementTarget::text("", "Next")
        );
    }

    #[test]
    fn test_parse_plain_css() {
        assert_eq!(
            ElementTarget::parse(" #email "),
            ElementTarget::css("#email")
        );
        // compound selectors before :has-text stay CSS
        assert_eq!(
            ElementTarget::parse(r#"div.card button:has-text("Go")"#),
            ElementTarget::css(r#"div.card button:has-text("Go")"#)
        );
    }

    #[test]
    fn test_target_display() {
        assert_eq!(
            ElementTarget::text("a", "Easy Apply").to_string(),
            r#"a:has-text("Easy Apply")"#
        );
    }

    #[test]
    fn test_action_serde_tags() {
        let action: AgentAction = serde_json::from_value(serde_json::json!({
            "action": "click_button",
            "selector": ".jobs-apply-button"
        }))
        .unwrap();
        assert_eq!(
            action,
            AgentAction::ClickElement {
                selector: ".jobs-apply-button".into()
            }
        );
        assert_eq!(action.tag(), "click_button");
        assert_eq!(AgentAction::Done.selector(), None);
    }

    #[test]
    fn test_step_record() {
        let record = StepRecord::new(2, "fill_field #email", false)
            .with_error("not found")
            .with_duration(40);
        assert_eq!(record.step, 2);
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("not found"));
    }
}
