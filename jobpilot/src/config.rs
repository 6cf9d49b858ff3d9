//! Configuration types for jobpilot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Click targets tried in order when an oracle click misses.
pub const DEFAULT_FALLBACK_SELECTORS: &[&str] = &[
    r#"button:has-text("Apply")"#,
    r#"button:has-text("Submit")"#,
    r#"a:has-text("Easy Apply")"#,
    r#"[data-control-name="jobdetails_topcard_inapply"]"#,
];

/// Buttons that open an application form, first match wins.
pub const DEFAULT_APPLY_ENTRY_SELECTORS: &[&str] = &[
    r#"button:has-text("Easy Apply")"#,
    r#"button:has-text("Apply")"#,
    r#"a:has-text("Easy Apply")"#,
    r#"[data-control-name="jobdetails_topcard_inapply"]"#,
    ".jobs-apply-button",
];

/// Page text that marks an application as sent.
pub const DEFAULT_SUCCESS_PHRASES: &[&str] = &[
    "Application sent",
    "Application submitted",
    "Thank you for applying",
    "Your application has been received",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Form-fill loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on oracle round-trips per job.
    pub max_steps: usize,
    /// Pause after every executed action.
    pub settle_ms: u64,
    /// Extra pause after a successful click, for page transitions.
    pub click_settle_ms: u64,
    /// Click targets tried when the oracle's selector fails.
    pub fallback_selectors: Vec<String>,
    /// How long each fallback may take to appear.
    pub fallback_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            settle_ms: 1_000,
            click_settle_ms: 2_000,
            fallback_selectors: owned(DEFAULT_FALLBACK_SELECTORS),
            fallback_timeout_ms: 2_000,
        }
    }
}

impl AgentConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max steps.
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Set both settle pauses. Zero disables them (tests).
    pub fn with_settle(mut self, settle: Duration, click_settle: Duration) -> Self {
        self.settle_ms = settle.as_millis() as u64;
        self.click_settle_ms = click_settle.as_millis() as u64;
        self
    }

    /// Replace the fallback click list.
    pub fn with_fallback_selectors(mut self, selectors: Vec<String>) -> Self {
        self.fallback_selectors = selectors;
        self
    }

    /// Pause after every action.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Pause after a click.
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    /// Wait budget per fallback target.
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

/// Per-run orchestration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Job page navigation budget.
    pub navigation_timeout_ms: u64,
    /// Landing page navigation budget during pre-flight.
    pub preflight_timeout_ms: u64,
    /// Wait for an authenticated marker.
    pub probe_timeout_ms: u64,
    /// Check every platform's session once before processing jobs.
    pub validate_sessions_first: bool,
    /// Buttons that open the application form.
    pub apply_entry_selectors: Vec<String>,
    /// Pause after clicking the apply entry.
    pub apply_entry_settle_ms: u64,
    /// Phrases that classify a job as submitted.
    pub success_phrases: Vec<String>,
    /// Lower bound of the random pause between jobs.
    pub inter_job_delay_min_ms: u64,
    /// Upper bound of the random pause between jobs.
    pub inter_job_delay_max_ms: u64,
    /// Process at most this many jobs.
    pub max_jobs: Option<usize>,
    /// Capture full-page evidence screenshots.
    pub full_page_evidence: bool,
    /// Form-fill loop settings.
    pub agent: AgentConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            preflight_timeout_ms: 15_000,
            probe_timeout_ms: 5_000,
            validate_sessions_first: true,
            apply_entry_selectors: owned(DEFAULT_APPLY_ENTRY_SELECTORS),
            apply_entry_settle_ms: 2_000,
            success_phrases: owned(DEFAULT_SUCCESS_PHRASES),
            inter_job_delay_min_ms: 5_000,
            inter_job_delay_max_ms: 10_000,
            max_jobs: None,
            full_page_evidence: true,
            agent: AgentConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for deterministic tests: no pauses, no pre-flight.
    pub fn immediate() -> Self {
        Self::default()
            .with_inter_job_delay(Duration::ZERO, Duration::ZERO)
            .with_apply_entry_settle(Duration::ZERO)
            .with_validate_sessions_first(false)
            .with_agent(AgentConfig::default().with_settle(Duration::ZERO, Duration::ZERO))
    }

    /// Set the navigation timeout.
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the authenticated-marker wait.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable pre-flight session validation.
    pub fn with_validate_sessions_first(mut self, enabled: bool) -> Self {
        self.validate_sessions_first = enabled;
        self
    }

    /// Set the pause after the apply entry click.
    pub fn with_apply_entry_settle(mut self, settle: Duration) -> Self {
        self.apply_entry_settle_ms = settle.as_millis() as u64;
        self
    }

    /// Set the inter-job delay range. A reversed range is normalized.
    pub fn with_inter_job_delay(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.inter_job_delay_min_ms = min.as_millis() as u64;
        self.inter_job_delay_max_ms = max.as_millis() as u64;
        self
    }

    /// Limit the number of jobs processed.
    pub fn with_max_jobs(mut self, max: usize) -> Self {
        self.max_jobs = Some(max);
        self
    }

    /// Replace the success phrases.
    pub fn with_success_phrases(mut self, phrases: Vec<String>) -> Self {
        self.success_phrases = phrases;
        self
    }

    /// Set the agent config.
    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    /// Job navigation budget.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Pre-flight navigation budget.
    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_millis(self.preflight_timeout_ms)
    }

    /// Authenticated-marker wait.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Pause after the apply entry click.
    pub fn apply_entry_settle(&self) -> Duration {
        Duration::from_millis(self.apply_entry_settle_ms)
    }

    /// Draw a uniformly random pause from the inter-job range.
    pub fn inter_job_delay(&self) -> Duration {
        let (min, max) = if self.inter_job_delay_min_ms <= self.inter_job_delay_max_ms {
            (self.inter_job_delay_min_ms, self.inter_job_delay_max_ms)
        } else {
            (self.inter_job_delay_max_ms, self.inter_job_delay_min_ms)
        };
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

/// Oracle usage counters for one run.
///
/// Uses atomic counters for lock-free concurrent updates.
#[derive(Debug, Default)]
pub struct UsageStats {
    /// Total prompt tokens used.
    pub prompt_tokens: AtomicU64,
    /// Total completion tokens used.
    pub completion_tokens: AtomicU64,
    /// Oracle calls made.
    pub oracle_calls: AtomicU64,
    /// Oracle calls that produced no usable action.
    pub decision_errors: AtomicU64,
}

impl UsageStats {
    /// Create new usage stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tokens from a provider response.
    pub fn add_tokens(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// Increment the oracle call count.
    pub fn increment_oracle_calls(&self) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the decision error count.
    pub fn increment_decision_errors(&self) {
        self.decision_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current usage.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            decision_errors: self.decision_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Total prompt tokens.
    pub prompt_tokens: u64,
    /// Total completion tokens.
    pub completion_tokens: u64,
    /// Oracle calls.
    pub oracle_calls: u64,
    /// Oracle calls without a usable action.
    pub decision_errors: u64,
}

impl UsageSnapshot {
    /// Get total tokens.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.settle(), Duration::from_secs(1));
        assert_eq!(config.fallback_selectors.len(), 4);
        assert_eq!(config.fallback_selectors[0], r#"button:has-text("Apply")"#);
    }

    #[test]
    fn test_orchestrator_config_partial_json() {
        let config: OrchestratorConfig = serde_json::from_value(serde_json::json!({
            "navigation_timeout_ms": 1000,
            "agent": { "max_steps": 3 }
        }))
        .unwrap();
        assert_eq!(config.navigation_timeout(), Duration::from_secs(1));
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.agent.settle_ms, 1_000);
        assert!(config.validate_sessions_first);
        assert_eq!(config.success_phrases.len(), 4);
    }

    #[test]
    fn test_inter_job_delay_range() {
        let config = OrchestratorConfig::default();
        for _ in 0..50 {
            let delay = config.inter_job_delay();
            assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(10));
        }
        let reversed = OrchestratorConfig::default()
            .with_inter_job_delay(Duration::from_millis(20), Duration::from_millis(10));
        assert_eq!(reversed.inter_job_delay_min_ms, 10);
        assert_eq!(
            OrchestratorConfig::immediate().inter_job_delay(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_usage_stats_snapshot() {
        let stats = UsageStats::new();
        stats.add_tokens(100, 20);
        stats.increment_oracle_calls();
        stats.increment_oracle_calls();
        stats.increment_decision_errors();
        let snap = stats.snapshot();
        assert_eq!(snap.total_tokens(), 120);
        assert_eq!(snap.oracle_calls, 2);
        assert_eq!(snap.decision_errors, 1);
    }
}
