//! Bounded observe, decide, act loop over an application form.

use crate::actions::{AgentAction, ElementTarget, StepRecord};
use crate::config::AgentConfig;
use crate::driver::DriverPage;
use crate::error::Result;
use crate::model::{JobRecord, UserProfile};
use crate::oracle::ActionOracle;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "finish", content = "reason", rename_all = "snake_case")]
pub enum Finish {
    /// The oracle reported the form complete.
    Done,
    /// The loop stopped early (decision failure, lost page).
    Aborted(String),
    /// Every step was used without a `done`.
    BudgetExhausted,
}

/// What the agent did for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    /// Oracle round-trips made.
    pub steps: usize,
    /// Terminal state of the loop.
    pub finish: Finish,
    /// Per-step records.
    pub actions: Vec<StepRecord>,
}

impl AgentReport {
    /// Abort reason, if any.
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.finish {
            Finish::Aborted(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Drives a page toward a submitted application, one oracle decision at a time.
///
/// The loop never fails the job: decision errors, lost screenshots and
/// missed selectors all end in a normal [`AgentReport`].
#[derive(Clone)]
pub struct FormFillAgent {
    oracle: ActionOracle,
    config: AgentConfig,
}

impl FormFillAgent {
    /// Create an agent.
    pub fn new(oracle: ActionOracle, config: AgentConfig) -> Self {
        Self { oracle, config }
    }

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run at most `max_steps` iterations against `page`.
    pub async fn run(
        &self,
        page: &dyn DriverPage,
        profile: &UserProfile,
        job: &JobRecord,
    ) -> AgentReport {
        let mut steps = 0;
        let mut actions = Vec::new();

        while steps < self.config.max_steps {
            let step = steps + 1;
            log::info!("Form step {} for {}", step, job.url);

            let screenshot = match page.screenshot(false).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Screenshot failed at step {}: {}", step, e);
                    return AgentReport {
                        steps,
                        finish: Finish::Aborted(format!("screenshot failed: {}", e)),
                        actions,
                    };
                }
            };

            let started = Instant::now();
            let decision = self.oracle.decide(&screenshot, profile, job).await;
            steps = step;

            let decision = match decision {
                Ok(decision) => decision,
                Err(e) => {
                    log::error!("Oracle decision failed at step {}: {}", step, e);
                    actions.push(
                        StepRecord::new(step, "decide", false)
                            .with_error(e.to_string())
                            .with_duration(started.elapsed().as_millis() as u64),
                    );
                    return AgentReport {
                        steps,
                        finish: Finish::Aborted(e.to_string()),
                        actions,
                    };
                }
            };

            log::debug!("Step {} decision: {} ({})", step, decision.action, decision.reasoning);

            if decision.action == AgentAction::Done {
                log::info!("Oracle reports the form complete");
                actions.push(
                    StepRecord::new(step, "done", true)
                        .with_reasoning(decision.reasoning)
                        .with_duration(started.elapsed().as_millis() as u64),
                );
                return AgentReport {
                    steps,
                    finish: Finish::Done,
                    actions,
                };
            }

            let mut record = self.execute(page, &decision.action, step).await;
            record.reasoning = Some(decision.reasoning);
            record.duration_ms = started.elapsed().as_millis() as u64;
            actions.push(record);

            tokio::time::sleep(self.config.settle()).await;
        }

        log::info!("Step budget of {} exhausted for {}", self.config.max_steps, job.url);
        AgentReport {
            steps,
            finish: Finish::BudgetExhausted,
            actions,
        }
    }

    /// Execute one non-terminal action. Failures are recorded, never raised.
    async fn execute(&self, page: &dyn DriverPage, action: &AgentAction, step: usize) -> StepRecord {
        match action {
            AgentAction::FillField { selector, value } => {
                match page.fill(&ElementTarget::parse(selector), value).await {
                    Ok(()) => {
                        log::info!("Filled field: {}", selector);
                        StepRecord::new(step, action.to_string(), true)
                    }
                    Err(e) => {
                        log::warn!("Fill failed for {}: {}", selector, e);
                        StepRecord::new(step, action.to_string(), false).with_error(e.to_string())
                    }
                }
            }
            AgentAction::ClickElement { selector } | AgentAction::Submit { selector } => {
                let primary = page.click(&ElementTarget::parse(selector)).await;
                let outcome = match primary {
                    Ok(()) => {
                        log::info!("Clicked: {}", selector);
                        Ok(None)
                    }
                    Err(e) => {
                        log::warn!("Click failed for {}: {}", selector, e);
                        match self.click_fallback(page).await {
                            Some(fallback) => Ok(Some(fallback)),
                            None => Err(e),
                        }
                    }
                };

                match outcome {
                    Ok(fallback) => {
                        tokio::time::sleep(self.config.click_settle()).await;
                        let mut record = StepRecord::new(step, action.to_string(), true);
                        record.fallback = fallback;
                        record
                    }
                    Err(e) => {
                        log::error!("All click fallbacks failed");
                        StepRecord::new(step, action.to_string(), false).with_error(e.to_string())
                    }
                }
            }
            AgentAction::Done => StepRecord::new(step, "done", true),
        }
    }

    /// Try each fallback target in order; the first successful click wins.
    async fn click_fallback(&self, page: &dyn DriverPage) -> Option<String> {
        for selector in &self.config.fallback_selectors {
            let target = ElementTarget::parse(selector);
            let clicked: Result<bool> = async {
                if !page.wait_for(&target, self.config.fallback_timeout()).await? {
                    return Ok(false);
                }
                page.click(&target).await?;
                Ok(true)
            }
            .await;

            if let Ok(true) = clicked {
                log::info!("Clicked fallback: {}", selector);
                return Some(selector.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::{CompletionOptions, CompletionResponse, LLMProvider, Message, TokenUsage};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Replies from a queue, repeating the last reply once drained.
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        last: String,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                last: replies.last().map(|r| r.to_string()).unwrap_or_default(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _options: &CompletionOptions,
            _client: &reqwest::Client,
        ) -> crate::error::Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            Ok(CompletionResponse {
                content,
                usage: TokenUsage::default(),
            })
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct FormPage {
        clickable: HashSet<String>,
        fill_fails: bool,
        screenshot_fails: bool,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DriverPage for FormPage {
        async fn goto(&self, _url: &str, _timeout: Duration) -> crate::error::Result<()> {
            Ok(())
        }
        async fn exists(&self, target: &ElementTarget) -> crate::error::Result<bool> {
            Ok(self.clickable.contains(&target.to_string()))
        }
        async fn fill(&self, target: &ElementTarget, value: &str) -> crate::error::Result<()> {
            if self.fill_fails {
                return Err(Error::ElementNotFound(target.to_string()));
            }
            self.events.lock().push(format!("fill {}={}", target, value));
            Ok(())
        }
        async fn click(&self, target: &ElementTarget) -> crate::error::Result<()> {
            if !self.clickable.contains(&target.to_string()) {
                return Err(Error::ElementNotFound(target.to_string()));
            }
            self.events.lock().push(format!("click {}", target));
            Ok(())
        }
        async fn screenshot(&self, _full_page: bool) -> crate::error::Result<Vec<u8>> {
            if self.screenshot_fails {
                return Err(Error::Browser("target closed".into()));
            }
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
        async fn text_content(&self) -> crate::error::Result<String> {
            Ok(String::new())
        }
    }

    fn agent(provider: Arc<Scripted>, max_steps: usize) -> FormFillAgent {
        let config = AgentConfig::default()
            .with_max_steps(max_steps)
            .with_settle(Duration::ZERO, Duration::ZERO);
        FormFillAgent::new(ActionOracle::new(provider), config)
    }

    fn job() -> JobRecord {
        JobRecord::new("https://www.linkedin.com/jobs/view/1")
    }

    const FILL: &str =
        r##"{"action":"fill_field","selector":"#phone","value":"555","reasoning":"phone is empty"}"##;

    #[tokio::test]
    async fn test_budget_bounds_oracle_calls() {
        let provider = Scripted::new(&[FILL]);
        let report = agent(provider.clone(), 4)
            .run(&FormPage::default(), &UserProfile::default(), &job())
            .await;
        assert_eq!(report.steps, 4);
        assert_eq!(report.finish, Finish::BudgetExhausted);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_done_on_first_step() {
        let provider = Scripted::new(&[r#"{"action":"done","reasoning":"form already complete"}"#]);
        let report = agent(provider.clone(), 10)
            .run(&FormPage::default(), &UserProfile::default(), &job())
            .await;
        assert_eq!(report.steps, 1);
        assert_eq!(report.finish, Finish::Done);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_aborts_loop() {
        let provider = Scripted::new(&[FILL, "I would click the blue button."]);
        let page = FormPage::default();
        let report = agent(provider, 10)
            .run(&page, &UserProfile::default(), &job())
            .await;
        assert_eq!(report.steps, 2);
        assert_eq!(report.abort_reason(), Some("no JSON object in oracle response"));
        assert_eq!(page.events.lock().as_slice(), ["fill #phone=555"]);
    }

    #[tokio::test]
    async fn test_fill_failure_continues() {
        let provider = Scripted::new(&[FILL, r#"{"action":"done","reasoning":"ok"}"#]);
        let page = FormPage {
            fill_fails: true,
            ..Default::default()
        };
        let report = agent(provider, 10)
            .run(&page, &UserProfile::default(), &job())
            .await;
        assert_eq!(report.steps, 2);
        assert_eq!(report.finish, Finish::Done);
        assert!(!report.actions[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_falls_back_in_order() {
        let provider = Scripted::new(&[
            r##"{"action":"submit","selector":"#missing","reasoning":"send it"}"##,
            r#"{"action":"done","reasoning":"sent"}"#,
        ]);
        let page = FormPage {
            clickable: [r#"button:has-text("Submit")"#, r#"a:has-text("Easy Apply")"#]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Default::default()
        };
        let report = agent(provider, 10)
            .run(&page, &UserProfile::default(), &job())
            .await;
        assert_eq!(report.finish, Finish::Done);
        assert!(report.actions[0].success);
        assert_eq!(
            report.actions[0].fallback.as_deref(),
            Some(r#"button:has-text("Submit")"#)
        );
        assert_eq!(page.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_screenshot_failure_aborts_without_oracle_call() {
        let provider = Scripted::new(&[FILL]);
        let page = FormPage {
            screenshot_fails: true,
            ..Default::default()
        };
        let report = agent(provider.clone(), 10)
            .run(&page, &UserProfile::default(), &job())
            .await;
        assert_eq!(report.steps, 0);
        assert!(report.abort_reason().unwrap().starts_with("screenshot failed"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
