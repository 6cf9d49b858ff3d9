//! Per-job state machine and the sequential run loop.
//!
//! For each job: look up credentials, open a fresh context, inject cookies,
//! navigate, verify the session, open the application form, run the agent,
//! classify the result. Every exit path produces exactly one
//! [`ApplicationOutcome`] and closes the context.

use crate::actions::ElementTarget;
use crate::agent::FormFillAgent;
use crate::config::{OrchestratorConfig, UsageSnapshot};
use crate::driver::{BrowserDriver, DriverPage, SessionContext};
use crate::error::Result;
use crate::model::{
    ApplicationOutcome, Cookie, Evidence, JobRecord, OutcomeStatus, RunSummary,
    SessionVerification, SkipReason, UserProfile,
};
use crate::oracle::ActionOracle;
use crate::session::{inject_cookies, CredentialStore, SessionVerifier};
use crate::sink::{
    push_logged, EvidenceStore, FinalSummaryRecord, MemorySink, ResultSink,
    SessionValidationRecord,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Classify page text: any success phrase, case-insensitively, means submitted.
pub fn classify_text(text: &str, phrases: &[String]) -> OutcomeStatus {
    let text = text.to_lowercase();
    let submitted = phrases
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| text.contains(&p.to_lowercase()));
    if submitted {
        OutcomeStatus::Submitted
    } else {
        OutcomeStatus::Attempted
    }
}

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

/// Stops a run between jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<CancelState>);

impl CancelHandle {
    /// Request cancellation. The job in flight finishes first; a pending
    /// inter-job pause ends immediately.
    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of a run that processed jobs.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One outcome per processed job, in input order.
    pub outcomes: Vec<ApplicationOutcome>,
    /// Counts derived from `outcomes`.
    pub summary: RunSummary,
    /// Oracle usage over the run.
    pub usage: UsageSnapshot,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
    /// The pre-flight record, when pre-flight ran.
    pub session_validation: Option<SessionValidationRecord>,
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunEnd {
    /// Jobs were processed (possibly zero of them).
    Completed(RunReport),
    /// Pre-flight found no authenticated platform; no job was touched.
    NoValidSessions(SessionValidationRecord),
}

/// Drives jobs through the application state machine.
pub struct Orchestrator {
    driver: Arc<dyn BrowserDriver>,
    oracle: ActionOracle,
    credentials: CredentialStore,
    profile: UserProfile,
    verifier: SessionVerifier,
    sink: Arc<dyn ResultSink>,
    evidence: EvidenceStore,
    config: OrchestratorConfig,
    cancel: CancelHandle,
}

impl Orchestrator {
    /// Create an orchestrator with default verifier, an in-memory sink and
    /// inline evidence.
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        oracle: ActionOracle,
        credentials: CredentialStore,
        profile: UserProfile,
    ) -> Self {
        Self {
            driver,
            oracle,
            credentials,
            profile,
            verifier: SessionVerifier::default(),
            sink: Arc::new(MemorySink::new()),
            evidence: EvidenceStore::default(),
            config: OrchestratorConfig::default(),
            cancel: CancelHandle::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the probe registry.
    pub fn with_verifier(mut self, verifier: SessionVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Set the result sink.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set where screenshots go.
    pub fn with_evidence(mut self, evidence: EvidenceStore) -> Self {
        self.evidence = evidence;
        self
    }

    /// Handle that cancels the run between jobs.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate inputs, optionally pre-flight every platform, then process
    /// jobs one at a time and append the final summary.
    pub async fn run(&self, jobs: Vec<JobRecord>) -> Result<RunEnd> {
        self.profile.validate()?;
        self.credentials.validate()?;

        let session_validation = if self.config.validate_sessions_first {
            log::info!("Validating sessions before processing jobs");
            let record = SessionValidationRecord::new(self.preflight().await);
            push_logged(self.sink.as_ref(), &record).await;
            if record.summary.valid_sessions == 0 {
                log::error!("No valid sessions found. Check the supplied cookies.");
                return Ok(RunEnd::NoValidSessions(record));
            }
            Some(record)
        } else {
            None
        };

        let mut jobs = jobs;
        if let Some(max) = self.config.max_jobs {
            jobs.truncate(max);
        }
        log::info!("Processing {} jobs", jobs.len());

        let mut outcomes = Vec::with_capacity(jobs.len());
        let mut cancelled = false;

        for (i, job) in jobs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Run cancelled after {} of {} jobs", i, jobs.len());
                cancelled = true;
                break;
            }

            log::info!("Processing job {}/{}: {}", i + 1, jobs.len(), job.url);
            let outcome = self.apply(job).await;
            log::info!("Job {} finished: {}", job.url, outcome.status);
            push_logged(self.sink.as_ref(), &outcome).await;
            outcomes.push(outcome);

            if i + 1 < jobs.len() && !self.cancel.is_cancelled() {
                let delay = self.config.inter_job_delay();
                if !delay.is_zero() {
                    log::info!("Waiting {}s before next application", delay.as_secs());
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            log::warn!("Cancelled during the pause between jobs");
                        }
                    }
                }
            }
        }

        let summary = RunSummary::from_outcomes(&outcomes);
        push_logged(self.sink.as_ref(), &FinalSummaryRecord::new(summary.clone())).await;
        log::info!(
            "Run complete: {} submitted, {} attempted, {} skipped, {} failed",
            summary.submitted,
            summary.attempted,
            summary.skipped,
            summary.failed
        );

        Ok(RunEnd::Completed(RunReport {
            outcomes,
            summary,
            usage: self.oracle.usage().snapshot(),
            cancelled,
            session_validation,
        }))
    }

    /// Check each credentialed platform once on its landing page.
    pub async fn preflight(&self) -> BTreeMap<String, SessionVerification> {
        let mut results = BTreeMap::new();

        for platform in self.credentials.platforms() {
            let cookies = self.credentials.cookies_for(platform);
            let verification = if cookies.is_empty() {
                SessionVerification::unauthenticated("no cookies provided")
            } else {
                match self.verifier.probe(platform) {
                    None => self.verifier.unsupported(platform),
                    Some(probe) => {
                        let landing = probe.landing_url().to_string();
                        self.preflight_platform(platform, &landing, cookies).await
                    }
                }
            };
            log::info!(
                "Session for {}: {} ({})",
                platform,
                if verification.authenticated { "valid" } else { "invalid" },
                verification.detail
            );
            results.insert(platform.to_string(), verification);
        }

        results
    }

    async fn preflight_platform(
        &self,
        platform: &str,
        landing: &str,
        cookies: &[Cookie],
    ) -> SessionVerification {
        let mut ctx = match self.driver.new_context().await {
            Ok(ctx) => ctx,
            Err(e) => return SessionVerification::unauthenticated(format!("browser error: {}", e)),
        };

        let verification = async {
            if !inject_cookies(ctx.as_mut(), cookies).await {
                return SessionVerification::unauthenticated("cookie injection failed");
            }
            let page = match ctx.new_page().await {
                Ok(page) => page,
                Err(e) => {
                    return SessionVerification::unauthenticated(format!("browser error: {}", e))
                }
            };
            if let Err(e) = page.goto(landing, self.config.preflight_timeout()).await {
                return SessionVerification::unauthenticated(format!("navigation failed: {}", e));
            }
            self.verifier
                .verify_within(page.as_ref(), platform, self.config.probe_timeout())
                .await
        }
        .await;

        if let Err(e) = ctx.close().await {
            log::warn!("Failed to close pre-flight context: {}", e);
        }
        verification
    }

    /// Process one job to its terminal outcome. Never errors.
    pub async fn apply(&self, job: &JobRecord) -> ApplicationOutcome {
        let cookies = self.credentials.cookies_for_job(job);
        if cookies.is_empty() {
            log::warn!(
                "No cookies for platform {} - skipping {}",
                job.platform_key().unwrap_or_else(|| "unknown".to_string()),
                job.url
            );
            return ApplicationOutcome::skipped(job, SkipReason::NoCookiesForPlatform);
        }

        let mut ctx = match self.driver.new_context().await {
            Ok(ctx) => ctx,
            Err(e) => {
                log::error!("Failed to create browser context for {}: {}", job.url, e);
                return ApplicationOutcome::failed(job, e.to_string());
            }
        };

        let outcome = self.apply_in_context(ctx.as_mut(), job, cookies).await;

        if let Err(e) = ctx.close().await {
            log::warn!("Failed to close browser context for {}: {}", job.url, e);
        }
        outcome
    }

    async fn apply_in_context(
        &self,
        ctx: &mut dyn SessionContext,
        job: &JobRecord,
        cookies: &[Cookie],
    ) -> ApplicationOutcome {
        if !inject_cookies(ctx, cookies).await {
            log::warn!("Cookie injection failed - skipping {}", job.url);
            return ApplicationOutcome::skipped(job, SkipReason::CookieInjectionFailed);
        }

        let page = match ctx.new_page().await {
            Ok(page) => page,
            Err(e) => {
                log::error!("Failed to open page for {}: {}", job.url, e);
                return ApplicationOutcome::failed(job, e.to_string());
            }
        };

        match self.drive(page.as_ref(), job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Application failed for {}: {}", job.url, e);
                let evidence = self.capture(page.as_ref(), job, "failed").await;
                ApplicationOutcome::failed(job, e.to_string()).with_evidence(evidence)
            }
        }
    }

    /// Navigating through Classifying. Errors become `Failed` at the caller.
    async fn drive(&self, page: &dyn DriverPage, job: &JobRecord) -> Result<ApplicationOutcome> {
        page.goto(&job.url, self.config.navigation_timeout()).await?;

        let platform = job.platform_key().unwrap_or_default();
        let verification = self
            .verifier
            .verify_within(page, &platform, self.config.probe_timeout())
            .await;

        if !verification.authenticated {
            log::warn!("Session not authenticated for {}: {}", job.url, verification.detail);
            let evidence = self.capture(page, job, "session-expired").await;
            return Ok(ApplicationOutcome::skipped(job, SkipReason::SessionExpired)
                .with_verification(verification)
                .with_evidence(evidence));
        }

        self.open_application(page).await;

        let agent = FormFillAgent::new(self.oracle.clone(), self.config.agent.clone());
        let report = agent.run(page, &self.profile, job).await;
        if let Some(reason) = report.abort_reason() {
            log::warn!("Agent stopped early on {}: {}", job.url, reason);
        }

        let status = self.classify(page).await?;
        let evidence = self.capture(page, job, "final").await;

        Ok(ApplicationOutcome::classified(job, status)
            .with_verification(verification)
            .with_steps(report.steps)
            .with_evidence(evidence))
    }

    /// Click the first apply-entry control present. Absence is not an error.
    async fn open_application(&self, page: &dyn DriverPage) -> bool {
        for selector in &self.config.apply_entry_selectors {
            let target = ElementTarget::parse(selector);
            if !page.exists(&target).await.unwrap_or(false) {
                continue;
            }
            match page.click(&target).await {
                Ok(()) => {
                    log::info!("Clicked apply button: {}", selector);
                    tokio::time::sleep(self.config.apply_entry_settle()).await;
                    return true;
                }
                Err(e) => log::debug!("Apply button {} not clickable: {}", selector, e),
            }
        }
        log::info!("No apply button found; handing the page to the agent as is");
        false
    }

    /// Classify the current page from its visible text.
    pub async fn classify(&self, page: &dyn DriverPage) -> Result<OutcomeStatus> {
        let text = page.text_content().await?;
        Ok(classify_text(&text, &self.config.success_phrases))
    }

    /// Best-effort screenshot; failures are logged and yield no evidence.
    async fn capture(&self, page: &dyn DriverPage, job: &JobRecord, label: &str) -> Option<Evidence> {
        let png = match page.screenshot(self.config.full_page_evidence).await {
            Ok(png) => png,
            Err(e) => {
                log::debug!("Evidence screenshot failed for {}: {}", job.url, e);
                return None;
            }
        };
        match self.evidence.store(job, label, &png).await {
            Ok(evidence) => Some(evidence),
            Err(e) => {
                log::warn!("Failed to store evidence for {}: {}", job.url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases() -> Vec<String> {
        OrchestratorConfig::default().success_phrases
    }

    #[test]
    fn test_classify_case_insensitive() {
        assert_eq!(
            classify_text("Done! APPLICATION SENT to Acme", &phrases()),
            OutcomeStatus::Submitted
        );
        assert_eq!(
            classify_text("thank you for applying", &phrases()),
            OutcomeStatus::Submitted
        );
        assert_eq!(
            classify_text("Review your application", &phrases()),
            OutcomeStatus::Attempted
        );
    }

    #[test]
    fn test_classify_idempotent() {
        let text = "Your application has been received.";
        let first = classify_text(text, &phrases());
        assert_eq!(first, classify_text(text, &phrases()));
        assert_eq!(first, OutcomeStatus::Submitted);
        assert_eq!(classify_text(text, &[String::new()]), OutcomeStatus::Attempted);
    }

    #[test]
    fn test_cancel_handle_shared() {
        let handle = CancelHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wakes_waiter() {
        let handle = CancelHandle::default();
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.cancelled().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        handle.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        // Already cancelled: returns at once.
        handle.cancelled().await;
    }
}
