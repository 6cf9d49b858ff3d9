//! # jobpilot
//!
//! Cookie-authenticated, vision-model driven job application agent.
//!
//! ## Features
//!
//! - **Session aware**: injects exported cookies into an isolated browser
//!   context per job and checks the session is live before touching a form
//! - **Vision oracle**: each form step is one screenshot and one strictly
//!   validated JSON action from an OpenAI-compatible or Anthropic model
//! - **Bounded**: a fixed step budget, hard timeouts on navigation and on
//!   every oracle call, and one outcome per job no matter what fails
//! - **Browser agnostic core**: the state machine runs against the
//!   [`BrowserDriver`] traits; Chrome support lives behind the `chrome` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobpilot::{
//!     ActionOracle, AnthropicProvider, ChromeDriver, ChromeSettings, CredentialStore,
//!     JobRecord, Orchestrator, RunEnd, UserProfile,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Arc::new(ChromeDriver::launch(&ChromeSettings::default()).await?);
//!     let oracle = ActionOracle::new(Arc::new(AnthropicProvider::new(
//!         "sk-ant-...",
//!         "claude-sonnet-4-20250514",
//!     )));
//!     let credentials = CredentialStore::new().with("linkedin", linkedin_cookies);
//!
//!     let orchestrator = Orchestrator::new(driver, oracle, credentials, profile);
//!     match orchestrator.run(vec![JobRecord::new(url)]).await? {
//!         RunEnd::Completed(report) => println!("{:?}", report.summary),
//!         RunEnd::NoValidSessions(_) => eprintln!("refresh your cookies"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `chrome` - Chrome driver via chromiumoxide

#![warn(missing_docs)]

pub mod actions;
pub mod agent;
mod config;
pub mod driver;
mod error;
pub mod llm;
pub mod model;
pub mod oracle;
pub mod orchestrator;
pub mod session;
pub mod sink;

#[cfg(feature = "chrome")]
pub mod chrome;

// Re-exports
pub use actions::{AgentAction, Decision, ElementTarget, StepRecord};
pub use agent::{AgentReport, Finish, FormFillAgent};
pub use config::{
    AgentConfig, OrchestratorConfig, UsageSnapshot, UsageStats, DEFAULT_APPLY_ENTRY_SELECTORS,
    DEFAULT_FALLBACK_SELECTORS, DEFAULT_SUCCESS_PHRASES,
};
pub use driver::{BrowserDriver, DriverPage, SessionContext};
pub use error::{ConfigError, DecisionError, Error, Result};
pub use llm::{
    AnthropicProvider, CompletionOptions, CompletionResponse, LLMProvider, Message,
    MessageContent, OpenAIProvider, TokenUsage,
};
pub use model::{
    platform_for_url, ApplicationOutcome, Cookie, Evidence, JobRecord, OutcomeStatus,
    RunSummary, SessionVerification, SkipReason, UserProfile,
};
pub use oracle::ActionOracle;
pub use orchestrator::{classify_text, CancelHandle, Orchestrator, RunEnd, RunReport};
pub use session::{
    inject_cookies, validate_cookies, CredentialStore, MarkerProbe, PlatformProbe,
    SessionVerifier,
};
pub use sink::{
    EvidenceStore, FinalSummaryRecord, JsonLinesSink, MemorySink, ResultSink,
    SessionValidationRecord,
};

#[cfg(feature = "chrome")]
pub use chrome::{ChromeDriver, ChromeSettings};
