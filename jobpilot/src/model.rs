//! Records shared between discovery, the orchestrator and the result sink.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Known listing hosts and the platform key they map to.
const PLATFORM_DOMAINS: &[(&str, &str)] = &[
    ("linkedin.com", "linkedin"),
    ("indeed.com", "indeed"),
    ("simplyhired.com", "simplyhired"),
];

/// Derive the platform key for a job or landing URL.
///
/// Known listing sites map to their short key (`www.linkedin.com` -> `linkedin`).
/// Any other host maps to its registrable label (`boards.greenhouse.io` -> `greenhouse`).
pub fn platform_for_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    platform_for_host(&host)
}

/// Derive the platform key for a bare host name.
pub fn platform_for_host(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }

    for (domain, key) in PLATFORM_DOMAINS {
        if host == *domain || host.ends_with(&format!(".{domain}")) {
            return Some((*key).to_string());
        }
    }

    let mut labels = host.rsplit('.');
    let _tld = labels.next();
    labels
        .next()
        .or(Some(host))
        .map(|label| label.to_string())
}

/// A job posting handed to the core by the discovery collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Platform key (`linkedin`, `indeed`, ...).
    #[serde(default)]
    pub platform: String,
    /// Canonical application URL, also the dedupe key.
    pub url: String,
    /// Job title.
    #[serde(default)]
    pub title: String,
    /// Hiring company.
    #[serde(default)]
    pub company: String,
    /// Location text as listed.
    #[serde(default)]
    pub location: String,
    /// Salary snippet, if listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    /// Description snippet, if listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Posting date as the listing shows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    /// When discovery saw the listing.
    #[serde(default, alias = "scrapedAt", skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
    /// Keywords of the search that produced the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_keywords: Option<String>,
    /// Location of the search that produced the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_location: Option<String>,
}

impl JobRecord {
    /// Create a record for a URL, deriving the platform from its host.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            platform: platform_for_url(&url).unwrap_or_default(),
            url,
            ..Default::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the company.
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    /// Platform key derived from the URL host, falling back to the stored key.
    pub fn platform_key(&self) -> Option<String> {
        platform_for_url(&self.url).or_else(|| {
            let stored = self.platform.trim().trim_end_matches(".com");
            (!stored.is_empty()).then(|| stored.to_ascii_lowercase())
        })
    }
}

/// One browser cookie as exported by common cookie-export extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name.
    #[serde(default)]
    pub name: String,
    /// Cookie value.
    #[serde(default)]
    pub value: String,
    /// Cookie domain.
    #[serde(default)]
    pub domain: String,
    /// Cookie path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry as seconds since the epoch.
    #[serde(default, alias = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    /// Secure flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// HttpOnly flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// SameSite policy (`Strict`, `Lax`, `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    /// Create a cookie with the three required fields.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// A cookie is usable only with a non-empty name, value and domain.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty() && !self.domain.is_empty()
    }
}

/// Identity and career context the oracle fills forms with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: String,
    /// Free-text career summary.
    #[serde(default, alias = "careerContext")]
    pub career_summary: String,
    /// Link or path to a resume.
    #[serde(default, alias = "resumeUrl", skip_serializing_if = "Option::is_none")]
    pub resume_reference: Option<String>,
}

impl UserProfile {
    /// Reject profiles missing the identity fields every application asks for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_name.trim().is_empty() {
            return Err(ConfigError::MissingField("firstName"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ConfigError::MissingField("lastName"));
        }
        if self.email.trim().is_empty() {
            return Err(ConfigError::MissingField("email"));
        }
        Ok(())
    }

    /// Full display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Result of checking whether a live page is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionVerification {
    /// Whether an authenticated marker was found.
    pub authenticated: bool,
    /// Human readable explanation.
    pub detail: String,
}

impl SessionVerification {
    /// Authenticated result.
    pub fn authenticated(detail: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            detail: detail.into(),
        }
    }

    /// Unauthenticated (or undetermined) result.
    pub fn unauthenticated(detail: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            detail: detail.into(),
        }
    }
}

/// Terminal status of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Never reached the form.
    Skipped,
    /// A success phrase was found after the agent finished.
    Submitted,
    /// The agent finished but no success phrase was found.
    Attempted,
    /// An unexpected error ended the job.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Submitted => write!(f, "submitted"),
            Self::Attempted => write!(f, "attempted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Machine readable reason attached to a skipped job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The credential store has no cookies for the job's platform.
    NoCookiesForPlatform,
    /// The cookie set was rejected or the browser refused it.
    CookieInjectionFailed,
    /// The session verifier found no authenticated marker.
    SessionExpired,
}

impl SkipReason {
    /// Wire form of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCookiesForPlatform => "no-cookies-for-platform",
            Self::CookieInjectionFailed => "cookie-injection-failed",
            Self::SessionExpired => "session-expired",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a captured screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// PNG written to disk.
    File {
        /// Path of the PNG file.
        path: PathBuf,
    },
    /// PNG kept inline.
    Inline {
        /// Base64 encoded PNG.
        png_base64: String,
    },
}

/// Per-job terminal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationOutcome {
    /// The job this outcome belongs to.
    pub job: JobRecord,
    /// Terminal status.
    pub status: OutcomeStatus,
    /// Platform key the job was routed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    /// Error message for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Final-state screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    /// Session check performed for the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<SessionVerification>,
    /// Agent steps taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<usize>,
    /// When the outcome was decided.
    pub timestamp: DateTime<Utc>,
}

impl ApplicationOutcome {
    fn new(job: &JobRecord, status: OutcomeStatus) -> Self {
        Self {
            job: job.clone(),
            status,
            platform: job.platform_key(),
            reason: None,
            error: None,
            evidence: None,
            verification: None,
            steps: None,
            timestamp: Utc::now(),
        }
    }

    /// A skipped job.
    pub fn skipped(job: &JobRecord, reason: SkipReason) -> Self {
        let mut outcome = Self::new(job, OutcomeStatus::Skipped);
        outcome.reason = Some(reason);
        outcome
    }

    /// A failed job.
    pub fn failed(job: &JobRecord, error: impl Into<String>) -> Self {
        let mut outcome = Self::new(job, OutcomeStatus::Failed);
        outcome.error = Some(error.into());
        outcome
    }

    /// A job that reached classification.
    pub fn classified(job: &JobRecord, status: OutcomeStatus) -> Self {
        Self::new(job, status)
    }

    /// Attach a screenshot reference.
    pub fn with_evidence(mut self, evidence: Option<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Attach the session check.
    pub fn with_verification(mut self, verification: SessionVerification) -> Self {
        self.verification = Some(verification);
        self
    }

    /// Attach the agent step count.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Number of jobs processed.
    pub total_jobs: usize,
    /// Jobs classified as submitted.
    pub submitted: usize,
    /// Jobs classified as attempted.
    pub attempted: usize,
    /// Skipped jobs.
    pub skipped: usize,
    /// Failed jobs.
    pub failed: usize,
    /// Skip counts keyed by reason.
    pub skip_reasons: BTreeMap<String, usize>,
    /// Job counts keyed by platform.
    pub platforms: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Derive the summary from a run's outcomes.
    pub fn from_outcomes(outcomes: &[ApplicationOutcome]) -> Self {
        let mut summary = Self {
            total_jobs: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Submitted => summary.submitted += 1,
                OutcomeStatus::Attempted => summary.attempted += 1,
                OutcomeStatus::Skipped => summary.skipped += 1,
                OutcomeStatus::Failed => summary.failed += 1,
            }
            if outcome.status == OutcomeStatus::Skipped {
                let reason = outcome
                    .reason
                    .map(|r| r.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                *summary.skip_reasons.entry(reason).or_default() += 1;
            }
            let platform = outcome
                .platform
                .clone()
                .unwrap_or_else(|| "other".to_string());
            *summary.platforms.entry(platform).or_default() += 1;
        }

        summary
    }

    /// Count for one status.
    pub fn count(&self, status: OutcomeStatus) -> usize {
        match status {
            OutcomeStatus::Submitted => self.submitted,
            OutcomeStatus::Attempted => self.attempted,
            OutcomeStatus::Skipped => self.skipped,
            OutcomeStatus::Failed => self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_for_url() {
        assert_eq!(
            platform_for_url("https://www.linkedin.com/jobs/view/4088025766").as_deref(),
            Some("linkedin")
        );
        assert_eq!(
            platform_for_url("https://uk.indeed.com/viewjob?jk=abc").as_deref(),
            Some("indeed")
        );
        assert_eq!(
            platform_for_url("https://boards.greenhouse.io/acme/jobs/1").as_deref(),
            Some("greenhouse")
        );
        assert_eq!(platform_for_url("not a url"), None);
    }

    #[test]
    fn test_platform_for_lookalike_host() {
        // suffix match must respect label boundaries
        assert_eq!(
            platform_for_host("notlinkedin.com").as_deref(),
            Some("notlinkedin")
        );
        assert_eq!(platform_for_host("localhost").as_deref(), Some("localhost"));
    }

    #[test]
    fn test_job_platform_key_falls_back_to_stored() {
        let job = JobRecord {
            platform: "linkedin.com".into(),
            url: "relative/path".into(),
            ..Default::default()
        };
        assert_eq!(job.platform_key().as_deref(), Some("linkedin"));
    }

    #[test]
    fn test_cookie_validity() {
        assert!(Cookie::new("li_at", "token", ".linkedin.com").is_valid());
        assert!(!Cookie::new("", "token", ".linkedin.com").is_valid());
        assert!(!Cookie::new("li_at", "", ".linkedin.com").is_valid());
        assert!(!Cookie::new("li_at", "token", "").is_valid());
    }

    #[test]
    fn test_cookie_deserializes_export_format() {
        let cookie: Cookie = serde_json::from_value(serde_json::json!({
            "name": "li_at",
            "value": "abc",
            "domain": ".linkedin.com",
            "expirationDate": 1767225600.5,
            "httpOnly": true,
            "sameSite": "None"
        }))
        .unwrap();
        assert_eq!(cookie.expires, Some(1767225600.5));
        assert_eq!(cookie.http_only, Some(true));

        let partial: Cookie = serde_json::from_value(serde_json::json!({ "name": "x" })).unwrap();
        assert!(!partial.is_valid());
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = UserProfile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            ..Default::default()
        };
        assert!(profile.validate().is_ok());
        profile.email.clear();
        assert_eq!(profile.validate(), Err(ConfigError::MissingField("email")));
    }

    #[test]
    fn test_outcome_serialization() {
        let job = JobRecord::new("https://www.linkedin.com/jobs/view/1");
        let outcome = ApplicationOutcome::skipped(&job, SkipReason::NoCookiesForPlatform);
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["reason"], "no-cookies-for-platform");
        assert_eq!(value["platform"], "linkedin");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_run_summary_counts() {
        let li = JobRecord::new("https://www.linkedin.com/jobs/view/1");
        let indeed = JobRecord::new("https://www.indeed.com/viewjob?jk=2");
        let outcomes = vec![
            ApplicationOutcome::skipped(&li, SkipReason::SessionExpired),
            ApplicationOutcome::skipped(&indeed, SkipReason::SessionExpired),
            ApplicationOutcome::classified(&li, OutcomeStatus::Submitted),
            ApplicationOutcome::failed(&indeed, "boom"),
        ];
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total_jobs, 4);
        assert_eq!(summary.count(OutcomeStatus::Skipped), 2);
        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skip_reasons.get("session-expired"), Some(&2));
        assert_eq!(summary.platforms.get("linkedin"), Some(&2));
        assert_eq!(summary.platforms.get("indeed"), Some(&2));
    }
}
