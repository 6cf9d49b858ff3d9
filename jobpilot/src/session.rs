//! Credentials, cookie injection and logged-in checks.

use crate::actions::ElementTarget;
use crate::driver::{DriverPage, SessionContext};
use crate::error::ConfigError;
use crate::model::{Cookie, JobRecord, SessionVerification};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default wait for an authenticated marker.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a cookie set may be injected: non-empty and every cookie complete.
pub fn validate_cookies(cookies: &[Cookie]) -> bool {
    !cookies.is_empty() && cookies.iter().all(Cookie::is_valid)
}

/// Per-platform cookie sets supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    sets: BTreeMap<String, Vec<Cookie>>,
}

impl CredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a platform's cookie set.
    pub fn with(mut self, platform: impl Into<String>, cookies: Vec<Cookie>) -> Self {
        self.insert(platform, cookies);
        self
    }

    /// Add or replace a platform's cookie set.
    pub fn insert(&mut self, platform: impl Into<String>, cookies: Vec<Cookie>) {
        self.sets.insert(platform.into(), cookies);
    }

    /// Cookies for a platform; empty when none were supplied.
    pub fn cookies_for(&self, platform: &str) -> &[Cookie] {
        self.sets.get(platform).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cookies routed to a job by its URL host.
    pub fn cookies_for_job(&self, job: &JobRecord) -> &[Cookie] {
        job.platform_key()
            .map(|platform| self.cookies_for(&platform))
            .unwrap_or(&[])
    }

    /// Every platform key present, including those with empty sets.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Whether at least one platform has a non-empty set.
    pub fn has_any(&self) -> bool {
        self.sets.values().any(|set| !set.is_empty())
    }

    /// Non-empty sets holding an incomplete cookie, with the first bad index.
    pub fn malformed(&self) -> Vec<(&str, String)> {
        self.sets
            .iter()
            .filter_map(|(platform, set)| {
                set.iter().position(|c| !c.is_valid()).map(|idx| {
                    (
                        platform.as_str(),
                        format!("cookie {} is missing name, value or domain", idx),
                    )
                })
            })
            .collect()
    }

    /// Fail only when no platform has an injectable set. Malformed sets next
    /// to a usable one are logged; their jobs skip at injection time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.has_any() {
            return Err(ConfigError::NoCredentials);
        }
        let malformed = self.malformed();
        if !self.sets.values().any(|set| validate_cookies(set)) {
            if let Some((platform, detail)) = malformed.into_iter().next() {
                return Err(ConfigError::InvalidCookies {
                    platform: platform.to_string(),
                    detail,
                });
            }
            return Err(ConfigError::NoCredentials);
        }
        for (platform, detail) in malformed {
            log::warn!("Invalid cookies for {}: {}; its jobs will be skipped", platform, detail);
        }
        Ok(())
    }
}

/// Apply a cookie set to a fresh context in a single call.
///
/// Returns `false` without touching the context when the set is invalid,
/// and `false` when the browser rejects it.
pub async fn inject_cookies(context: &mut dyn SessionContext, cookies: &[Cookie]) -> bool {
    if !validate_cookies(cookies) {
        log::warn!("Invalid cookies provided ({} entries)", cookies.len());
        return false;
    }

    match context.add_cookies(cookies).await {
        Ok(()) => {
            log::debug!("Injected {} cookies", cookies.len());
            true
        }
        Err(e) => {
            log::error!("Cookie injection failed: {}", e);
            false
        }
    }
}

/// Platform specific logged-in detection.
#[async_trait]
pub trait PlatformProbe: Send + Sync {
    /// Platform key (`linkedin`).
    fn key(&self) -> &str;

    /// Registrable domain (`linkedin.com`).
    fn domain(&self) -> &str;

    /// Page visited by the pre-flight check.
    fn landing_url(&self) -> &str;

    /// Inspect a page already navigated to the platform.
    async fn detect(&self, page: &dyn DriverPage, timeout: Duration) -> SessionVerification;
}

/// Probe driven by an authenticated marker and a sign-in marker.
#[derive(Debug, Clone)]
pub struct MarkerProbe {
    key: String,
    domain: String,
    label: String,
    landing_url: String,
    authenticated: ElementTarget,
    sign_in: ElementTarget,
}

impl MarkerProbe {
    /// Build a probe from its markers.
    pub fn new(
        key: impl Into<String>,
        domain: impl Into<String>,
        landing_url: impl Into<String>,
        authenticated: ElementTarget,
        sign_in: ElementTarget,
    ) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            domain: domain.into(),
            landing_url: landing_url.into(),
            authenticated,
            sign_in,
        }
    }

    /// Name used in details.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// LinkedIn: global nav or the profile menu.
    pub fn linkedin() -> Self {
        Self::new(
            "linkedin",
            "linkedin.com",
            "https://www.linkedin.com/jobs",
            ElementTarget::css("nav.global-nav, .global-nav__me"),
            ElementTarget::text("a", "Sign in"),
        )
        .with_label("LinkedIn")
    }

    /// Indeed: the signed-in header menu.
    pub fn indeed() -> Self {
        Self::new(
            "indeed",
            "indeed.com",
            "https://www.indeed.com",
            ElementTarget::css(r#"[data-gnav-element-name="SignedInMenu"], #gnav-user-menu"#),
            ElementTarget::text("a", "Sign in"),
        )
        .with_label("Indeed")
    }
}

#[async_trait]
impl PlatformProbe for MarkerProbe {
    fn key(&self) -> &str {
        &self.key
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn landing_url(&self) -> &str {
        &self.landing_url
    }

    async fn detect(&self, page: &dyn DriverPage, timeout: Duration) -> SessionVerification {
        if page
            .wait_for(&self.authenticated, timeout)
            .await
            .unwrap_or(false)
        {
            return SessionVerification::authenticated(format!(
                "{} session verified",
                self.label
            ));
        }

        if page.exists(&self.sign_in).await.unwrap_or(false) {
            return SessionVerification::unauthenticated(format!(
                "{} sign-in link detected - session expired",
                self.label
            ));
        }

        SessionVerification::unauthenticated(format!(
            "Could not verify {} session (undetermined)",
            self.label
        ))
    }
}

/// Registry of [`PlatformProbe`]s keyed by platform.
#[derive(Clone)]
pub struct SessionVerifier {
    probes: BTreeMap<String, Arc<dyn PlatformProbe>>,
    timeout: Duration,
}

impl Default for SessionVerifier {
    fn default() -> Self {
        Self::empty()
            .register(MarkerProbe::linkedin())
            .register(MarkerProbe::indeed())
    }
}

impl SessionVerifier {
    /// Verifier with no probes.
    pub fn empty() -> Self {
        Self {
            probes: BTreeMap::new(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Add (or replace) a probe.
    pub fn register(mut self, probe: impl PlatformProbe + 'static) -> Self {
        self.probes.insert(probe.key().to_string(), Arc::new(probe));
        self
    }

    /// Set the marker wait budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supported platform keys.
    pub fn supported(&self) -> Vec<&str> {
        self.probes.keys().map(String::as_str).collect()
    }

    /// Find the probe for a bare key or a host containing the probe's domain.
    pub fn probe(&self, platform: &str) -> Option<&Arc<dyn PlatformProbe>> {
        let platform = platform.to_ascii_lowercase();
        self.probes.get(&platform).or_else(|| {
            self.probes
                .values()
                .find(|probe| platform.contains(probe.domain()))
        })
    }

    /// Result reported for a platform without a probe.
    pub fn unsupported(&self, platform: &str) -> SessionVerification {
        SessionVerification::unauthenticated(format!(
            "Unknown platform: {}. Supported: {}",
            platform,
            self.supported().join(", ")
        ))
    }

    /// Check a page already navigated to `platform`. Never errors.
    pub async fn verify(&self, page: &dyn DriverPage, platform: &str) -> SessionVerification {
        self.verify_within(page, platform, self.timeout).await
    }

    /// [`verify`](Self::verify) with an explicit marker wait.
    pub async fn verify_within(
        &self,
        page: &dyn DriverPage,
        platform: &str,
        timeout: Duration,
    ) -> SessionVerification {
        match self.probe(platform) {
            Some(probe) => probe.detect(page, timeout).await,
            None => self.unsupported(platform),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MarkerPage {
        present: HashSet<String>,
    }

    impl MarkerPage {
        fn with(markers: &[&str]) -> Self {
            Self {
                present: markers.iter().map(|m| m.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl DriverPage for MarkerPage {
        async fn goto(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn exists(&self, target: &ElementTarget) -> Result<bool> {
            Ok(self.present.contains(&target.to_string()))
        }
        async fn fill(&self, target: &ElementTarget, _value: &str) -> Result<()> {
            Err(Error::ElementNotFound(target.to_string()))
        }
        async fn click(&self, target: &ElementTarget) -> Result<()> {
            Err(Error::ElementNotFound(target.to_string()))
        }
        async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn text_content(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct RecordingContext {
        added: Mutex<Vec<Cookie>>,
        reject: bool,
    }

    #[async_trait]
    impl SessionContext for RecordingContext {
        async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<()> {
            if self.reject {
                return Err(Error::Browser("cookie rejected".into()));
            }
            self.added.lock().extend_from_slice(cookies);
            Ok(())
        }
        async fn new_page(&mut self) -> Result<Box<dyn DriverPage>> {
            Ok(Box::new(MarkerPage::default()))
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn li_cookie() -> Cookie {
        Cookie::new("li_at", "token", ".linkedin.com")
    }

    #[tokio::test]
    async fn test_inject_rejects_whole_set_on_one_bad_cookie() {
        let mut ctx = RecordingContext::default();
        let cookies = vec![li_cookie(), Cookie::new("JSESSIONID", "", ".linkedin.com")];
        assert!(!inject_cookies(&mut ctx, &cookies).await);
        assert!(ctx.added.lock().is_empty());

        assert!(!inject_cookies(&mut ctx, &[]).await);
        assert!(ctx.added.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inject_applies_valid_set() {
        let mut ctx = RecordingContext::default();
        assert!(inject_cookies(&mut ctx, &[li_cookie(), li_cookie()]).await);
        assert_eq!(ctx.added.lock().len(), 2);

        let mut rejecting = RecordingContext {
            reject: true,
            ..Default::default()
        };
        assert!(!inject_cookies(&mut rejecting, &[li_cookie()]).await);
    }

    #[test]
    fn test_credential_store_routing_and_validation() {
        let store = CredentialStore::new()
            .with("linkedin", vec![li_cookie()])
            .with("indeed", vec![]);
        assert!(store.validate().is_ok());
        let job = JobRecord::new("https://www.linkedin.com/jobs/view/9");
        assert_eq!(store.cookies_for_job(&job).len(), 1);
        let job = JobRecord::new("https://www.indeed.com/viewjob?jk=1");
        assert!(store.cookies_for_job(&job).is_empty());

        assert_eq!(
            CredentialStore::new().with("linkedin", vec![]).validate(),
            Err(ConfigError::NoCredentials)
        );
        let bad = CredentialStore::new().with("linkedin", vec![li_cookie(), Cookie::default()]);
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidCookies { platform, .. }) if platform == "linkedin"
        ));
    }

    #[test]
    fn test_malformed_set_beside_usable_one_passes() {
        let store = CredentialStore::new()
            .with("linkedin", vec![li_cookie()])
            .with("indeed", vec![Cookie::new("CTK", "", ".indeed.com")]);
        assert!(store.validate().is_ok());

        let malformed = store.malformed();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].0, "indeed");
        assert!(malformed[0].1.contains("cookie 0"));
    }

    #[test]
    fn test_credential_store_deserializes_as_map() {
        let store: CredentialStore = serde_json::from_value(serde_json::json!({
            "linkedin": [{"name": "li_at", "value": "x", "domain": ".linkedin.com"}]
        }))
        .unwrap();
        assert_eq!(store.platforms().collect::<Vec<_>>(), vec!["linkedin"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linkedin_probe_outcomes() {
        let verifier = SessionVerifier::default();

        let page = MarkerPage::with(&["nav.global-nav, .global-nav__me"]);
        let result = verifier.verify(&page, "linkedin").await;
        assert!(result.authenticated);

        let page = MarkerPage::with(&[r#"a:has-text("Sign in")"#]);
        let result = verifier.verify(&page, "www.linkedin.com").await;
        assert!(!result.authenticated);
        assert!(result.detail.contains("session expired"));

        let page = MarkerPage::default();
        let result = verifier.verify(&page, "linkedin").await;
        assert!(!result.authenticated);
        assert!(result.detail.contains("undetermined"));
    }

    #[tokio::test]
    async fn test_unknown_platform_lists_supported() {
        let verifier = SessionVerifier::default();
        let result = verifier.verify(&MarkerPage::default(), "greenhouse").await;
        assert!(!result.authenticated);
        assert_eq!(
            result.detail,
            "Unknown platform: greenhouse. Supported: indeed, linkedin"
        );
    }

    #[test]
    fn test_probe_lookup_by_host() {
        let verifier = SessionVerifier::default();
        assert_eq!(verifier.probe("uk.indeed.com").map(|p| p.key()), Some("indeed"));
        assert_eq!(
            verifier.probe("LinkedIn").map(|p| p.landing_url()),
            Some("https://www.linkedin.com/jobs")
        );
        assert!(verifier.probe("simplyhired").is_none());
    }
}
