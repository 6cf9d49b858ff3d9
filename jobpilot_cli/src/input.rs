use jobpilot::{
    ConfigError, Cookie, CredentialStore, JobRecord, OrchestratorConfig, UserProfile,
};
use jobpilot_scout::{ExperienceLevel, JobType, Platform, PostedWithin, ScoutConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One keyword string or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Keywords::One(k) => vec![k.clone()],
            Keywords::Many(ks) => ks.clone(),
        }
    }
}

fn default_max_jobs() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// The run input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub linkedin_cookies: Option<Vec<Cookie>>,
    #[serde(default)]
    pub indeed_cookies: Option<Vec<Cookie>>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub career_context: String,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub job_keywords: Option<Keywords>,
    #[serde(default)]
    pub job_location: Option<String>,
    #[serde(default = "default_max_jobs")]
    pub max_jobs_to_process: usize,
    #[serde(default = "default_true")]
    pub validate_sessions_first: bool,
    #[serde(default)]
    pub platforms: Option<Vec<Platform>>,
    #[serde(default)]
    pub posted_within: Option<PostedWithin>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub proxies: Vec<String>,
    /// Explicit job list, bypasses discovery.
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

/// Which decision service a run talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleKey {
    Anthropic(String),
    OpenAI(String),
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RunInput {
    /// Read and parse an input file.
    pub async fn load(path: &Path) -> Result<Self, crate::CliError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Keys given on the command line or in the environment win over the file.
    pub fn with_api_keys(mut self, anthropic: Option<String>, openai: Option<String>) -> Self {
        if anthropic.as_ref().is_some_and(|k| !k.trim().is_empty()) {
            self.anthropic_api_key = anthropic;
        }
        if openai.as_ref().is_some_and(|k| !k.trim().is_empty()) {
            self.openai_api_key = openai;
        }
        self
    }

    /// Anthropic when configured, otherwise OpenAI.
    pub fn oracle_key(&self) -> Result<OracleKey, ConfigError> {
        if let Some(key) = present(&self.anthropic_api_key) {
            return Ok(OracleKey::Anthropic(key.to_string()));
        }
        if let Some(key) = present(&self.openai_api_key) {
            return Ok(OracleKey::OpenAI(key.to_string()));
        }
        Err(ConfigError::MissingApiKey)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.clone(),
            career_summary: self.career_context.clone(),
            resume_reference: present(&self.resume_url).map(str::to_string),
        }
    }

    /// Cookie sets keyed by platform. Absent sets are left out, empty ones kept.
    pub fn credentials(&self) -> CredentialStore {
        let mut store = CredentialStore::new();
        if let Some(cookies) = &self.linkedin_cookies {
            store.insert("linkedin", cookies.clone());
        }
        if let Some(cookies) = &self.indeed_cookies {
            store.insert("indeed", cookies.clone());
        }
        store
    }

    /// Discovery settings. Searches for twice the jobs to process since some
    /// listings are not easy-apply.
    pub fn scout_config(&self) -> ScoutConfig {
        let mut config = ScoutConfig::default()
            .with_max_jobs_per_platform(self.max_jobs_to_process.saturating_mul(2))
            .with_proxies(self.proxies.clone());
        if let Some(keywords) = &self.job_keywords {
            config = config.with_keywords(keywords.to_vec());
        }
        if let Some(location) = present(&self.job_location) {
            config = config.with_location(location);
        }
        if let Some(platforms) = &self.platforms {
            config = config.with_platforms(platforms.clone());
        }
        if let Some(posted) = self.posted_within {
            config = config.with_posted_within(posted);
        }
        if let Some(job_type) = self.job_type {
            config = config.with_job_type(job_type);
        }
        if let Some(level) = self.experience_level {
            config = config.with_experience_level(level);
        }
        config
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_validate_sessions_first(self.validate_sessions_first)
            .with_max_jobs(self.max_jobs_to_process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{
        "anthropicApiKey": "sk-ant-test",
        "linkedinCookies": [{"name": "li_at", "value": "t", "domain": ".linkedin.com", "httpOnly": true, "hostOnly": false}],
        "firstName": " Ada ",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "careerContext": "Analytical engines",
        "resumeUrl": "",
        "jobKeywords": "rust engineer",
        "platforms": ["linkedin", "simplyhired"],
        "postedWithin": "month",
        "jobs": [{"url": "https://www.linkedin.com/jobs/view/1", "title": "Engineer", "platform": "linkedin.com", "easyApply": true}]
    }"#;

    #[test]
    fn test_parse_actor_input() {
        let input: RunInput = serde_json::from_str(INPUT).unwrap();
        assert_eq!(input.max_jobs_to_process, 10);
        assert!(input.validate_sessions_first);
        assert_eq!(input.jobs.len(), 1);
        assert_eq!(input.jobs[0].platform_key().as_deref(), Some("linkedin"));

        let profile = input.profile();
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.career_summary, "Analytical engines");
        assert_eq!(profile.resume_reference, None);

        let credentials = input.credentials();
        assert_eq!(credentials.cookies_for("linkedin").len(), 1);
        assert!(credentials.platforms().all(|p| p == "linkedin"));

        let scout = input.scout_config();
        assert_eq!(scout.keywords, vec!["rust engineer".to_string()]);
        assert_eq!(scout.max_jobs_per_platform, 20);
        assert_eq!(scout.platforms, vec![Platform::Linkedin, Platform::SimplyHired]);
        assert_eq!(scout.posted_within, PostedWithin::Month);
        assert_eq!(scout.location, "Remote");

        let config = input.orchestrator_config();
        assert_eq!(config.max_jobs, Some(10));
        assert!(config.validate_sessions_first);
    }

    #[test]
    fn test_oracle_key_resolution() {
        let input: RunInput = serde_json::from_str(INPUT).unwrap();
        assert_eq!(
            input.oracle_key().unwrap(),
            OracleKey::Anthropic("sk-ant-test".into())
        );

        let input = RunInput {
            anthropic_api_key: Some("  ".into()),
            ..Default::default()
        }
        .with_api_keys(None, Some("sk-openai".into()));
        assert_eq!(input.oracle_key().unwrap(), OracleKey::OpenAI("sk-openai".into()));

        assert!(matches!(
            RunInput::default().oracle_key(),
            Err(ConfigError::MissingApiKey)
        ));

        let input = RunInput::default().with_api_keys(Some("sk-ant-env".into()), None);
        assert_eq!(input.oracle_key().unwrap(), OracleKey::Anthropic("sk-ant-env".into()));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        tokio::fs::write(&path, INPUT).await.unwrap();
        let input = RunInput::load(&path).await.unwrap();
        assert_eq!(input.email, "ada@example.com");

        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(matches!(
            RunInput::load(&path).await,
            Err(crate::CliError::Json(_))
        ));
        assert!(matches!(
            RunInput::load(&dir.path().join("missing.json")).await,
            Err(crate::CliError::Io(_))
        ));
    }

    #[test]
    fn test_keyword_list() {
        let input: RunInput =
            serde_json::from_str(r#"{"jobKeywords": ["rust", "backend"]}"#).unwrap();
        assert_eq!(input.scout_config().query(), "rust backend");
    }
}
