//! Search configuration.

use crate::error::ScoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Listings yielded by one results page, on average across sites.
const JOBS_PER_PAGE_ESTIMATE: usize = 15;
/// Attempts allowed per planned page, retries included.
pub const ATTEMPTS_PER_PAGE: usize = 3;

/// Listing sites discovery knows how to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// linkedin.com public job search.
    Linkedin,
    /// indeed.com.
    Indeed,
    /// simplyhired.com.
    #[serde(alias = "simply-hired")]
    SimplyHired,
}

impl Platform {
    /// All supported sites in search order.
    pub const ALL: [Platform; 3] = [Platform::Linkedin, Platform::Indeed, Platform::SimplyHired];

    /// Platform key shared with the application core.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::Indeed => "indeed",
            Self::SimplyHired => "simplyhired",
        }
    }

    /// Site origin used to absolutize relative links.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Linkedin => "https://www.linkedin.com",
            Self::Indeed => "https://www.indeed.com",
            Self::SimplyHired => "https://www.simplyhired.com",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Platform {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" | "linkedin.com" => Ok(Self::Linkedin),
            "indeed" | "indeed.com" => Ok(Self::Indeed),
            "simplyhired" | "simply-hired" | "simplyhired.com" => Ok(Self::SimplyHired),
            other => Err(ScoutError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Recency filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostedWithin {
    /// No filter.
    Any,
    /// Last 24 hours.
    #[serde(rename = "24hours")]
    Day,
    /// Last 7 days.
    #[default]
    Week,
    /// Last 30 days.
    Month,
}

impl PostedWithin {
    /// Window in days, when filtered.
    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Any => None,
            Self::Day => Some(1),
            Self::Week => Some(7),
            Self::Month => Some(30),
        }
    }
}

/// Employment type filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// No filter.
    #[default]
    Any,
    /// Full time.
    FullTime,
    /// Part time.
    PartTime,
    /// Contract.
    Contract,
    /// Internship.
    Internship,
}

/// Seniority filter. Only LinkedIn supports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    /// No filter.
    #[default]
    Any,
    /// Entry level.
    Entry,
    /// Mid-senior.
    Mid,
    /// Senior / director.
    Senior,
    /// Executive.
    Executive,
}

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoutConfig {
    /// Search keywords, joined with spaces in the query.
    pub keywords: Vec<String>,
    /// Search location.
    pub location: String,
    /// Sites to search.
    pub platforms: Vec<Platform>,
    /// Stop collecting from a site after this many unique listings.
    pub max_jobs_per_platform: usize,
    /// Recency filter.
    pub posted_within: PostedWithin,
    /// Employment type filter.
    pub job_type: JobType,
    /// Seniority filter.
    pub experience_level: ExperienceLevel,
    /// Pages fetched at once.
    pub concurrency: usize,
    /// Proxy URLs rotated per request. Empty means direct.
    pub proxies: Vec<String>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// User agent for listing requests.
    pub user_agent: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["software engineer".to_string()],
            location: "Remote".to_string(),
            platforms: Platform::ALL.to_vec(),
            max_jobs_per_platform: 100,
            posted_within: PostedWithin::Week,
            job_type: JobType::Any,
            experience_level: ExperienceLevel::Any,
            concurrency: 3,
            proxies: Vec::new(),
            request_timeout_ms: 90_000,
            user_agent: concat!("jobpilot-scout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ScoutConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keywords.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the sites to search.
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Set the per-site cap.
    pub fn with_max_jobs_per_platform(mut self, max: usize) -> Self {
        self.max_jobs_per_platform = max;
        self
    }

    /// Set the recency filter.
    pub fn with_posted_within(mut self, posted_within: PostedWithin) -> Self {
        self.posted_within = posted_within;
        self
    }

    /// Set the employment type filter.
    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    /// Set the seniority filter.
    pub fn with_experience_level(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = level;
        self
    }

    /// Set the fetch concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the proxy rotation.
    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Keywords as one query string.
    pub fn query(&self) -> String {
        self.keywords.join(" ")
    }

    /// Results pages planned per site.
    pub fn pages_needed(&self) -> usize {
        self.max_jobs_per_platform.div_ceil(JOBS_PER_PAGE_ESTIMATE)
    }

    /// Upper bound on HTTP requests for one crawl.
    pub fn request_cap(&self) -> usize {
        self.pages_needed() * self.platforms.len() * ATTEMPTS_PER_PAGE
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
