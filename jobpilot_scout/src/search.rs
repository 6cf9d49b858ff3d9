//! Search URL builders and listing URL canonicalization.

use crate::config::{ExperienceLevel, JobType, Platform, ScoutConfig};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One results page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Site searched.
    pub platform: Platform,
    /// Zero-based page index.
    pub page: usize,
    /// Results page URL.
    pub url: String,
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Every results page a crawl should fetch, site by site.
pub fn plan(config: &ScoutConfig) -> Vec<SearchPage> {
    let pages = config.pages_needed();
    let mut planned = Vec::with_capacity(pages * config.platforms.len());

    for platform in &config.platforms {
        if planned.iter().any(|p: &SearchPage| p.platform == *platform) {
            continue;
        }
        for page in 0..pages {
            planned.push(SearchPage {
                platform: *platform,
                page,
                url: search_url(*platform, config, page),
            });
        }
    }

    planned
}

/// Results page URL for a site and zero-based page index.
pub fn search_url(platform: Platform, config: &ScoutConfig, page: usize) -> String {
    let query = encode(&config.query());
    let location = encode(&config.location);
    let days = config.posted_within.days();

    match platform {
        Platform::Linkedin => {
            let mut url = format!(
                "https://www.linkedin.com/jobs/search/?keywords={}&location={}&start={}",
                query,
                location,
                page * 25
            );
            if let Some(days) = days {
                url.push_str(&format!("&f_TPR=r{}", days * 86_400));
            }
            let job_type = match config.job_type {
                JobType::Any => None,
                JobType::FullTime => Some("F"),
                JobType::PartTime => Some("P"),
                JobType::Contract => Some("C"),
                JobType::Internship => Some("I"),
            };
            if let Some(code) = job_type {
                url.push_str("&f_JT=");
                url.push_str(code);
            }
            let level = match config.experience_level {
                ExperienceLevel::Any => None,
                ExperienceLevel::Entry => Some(2),
                ExperienceLevel::Mid => Some(3),
                ExperienceLevel::Senior => Some(4),
                ExperienceLevel::Executive => Some(5),
            };
            if let Some(level) = level {
                url.push_str(&format!("&f_E={}", level));
            }
            url
        }
        Platform::Indeed => {
            let mut url = format!(
                "https://www.indeed.com/jobs?q={}&l={}&start={}",
                query,
                location,
                page * 10
            );
            if let Some(days) = days {
                url.push_str(&format!("&fromage={}", days));
            }
            if let Some(kind) = job_type_slug(config.job_type) {
                url.push_str("&jt=");
                url.push_str(kind);
            }
            url
        }
        Platform::SimplyHired => {
            let mut url = format!(
                "https://www.simplyhired.com/search?q={}&l={}&pn={}",
                query,
                location,
                page + 1
            );
            if let Some(days) = days {
                url.push_str(&format!("&fdb={}", days));
            }
            if let Some(kind) = job_type_slug(config.job_type) {
                url.push_str("&fjt=");
                url.push_str(kind);
            }
            url
        }
    }
}

fn job_type_slug(job_type: JobType) -> Option<&'static str> {
    match job_type {
        JobType::Any => None,
        JobType::FullTime => Some("fulltime"),
        JobType::PartTime => Some("parttime"),
        JobType::Contract => Some("contract"),
        JobType::Internship => Some("internship"),
    }
}

/// Absolute, query-free listing URL for a card link.
pub fn canonical_url(platform: Platform, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let absolute = if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", platform.origin(), href)
    } else {
        format!("{}/{}", platform.origin(), href)
    };
    let end = absolute.find(['?', '#']).unwrap_or(absolute.len());
    Some(absolute[..end].to_string())
}

/// Indeed listings are keyed by their job key.
pub fn indeed_job_url(job_key: &str) -> Option<String> {
    let job_key = job_key.trim();
    (!job_key.is_empty()).then(|| format!("https://www.indeed.com/viewjob?jk={}", encode(job_key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostedWithin;

    fn config() -> ScoutConfig {
        ScoutConfig::default()
            .with_keywords(["rust", "engineer"])
            .with_location("New York, NY")
    }

    #[test]
    fn test_linkedin_url_filters() {
        let url = search_url(
            Platform::Linkedin,
            &config()
                .with_job_type(JobType::Contract)
                .with_experience_level(ExperienceLevel::Senior),
            2,
        );
        assert_eq!(
            url,
            "https://www.linkedin.com/jobs/search/?keywords=rust%20engineer&location=New%20York%2C%20NY&start=50&f_TPR=r604800&f_JT=C&f_E=4"
        );
    }

    #[test]
    fn test_indeed_url_filters() {
        let url = search_url(
            Platform::Indeed,
            &config()
                .with_posted_within(PostedWithin::Day)
                .with_job_type(JobType::FullTime),
            1,
        );
        assert_eq!(
            url,
            "https://www.indeed.com/jobs?q=rust%20engineer&l=New%20York%2C%20NY&start=10&fromage=1&jt=fulltime"
        );
    }

    #[test]
    fn test_simplyhired_pages_are_one_based() {
        let url = search_url(
            Platform::SimplyHired,
            &config().with_posted_within(PostedWithin::Any),
            0,
        );
        assert_eq!(
            url,
            "https://www.simplyhired.com/search?q=rust%20engineer&l=New%20York%2C%20NY&pn=1"
        );
    }

    #[test]
    fn test_plan_covers_each_platform_once() {
        let config = config()
            .with_max_jobs_per_platform(30)
            .with_platforms(vec![Platform::Indeed, Platform::Linkedin, Platform::Indeed]);
        let pages = plan(&config);
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0].platform, Platform::Indeed);
        assert_eq!(pages[1].page, 1);
        assert_eq!(pages[2].platform, Platform::Linkedin);
    }

    #[test]
    fn test_canonical_url() {
        assert_eq!(
            canonical_url(
                Platform::Linkedin,
                "https://www.linkedin.com/jobs/view/rust-dev-123?refId=abc&trackingId=x"
            )
            .as_deref(),
            Some("https://www.linkedin.com/jobs/view/rust-dev-123")
        );
        assert_eq!(
            canonical_url(Platform::SimplyHired, "/job/AbC?q=rust").as_deref(),
            Some("https://www.simplyhired.com/job/AbC")
        );
        assert_eq!(canonical_url(Platform::Linkedin, "  "), None);
        assert_eq!(
            indeed_job_url("3f2a").as_deref(),
            Some("https://www.indeed.com/viewjob?jk=3f2a")
        );
        assert_eq!(indeed_job_url(""), None);
    }
}
