//! Listing card extraction from results pages.

use crate::config::Platform;
use crate::error::ScoutError;
use crate::search::{canonical_url, indeed_job_url};
use scraper::{ElementRef, Html, Selector};

/// Fields read off one results card, before canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCard {
    /// Title text.
    pub title: String,
    /// Company text.
    pub company: String,
    /// Location text.
    pub location: String,
    /// Link to the listing, possibly relative.
    pub href: Option<String>,
    /// Site-specific job key (Indeed `data-jk`).
    pub job_key: Option<String>,
    /// Salary snippet.
    pub salary: Option<String>,
    /// Description snippet.
    pub snippet: Option<String>,
    /// Posting date, `datetime` attribute preferred.
    pub posted_date: Option<String>,
}

impl ListingCard {
    /// Canonical URL used as the dedupe key.
    pub fn canonical_url(&self, platform: Platform) -> Option<String> {
        match platform {
            Platform::Indeed => self.job_key.as_deref().and_then(indeed_job_url),
            _ => self
                .href
                .as_deref()
                .and_then(|href| canonical_url(platform, href)),
        }
    }
}

struct SelectorSpec {
    card: &'static str,
    title: &'static str,
    company: &'static str,
    location: &'static str,
    link: &'static str,
    salary: Option<&'static str>,
    snippet: Option<&'static str>,
    posted: Option<&'static str>,
}

const LINKEDIN: SelectorSpec = SelectorSpec {
    card: ".jobs-search__results-list li, .base-card",
    title: ".base-search-card__title, .job-card-list__title",
    company: ".base-search-card__subtitle, .job-card-container__company-name",
    location: ".job-search-card__location, .job-card-container__metadata-item",
    link: "a.base-card__full-link, a.job-card-list__title",
    salary: None,
    snippet: None,
    posted: Some(".job-search-card__listdate, time"),
};

const INDEED: SelectorSpec = SelectorSpec {
    card: ".job_seen_beacon, .jobsearch-ResultsList > li, .result",
    title: ".jobTitle span, h2.jobTitle a span, .jobtitle",
    company: r#".companyName, .company, [data-testid="company-name"]"#,
    location: r#".companyLocation, .location, [data-testid="text-location"]"#,
    link: "a.jcs-JobTitle, h2.jobTitle a, a.jobtitle",
    salary: Some(r#".salary-snippet, .salaryText, [data-testid="attribute_snippet_testid"]"#),
    snippet: Some(r#".job-snippet, .summary, [data-testid="job-snippet"]"#),
    posted: None,
};

const SIMPLYHIRED: SelectorSpec = SelectorSpec {
    card: r#"[data-testid="searchSerpJob"], .SerpJob, .jobposting-card, article[data-id], li[data-jobkey]"#,
    title: r#"[data-testid="searchSerpJobTitle"], .jobposting-title, h2 a, .SerpJob-title a, a[data-testid="job-title"]"#,
    company: r#"[data-testid="companyName"], .jobposting-company, .SerpJob-company, span[data-testid="company-name"]"#,
    location: r#"[data-testid="searchSerpJobLocation"], .jobposting-location, .SerpJob-location, span[data-testid="job-location"]"#,
    link: r#"a[data-testid="searchSerpJobTitle"], h2 a, .SerpJob-title a, a[data-testid="job-title"]"#,
    salary: Some(r#"[data-testid="searchSerpJobSalary"], .jobposting-salary, .SerpJob-salary"#),
    snippet: Some(".jobposting-snippet, .SerpJob-description"),
    posted: None,
};

struct CardSelectors {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    link: Selector,
    salary: Option<Selector>,
    snippet: Option<Selector>,
    posted: Option<Selector>,
}

fn compile(selector: &'static str) -> Result<Selector, ScoutError> {
    Selector::parse(selector).map_err(|e| ScoutError::Selector {
        selector,
        detail: format!("{:?}", e),
    })
}

fn compile_opt(selector: Option<&'static str>) -> Result<Option<Selector>, ScoutError> {
    selector.map(compile).transpose()
}

impl CardSelectors {
    fn build(spec: &SelectorSpec) -> Result<Self, ScoutError> {
        Ok(Self {
            card: compile(spec.card)?,
            title: compile(spec.title)?,
            company: compile(spec.company)?,
            location: compile(spec.location)?,
            link: compile(spec.link)?,
            salary: compile_opt(spec.salary)?,
            snippet: compile_opt(spec.snippet)?,
            posted: compile_opt(spec.posted)?,
        })
    }
}

/// Compiled card selectors for every supported site.
pub struct CardParser {
    linkedin: CardSelectors,
    indeed: CardSelectors,
    simplyhired: CardSelectors,
}

impl CardParser {
    /// Compile the selector sets.
    pub fn new() -> Result<Self, ScoutError> {
        Ok(Self {
            linkedin: CardSelectors::build(&LINKEDIN)?,
            indeed: CardSelectors::build(&INDEED)?,
            simplyhired: CardSelectors::build(&SIMPLYHIRED)?,
        })
    }

    fn selectors(&self, platform: Platform) -> &CardSelectors {
        match platform {
            Platform::Linkedin => &self.linkedin,
            Platform::Indeed => &self.indeed,
            Platform::SimplyHired => &self.simplyhired,
        }
    }

    /// Cards on a results page, in document order.
    pub fn cards(&self, platform: Platform, html: &str) -> Vec<ListingCard> {
        let document = Html::parse_document(html);
        let s = self.selectors(platform);

        document
            .select(&s.card)
            .map(|card| {
                let link = card.select(&s.link).next();
                ListingCard {
                    title: text_of(&card, &s.title),
                    company: text_of(&card, &s.company),
                    location: text_of(&card, &s.location),
                    href: link.and_then(|a| a.value().attr("href")).map(str::to_string),
                    job_key: card
                        .value()
                        .attr("data-jk")
                        .or_else(|| link.and_then(|a| a.value().attr("data-jk")))
                        .map(str::to_string),
                    salary: s.salary.as_ref().map(|sel| text_of(&card, sel)).filter(|t| !t.is_empty()),
                    snippet: s.snippet.as_ref().map(|sel| text_of(&card, sel)).filter(|t| !t.is_empty()),
                    posted_date: s.posted.as_ref().and_then(|sel| posted_of(&card, sel)),
                }
            })
            .collect()
    }
}

/// Whitespace-normalized text of every match inside `el`.
fn text_of(el: &ElementRef, selector: &Selector) -> String {
    let raw: String = el.select(selector).flat_map(|m| m.text()).collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn posted_of(el: &ElementRef, selector: &Selector) -> Option<String> {
    let first = el.select(selector).next()?;
    first
        .value()
        .attr("datetime")
        .map(str::to_string)
        .or_else(|| {
            let text = first.text().collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
}
