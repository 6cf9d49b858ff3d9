//! The crawl loop.

use crate::config::{Platform, ScoutConfig, ATTEMPTS_PER_PAGE};
use crate::context::ScoutContext;
use crate::error::ScoutError;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::parse::CardParser;
use crate::search::{plan, SearchPage};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use jobpilot::JobRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Searches listing sites and turns result cards into [`JobRecord`]s.
pub struct Scout {
    config: ScoutConfig,
    fetcher: Arc<dyn PageFetcher>,
    parser: CardParser,
}

impl Scout {
    /// Scout fetching over HTTP.
    pub fn new(config: ScoutConfig) -> Result<Self, ScoutError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Scout over a custom page source.
    pub fn with_fetcher(
        config: ScoutConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, ScoutError> {
        Ok(Self {
            config,
            fetcher,
            parser: CardParser::new()?,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    /// Crawl every planned results page and return new listings in page order.
    ///
    /// Pages are fetched `concurrency` at a time; failed pages are retried
    /// while the crawl's request cap allows and are otherwise logged and
    /// skipped. Listings already in `ctx`, or beyond a site's cap, are dropped.
    pub async fn discover(&self, ctx: &mut ScoutContext) -> Result<Vec<JobRecord>, ScoutError> {
        if self.config.platforms.is_empty() {
            return Err(ScoutError::NoPlatforms);
        }

        let pages = plan(&self.config);
        let cap = self.config.request_cap();
        let issued = AtomicUsize::new(0);
        log::info!(
            "Searching {} pages across {} platforms (request cap {})",
            pages.len(),
            self.config.platforms.len(),
            cap
        );

        let max = self.config.max_jobs_per_platform;
        let mut results = stream::iter(pages)
            .map(|page| {
                let issued = &issued;
                async move {
                    let body = self.fetch_page(&page, issued, cap).await;
                    (page, body)
                }
            })
            .buffered(self.config.concurrency.max(1));

        let mut jobs = Vec::new();
        while let Some((page, body)) = results.next().await {
            if ctx.is_full(page.platform, max) {
                continue;
            }
            match body {
                Ok(html) => {
                    let found = self.collect(page.platform, &html, ctx);
                    if found.is_empty() {
                        log::info!("No new {} jobs on page {}", page.platform, page.page + 1);
                    } else {
                        log::info!(
                            "Found {} {} jobs on page {} (total {})",
                            found.len(),
                            page.platform,
                            page.page + 1,
                            ctx.count(page.platform)
                        );
                    }
                    jobs.extend(found);
                }
                Err(e) => log::error!("Request failed: {} ({})", page.url, e),
            }
        }

        for (platform, count) in ctx.counts() {
            log::info!("{}: {} jobs", platform, count);
        }
        log::info!("Discovered {} unique jobs", jobs.len());
        Ok(jobs)
    }

    async fn fetch_page(
        &self,
        page: &SearchPage,
        issued: &AtomicUsize,
        cap: usize,
    ) -> Result<String, ScoutError> {
        let mut last = ScoutError::RequestCapReached(cap);
        for attempt in 1..=ATTEMPTS_PER_PAGE {
            if issued.fetch_add(1, Ordering::SeqCst) >= cap {
                return Err(last);
            }
            match self.fetcher.fetch(&page.url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    log::warn!(
                        "Fetching {} page {} failed (attempt {}): {}",
                        page.platform,
                        page.page + 1,
                        attempt,
                        e
                    );
                    last = e;
                }
            }
        }
        Err(last)
    }

    /// Admit the cards on one results page into `ctx`.
    pub fn collect(&self, platform: Platform, html: &str, ctx: &mut ScoutContext) -> Vec<JobRecord> {
        let max = self.config.max_jobs_per_platform;
        let keywords = self.config.keywords.join(", ");
        let mut jobs = Vec::new();

        for card in self.parser.cards(platform, html) {
            if ctx.is_full(platform, max) {
                break;
            }
            if card.title.is_empty() || card.company.is_empty() {
                continue;
            }
            let Some(url) = card.canonical_url(platform) else {
                continue;
            };
            if !ctx.admit(platform, &url, max) {
                continue;
            }

            jobs.push(JobRecord {
                platform: platform.key().to_string(),
                url,
                title: card.title,
                company: card.company,
                location: card.location,
                salary: card.salary,
                description: card.snippet,
                posted_date: card.posted_date,
                discovered_at: Some(Utc::now()),
                search_keywords: Some(keywords.clone()),
                search_location: Some(self.config.location.clone()),
            });
        }

        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed bodies; unknown URLs fail.
    #[derive(Default)]
    struct FixturePages {
        bodies: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for FixturePages {
        async fn fetch(&self, url: &str) -> Result<String, ScoutError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies.get(url).cloned().ok_or(ScoutError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    fn indeed_card(jk: &str, title: &str) -> String {
        format!(
            r#"<div class="job_seen_beacon" data-jk="{jk}"><h2 class="jobTitle"><a class="jcs-JobTitle"><span>{title}</span></a></h2><span class="companyName">Acme</span></div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<!DOCTYPE html><html><body>{}</body></html>", cards.join(""))
    }

    fn indeed_config(max: usize) -> ScoutConfig {
        ScoutConfig::default()
            .with_keywords(["rust"])
            .with_platforms(vec![Platform::Indeed])
            .with_max_jobs_per_platform(max)
            .with_concurrency(1)
    }

    #[tokio::test]
    async fn test_discover_dedupes_across_pages() {
        let config = indeed_config(30);
        let pages = plan(&config);
        assert_eq!(pages.len(), 2);

        let mut fixtures = FixturePages::default();
        fixtures.bodies.insert(
            pages[0].url.clone(),
            page(&[indeed_card("a1", "Rust Dev"), indeed_card("b2", "Go Dev")]),
        );
        fixtures.bodies.insert(
            pages[1].url.clone(),
            page(&[indeed_card("b2", "Go Dev"), indeed_card("c3", "SRE")]),
        );

        let scout = Scout::with_fetcher(config, Arc::new(fixtures)).unwrap();
        let mut ctx = ScoutContext::new();
        let jobs = scout.discover(&mut ctx).await.unwrap();

        let urls: Vec<&str> = jobs.iter().map(|j| j.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.indeed.com/viewjob?jk=a1",
                "https://www.indeed.com/viewjob?jk=b2",
                "https://www.indeed.com/viewjob?jk=c3",
            ]
        );
        assert_eq!(jobs[0].platform, "indeed");
        assert_eq!(jobs[0].search_keywords.as_deref(), Some("rust"));
        assert_eq!(ctx.count(Platform::Indeed), 3);
    }

    #[tokio::test]
    async fn test_context_carries_across_crawls() {
        let config = indeed_config(10);
        let url = plan(&config)[0].url.clone();
        let mut fixtures = FixturePages::default();
        fixtures
            .bodies
            .insert(url, page(&[indeed_card("a1", "Rust Dev")]));
        let scout = Scout::with_fetcher(config, Arc::new(fixtures)).unwrap();

        let mut ctx = ScoutContext::new();
        assert_eq!(scout.discover(&mut ctx).await.unwrap().len(), 1);
        assert!(scout.discover(&mut ctx).await.unwrap().is_empty());
        assert!(scout.discover(&mut ScoutContext::new()).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_per_platform_cap() {
        let config = indeed_config(2);
        let url = plan(&config)[0].url.clone();
        let mut fixtures = FixturePages::default();
        fixtures.bodies.insert(
            url,
            page(&[
                indeed_card("a1", "One"),
                indeed_card("a2", "Two"),
                indeed_card("a3", "Three"),
            ]),
        );
        let scout = Scout::with_fetcher(config, Arc::new(fixtures)).unwrap();
        let jobs = scout.discover(&mut ScoutContext::new()).await.unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_pages_retry_within_cap() {
        let config = indeed_config(15);
        assert_eq!(config.request_cap(), 3);
        let fixtures = Arc::new(FixturePages::default());
        let scout = Scout::with_fetcher(config, fixtures.clone()).unwrap();

        let jobs = scout.discover(&mut ScoutContext::new()).await.unwrap();
        assert!(jobs.is_empty());
        assert_eq!(fixtures.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_platforms() {
        let config = ScoutConfig::default().with_platforms(vec![]);
        let scout = Scout::with_fetcher(config, Arc::new(FixturePages::default())).unwrap();
        assert!(matches!(
            scout.discover(&mut ScoutContext::new()).await,
            Err(ScoutError::NoPlatforms)
        ));
    }

    #[test]
    fn test_collect_skips_incomplete_cards() {
        let scout = Scout::with_fetcher(indeed_config(10), Arc::new(FixturePages::default())).unwrap();
        let html = page(&[
            r#"<div class="job_seen_beacon" data-jk="x"><h2 class="jobTitle"><span>No company</span></h2></div>"#.to_string(),
            r#"<div class="job_seen_beacon"><h2 class="jobTitle"><span>No key</span></h2><span class="companyName">Acme</span></div>"#.to_string(),
        ]);
        let mut ctx = ScoutContext::new();
        assert!(scout.collect(Platform::Indeed, &html, &mut ctx).is_empty());
        assert_eq!(ctx.total(), 0);
    }
}
