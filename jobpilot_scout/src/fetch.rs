//! Results page fetching.

use crate::config::ScoutConfig;
use crate::error::ScoutError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of results page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body.
    async fn fetch(&self, url: &str) -> Result<String, ScoutError>;
}

/// HTTP fetcher rotating across configured proxies.
pub struct HttpFetcher {
    clients: Vec<reqwest::Client>,
    next: AtomicUsize,
}

impl HttpFetcher {
    /// One client per proxy, or a single direct client without proxies.
    pub fn new(config: &ScoutConfig) -> Result<Self, ScoutError> {
        let builder = || {
            reqwest::Client::builder()
                .user_agent(config.user_agent.as_str())
                .timeout(config.request_timeout())
        };

        let clients = if config.proxies.is_empty() {
            vec![builder().build()?]
        } else {
            config
                .proxies
                .iter()
                .map(|url| {
                    let proxy = reqwest::Proxy::all(url).map_err(|e| ScoutError::Proxy {
                        url: url.clone(),
                        detail: e.to_string(),
                    })?;
                    Ok(builder().proxy(proxy).build()?)
                })
                .collect::<Result<Vec<_>, ScoutError>>()?
        };

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of rotation slots.
    pub fn pool_size(&self) -> usize {
        self.clients.len()
    }

    fn client(&self) -> &reqwest::Client {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[slot]
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScoutError> {
        let response = self.client().get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}
