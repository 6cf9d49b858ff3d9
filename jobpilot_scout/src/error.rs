use thiserror::Error;

/// Discovery errors.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Listing page answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested page.
        url: String,
        /// Response status.
        status: u16,
    },
    /// A card selector failed to parse.
    #[error("invalid selector {selector}: {detail}")]
    Selector {
        /// Selector text.
        selector: &'static str,
        /// Parser message.
        detail: String,
    },
    /// A proxy URL was rejected.
    #[error("invalid proxy {url}: {detail}")]
    Proxy {
        /// Proxy URL.
        url: String,
        /// Builder message.
        detail: String,
    },
    /// Unknown platform name in the configuration.
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    /// Nothing to search.
    #[error("no platforms selected")]
    NoPlatforms,
    /// The per-crawl request budget is spent.
    #[error("request cap of {0} reached")]
    RequestCapReached(usize),
}
