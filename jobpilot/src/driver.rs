//! Browser abstraction the orchestrator drives.
//!
//! A [`BrowserDriver`] hands out isolated [`SessionContext`]s (one per job);
//! each context owns its cookies and the [`DriverPage`]s created from it.
//! The Chrome implementation lives in [`crate::chrome`].

use crate::actions::ElementTarget;
use crate::error::Result;
use crate::model::Cookie;
use async_trait::async_trait;
use std::time::Duration;

/// Polling interval used by default `wait_for` implementations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A browser able to create isolated contexts.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Create a fresh context with no cookies and no pages.
    async fn new_context(&self) -> Result<Box<dyn SessionContext>>;
}

/// An isolated cookie jar plus the pages opened in it.
#[async_trait]
pub trait SessionContext: Send {
    /// Apply every cookie in one call. Called before any page is created.
    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<()>;

    /// Open a blank page in this context.
    async fn new_page(&mut self) -> Result<Box<dyn DriverPage>>;

    /// Close every page and dispose of the context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A single page the agent observes and acts on.
#[async_trait]
pub trait DriverPage: Send + Sync {
    /// Navigate and wait for the DOM to load.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Whether the target currently matches an element.
    async fn exists(&self, target: &ElementTarget) -> Result<bool>;

    /// Set the value of an input, textarea or select.
    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<()>;

    /// Click the first element matching the target.
    async fn click(&self, target: &ElementTarget) -> Result<()>;

    /// Capture a PNG of the viewport or the full page.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    /// Visible text of the document body.
    async fn text_content(&self) -> Result<String>;

    /// Wait until the target matches, up to `timeout`.
    ///
    /// Returns `Ok(false)` when the budget elapses without a match.
    async fn wait_for(&self, target: &ElementTarget, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.exists(target).await.unwrap_or(false) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
