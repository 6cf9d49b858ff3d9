//! Chrome implementation of the browser driver.
//!
//! Each job gets its own CDP browser context so cookies never leak from one
//! application into the next. Element targets are resolved in page script,
//! which lets text-match targets (`button:has-text("Apply")`) work alongside
//! plain CSS.

use crate::actions::ElementTarget;
use crate::driver::{BrowserDriver, DriverPage, SessionContext};
use crate::error::{Error, Result};
use crate::model::Cookie;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::storage::SetCookiesParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Clickable elements searched by text targets without a tag.
const CLICKABLE: &str = r#"a, button, [role="button"], input[type="submit"], input[type="button"]"#;

/// Launch settings for the Chrome driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport width.
    pub window_width: u32,
    /// Viewport height.
    pub window_height: u32,
    /// Explicit Chrome binary.
    pub executable: Option<PathBuf>,
    /// Connect to a running browser instead of launching one.
    pub remote_url: Option<String>,
    /// CDP request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 900,
            executable: None,
            remote_url: None,
            request_timeout_ms: 30_000,
        }
    }
}

/// Chrome-backed [`BrowserDriver`].
pub struct ChromeDriver {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch (or connect to) Chrome and start polling its CDP handler.
    pub async fn launch(settings: &ChromeSettings) -> Result<Self> {
        let (browser, mut handler) = match settings.remote_url.as_deref() {
            Some(url) => Browser::connect(url).await?,
            None => {
                let mut builder = BrowserConfig::builder()
                    .window_size(settings.window_width, settings.window_height)
                    .request_timeout(Duration::from_millis(settings.request_timeout_ms));
                if !settings.headless {
                    builder = builder.with_head();
                }
                if let Some(path) = settings.executable.as_ref() {
                    builder = builder.chrome_executable(path);
                }
                let config = builder.build().map_err(Error::Browser)?;
                Browser::launch(config).await?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    match e {
                        CdpError::Ws(_)
                        | CdpError::LaunchExit(_, _)
                        | CdpError::LaunchTimeout(_)
                        | CdpError::LaunchIo(_, _) => break,
                        _ => continue,
                    }
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    /// Close the browser and stop the handler task.
    pub async fn shutdown(self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Browser close failed: {e}");
        }
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn new_context(&self) -> Result<Box<dyn SessionContext>> {
        let mut params = CreateBrowserContextParams::default();
        params.dispose_on_detach = Some(true);
        let response = self.browser.execute(params).await?;
        Ok(Box::new(ChromeContext {
            browser: self.browser.clone(),
            id: response.result.browser_context_id,
            pages: Vec::new(),
        }))
    }
}

/// One isolated CDP browser context.
struct ChromeContext {
    browser: Arc<Browser>,
    id: BrowserContextId,
    pages: Vec<Page>,
}

/// Convert an exported cookie into a CDP cookie parameter.
fn to_cookie_param(cookie: &Cookie) -> Result<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.as_str())
        .value(cookie.value.as_str())
        .domain(cookie.domain.as_str())
        .path(cookie.path.as_deref().unwrap_or("/"));

    if let Some(secure) = cookie.secure {
        builder = builder.secure(secure);
    }
    if let Some(http_only) = cookie.http_only {
        builder = builder.http_only(http_only);
    }
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    let same_site = match cookie.same_site.as_deref().map(str::to_ascii_lowercase) {
        Some(s) if s == "strict" => Some(CookieSameSite::Strict),
        Some(s) if s == "lax" => Some(CookieSameSite::Lax),
        Some(s) if s == "none" || s == "no_restriction" => Some(CookieSameSite::None),
        _ => None,
    };
    if let Some(same_site) = same_site {
        builder = builder.same_site(same_site);
    }

    builder.build().map_err(Error::Browser)
}

/// `Storage.setCookies` for one context. `Network.setCookies` has no
/// context parameter and would land in the default profile.
fn set_cookies_command(context: &BrowserContextId, cookies: &[Cookie]) -> Result<SetCookiesParams> {
    let params = cookies
        .iter()
        .map(to_cookie_param)
        .collect::<Result<Vec<_>>>()?;
    let mut cmd = SetCookiesParams::new(params);
    cmd.browser_context_id = Some(context.clone());
    Ok(cmd)
}

#[async_trait]
impl SessionContext for ChromeContext {
    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<()> {
        let cmd = set_cookies_command(&self.id, cookies)?;
        self.browser.execute(cmd).await?;
        Ok(())
    }

    async fn new_page(&mut self) -> Result<Box<dyn DriverPage>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(Error::Browser)?;
        let page = self.browser.new_page(params).await?;
        self.pages.push(page.clone());
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromeContext { browser, id, pages } = *self;
        for page in pages {
            if let Err(e) = page.close().await {
                log::debug!("Page close failed: {e}");
            }
        }
        browser.dispose_browser_context(id).await?;
        Ok(())
    }
}

/// A page inside a [`ChromeContext`].
struct ChromePage {
    page: Page,
}

/// Script expression resolving a target to an element or `null`.
fn resolve_expr(target: &ElementTarget) -> String {
    let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    match target {
        ElementTarget::Css(selector) => format!(
            "(() => {{ try {{ return document.querySelector({}); }} catch (e) {{ return null; }} }})()",
            quote(selector)
        ),
        ElementTarget::Text { tag, text } => {
            let scope = if tag.is_empty() { CLICKABLE } else { tag.as_str() };
            format!(
                r#"(() => {{
                    const needle = {};
                    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
                    return Array.from(document.querySelectorAll({}))
                        .find((el) => visible(el) && (el.innerText || el.textContent || el.value || '').includes(needle)) || null;
                }})()"#,
                quote(text),
                quote(scope)
            )
        }
    }
}

impl ChromePage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(Error::Json)
    }
}

#[async_trait]
impl DriverPage for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(res) => {
                res?;
                Ok(())
            }
            Err(_) => Err(Error::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn exists(&self, target: &ElementTarget) -> Result<bool> {
        self.eval(format!("{} !== null", resolve_expr(target))).await
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<()> {
        let value = serde_json::to_string(value)?;
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.scrollIntoView({{ block: 'center' }});
                el.focus();
                const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
                    : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
                    : HTMLInputElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value');
                if (setter && setter.set) {{ setter.set.call(el, {value}); }} else {{ el.value = {value}; }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            resolve_expr(target)
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(Error::ElementNotFound(target.to_string()))
        }
    }

    async fn click(&self, target: &ElementTarget) -> Result<()> {
        if let ElementTarget::Css(selector) = target {
            // real mouse events first, script click as a fallback
            if let Ok(element) = self.page.find_element(selector.as_str()).await {
                if element.click().await.is_ok() {
                    return Ok(());
                }
            }
        }
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return true;
            }})()"#,
            resolve_expr(target)
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(Error::ElementNotFound(target.to_string()))
        }
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn text_content(&self) -> Result<String> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }
}
