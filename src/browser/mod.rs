//! Browser session management and the page-query capability.
//!
//! The crawl never embeds extraction scripts. It drives a page through the
//! [`Page`] and [`Element`] traits: query by CSS selector, read text and
//! attributes, click, fill, screenshot. [`chromium`] implements them over
//! chromiumoxide (CDP); [`scripted`] implements them over an in-memory site
//! model for offline runs and tests.

pub mod chromium;
mod config;
pub mod scripted;
mod session;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BrowserError, BrowserResult};

pub use config::BrowserEngineConfig;
pub use session::CrawlSession;

/// Poll interval for [`Page::wait_for`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Response from an authenticated in-page fetch.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FetchedResource {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_image(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("image")
    }
}

/// A handle to one DOM element.
#[async_trait]
pub trait Element: Send + Sync {
    /// Rendered text, empty when the element has none.
    async fn text(&self) -> BrowserResult<String>;

    async fn attr(&self, name: &str) -> BrowserResult<Option<String>>;

    /// Descendants matching `selector`.
    async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>>;

    async fn click(&self) -> BrowserResult<()>;

    /// Focus the element and type `value` into it.
    async fn fill(&self, value: &str) -> BrowserResult<()>;

    /// PNG capture cropped to the element's bounding box.
    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;
}

/// A single browser tab.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    async fn current_url(&self) -> BrowserResult<String>;

    async fn title(&self) -> BrowserResult<String>;

    async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>>;

    /// Visible text of the whole document.
    async fn body_text(&self) -> BrowserResult<String>;

    /// Serialized DOM.
    async fn content(&self) -> BrowserResult<String>;

    async fn scroll_to_bottom(&self) -> BrowserResult<()>;

    async fn scroll_to_top(&self) -> BrowserResult<()>;

    /// Full-page PNG screenshot.
    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;

    /// Fetch `url` from inside the page so the session's cookies apply.
    ///
    /// HTTP error statuses are returned as responses; only transport
    /// failures are errors.
    async fn fetch_bytes(&self, url: &str) -> BrowserResult<FetchedResource>;

    /// Release the tab and its browser.
    async fn close(&self) -> BrowserResult<()>;

    async fn query_first(&self, selector: &str) -> BrowserResult<Option<Box<dyn Element>>> {
        Ok(self.query(selector).await?.into_iter().next())
    }

    async fn count(&self, selector: &str) -> BrowserResult<usize> {
        Ok(self.query(selector).await?.len())
    }

    /// Poll for `selector` until it matches or `timeout` elapses.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> BrowserResult<Box<dyn Element>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.query_first(selector).await? {
                return Ok(element);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(BrowserError::ElementNotFound(selector.to_string()));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Starts a browser and hands back its page.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> BrowserResult<Box<dyn Page>>;
}

/// Text of an element, trimmed; errors read as empty.
pub async fn element_text(element: &dyn Element) -> String {
    element
        .text()
        .await
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

/// Attribute of an element, trimmed and non-empty; errors read as absent.
pub async fn element_attr(element: &dyn Element, name: &str) -> Option<String> {
    element
        .attr(name)
        .await
        .ok()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
