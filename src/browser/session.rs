//! The crawl's browser session handle.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Page, SessionLauncher};
use crate::config::Settings;
use crate::debug_capture::DebugCapture;
use crate::error::{BrowserError, BrowserResult};
use crate::retry::RetryPolicy;

/// Process-wide crawl state: the page plus the knobs every component needs.
///
/// Passed explicitly to each component. [`CrawlSession::close`] consumes the
/// handle, so a session can only be released once.
pub struct CrawlSession {
    page: Box<dyn Page>,
    base_url: String,
    page_timeout: Duration,
    settle_delay: Duration,
    retry: RetryPolicy,
    debug: Option<DebugCapture>,
}

impl CrawlSession {
    /// Start a browser through `launcher` and wrap its page.
    pub async fn open(launcher: &dyn SessionLauncher, settings: &Settings) -> BrowserResult<Self> {
        let page = launcher.launch().await?;
        info!("Browser session opened for {}", settings.base_url);
        Ok(Self::from_page(page, settings))
    }

    pub fn from_page(page: Box<dyn Page>, settings: &Settings) -> Self {
        Self {
            page,
            base_url: settings.base_url.clone(),
            page_timeout: settings.page_timeout(),
            settle_delay: settings.settle_delay(),
            retry: settings.retry_policy(),
            debug: settings
                .debug
                .then(|| DebugCapture::new(&settings.debug_dir, settings.debug_keep)),
        }
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.is_some()
    }

    /// Let the SPA render after a navigation or interaction.
    pub async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    /// Navigate once, bounded by the page timeout, then settle.
    pub async fn navigate(&self, url: &str) -> BrowserResult<()> {
        match tokio::time::timeout(self.page_timeout, self.page.goto(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BrowserError::Timeout {
                    operation: format!("navigate to {}", url),
                    seconds: self.page_timeout.as_secs(),
                })
            }
        }
        self.settle().await;
        Ok(())
    }

    /// Navigate under the session's retry policy.
    pub async fn navigate_with_retry(&self, url: &str) -> BrowserResult<()> {
        self.retry
            .run(&format!("navigate to {}", url), || self.navigate(url))
            .await
    }

    pub async fn current_url(&self) -> String {
        self.page.current_url().await.unwrap_or_default()
    }

    /// Write a DOM snapshot and screenshot when debug capture is on.
    pub async fn capture(&self, stage: &str) {
        let Some(ref capture) = self.debug else {
            return;
        };
        match capture.capture(self.page(), stage).await {
            Ok(paths) => debug!("Debug capture {}: {} files", stage, paths.len()),
            Err(e) => warn!("Debug capture {} failed: {}", stage, e),
        }
    }

    /// Release the browser.
    pub async fn close(self) {
        match self.page.close().await {
            Ok(()) => info!("Browser session closed"),
            Err(e) => warn!("Browser session close failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDocument, ScriptedLauncher, ScriptedPage};

    #[tokio::test]
    async fn test_navigate_retries_then_fails() {
        let page = ScriptedPage::new();
        page.fail_navigation("https://dir.example.com/employee/9");
        let settings = Settings::immediate("unused");
        let session = CrawlSession::open(&ScriptedLauncher::new(page.clone()), &settings)
            .await
            .unwrap();

        let err = session
            .navigate_with_retry("https://dir.example.com/employee/9")
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Timeout { .. }));
        assert_eq!(page.navigations().len(), 3);

        session.close().await;
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn test_navigate_lands_on_document() {
        let page = ScriptedPage::new();
        page.add_document("https://dir.example.com/", ScriptedDocument::new("Directory"));
        let session = CrawlSession::from_page(Box::new(page.clone()), &Settings::immediate("unused"));

        session.navigate("https://dir.example.com/").await.unwrap();
        assert_eq!(session.current_url().await, "https://dir.example.com/");
        assert!(!session.debug_enabled());
    }

    #[tokio::test]
    async fn test_broken_launcher() {
        let settings = Settings::immediate("unused");
        let result = CrawlSession::open(&ScriptedLauncher::broken(), &settings).await;
        assert!(matches!(result, Err(BrowserError::Launch(_))));
    }
}
