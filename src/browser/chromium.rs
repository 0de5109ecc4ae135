//! chromiumoxide (CDP) implementation of the page-query capability.

use async_trait::async_trait;

use super::{BrowserEngineConfig, Page, SessionLauncher};
#[cfg(not(feature = "browser"))]
use crate::error::BrowserError;
use crate::error::BrowserResult;

#[cfg(feature = "browser")]
pub use enabled::{ChromiumElement, ChromiumPage};

/// Launches (or connects to) Chrome and opens one tab.
pub struct ChromiumLauncher {
    config: BrowserEngineConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn Page>> {
        let page = enabled::ChromiumPage::open(&self.config).await?;
        Ok(Box::new(page))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn Page>> {
        let _ = &self.config;
        Err(BrowserError::Unavailable)
    }
}

/// In-page fetch returning base64 so binary bodies survive the CDP round trip.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn fetch_script(url: &str) -> String {
    let url = serde_json::to_string(url).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
        (async () => {{
            try {{
                const response = await fetch({url}, {{
                    method: 'GET',
                    credentials: 'include',
                    headers: {{ 'Accept': 'image/*, */*' }}
                }});
                const contentType = response.headers.get('content-type') || 'application/octet-stream';
                if (!response.ok) {{
                    return {{ status: response.status, contentType: contentType, data: '' }};
                }}
                const bytes = new Uint8Array(await (await response.blob()).arrayBuffer());
                let binary = '';
                for (let i = 0; i < bytes.length; i++) {{
                    binary += String.fromCharCode(bytes[i]);
                }}
                return {{ status: response.status, contentType: contentType, data: btoa(binary) }};
            }} catch (e) {{
                return {{ error: e.toString() }};
            }}
        }})()
        "#
    )
}

#[cfg(feature = "browser")]
mod enabled {
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
    use chromiumoxide::page::ScreenshotParams;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::fetch_script;
    use crate::browser::{BrowserEngineConfig, Element, FetchedResource, Page};
    use crate::error::{BrowserError, BrowserResult};

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Windows
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ];

    const PATH_COMMANDS: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "microsoft-edge",
    ];

    fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
        BrowserError::Protocol(e.to_string())
    }

    fn find_chrome(config: &BrowserEngineConfig) -> BrowserResult<PathBuf> {
        if let Some(ref explicit) = config.chrome_executable {
            let expanded = shellexpand::tilde(explicit);
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in PATH_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(BrowserError::Launch(
            "Chrome/Chromium not found. Install it or set browser.chrome_executable".to_string(),
        ))
    }

    fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }

    /// A live Chrome tab plus the browser that owns it.
    pub struct ChromiumPage {
        page: chromiumoxide::Page,
        browser: Mutex<Option<Browser>>,
        handler: JoinHandle<()>,
        timeout: Duration,
        /// Attached to a browser we did not start; leave it running on close.
        remote: bool,
    }

    impl ChromiumPage {
        pub(super) async fn open(config: &BrowserEngineConfig) -> BrowserResult<Self> {
            let (browser, handler) = match config.remote_url {
                Some(ref remote) => connect_remote(config, remote).await?,
                None => launch_local(config).await?,
            };
            let handler = spawn_handler(handler);

            let page = browser.new_page("about:blank").await.map_err(protocol)?;
            page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
                .await
                .map_err(protocol)?;

            Ok(Self {
                page,
                browser: Mutex::new(Some(browser)),
                handler,
                timeout: Duration::from_secs(config.timeout),
                remote: config.remote_url.is_some(),
            })
        }

        async fn bounded<T, F>(&self, operation: &str, fut: F) -> BrowserResult<T>
        where
            F: std::future::Future<Output = Result<T, chromiumoxide::error::CdpError>>,
        {
            match tokio::time::timeout(self.timeout, fut).await {
                Ok(result) => result.map_err(protocol),
                Err(_) => Err(BrowserError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }),
            }
        }

        async fn evaluate_value(&self, script: &str) -> BrowserResult<serde_json::Value> {
            let result = self
                .bounded("evaluate", self.page.evaluate(script.to_string()))
                .await?;
            result
                .into_value::<serde_json::Value>()
                .map_err(|e| BrowserError::Protocol(format!("Failed to parse script result: {}", e)))
        }
    }

    async fn launch_local(
        config: &BrowserEngineConfig,
    ) -> BrowserResult<(Browser, chromiumoxide::Handler)> {
        info!("Launching browser (headless={})", config.headless);
        let chrome_path = find_chrome(config)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.viewport_width, config.viewport_height)
            .request_timeout(Duration::from_secs(config.timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("Failed to build browser config: {}", e)))?;

        Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))
    }

    async fn connect_remote(
        config: &BrowserEngineConfig,
        url: &str,
    ) -> BrowserResult<(Browser, chromiumoxide::Handler)> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, config.timeout
        );

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
        let launch_err = |e: reqwest::Error| BrowserError::Launch(e.to_string());

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(launch_err)?
            .json()
            .await
            .map_err(launch_err)?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::Launch("No webSocketDebuggerUrl in response".into()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.timeout),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))
    }

    fn wrap(elements: Vec<chromiumoxide::Element>) -> Vec<Box<dyn Element>> {
        elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn Element>)
            .collect()
    }

    #[async_trait]
    impl Page for ChromiumPage {
        async fn goto(&self, url: &str) -> BrowserResult<()> {
            debug!("Navigating to {}", url);
            match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
                Err(_) => Err(BrowserError::Timeout {
                    operation: format!("navigate to {}", url),
                    seconds: self.timeout.as_secs(),
                }),
            }
        }

        async fn current_url(&self) -> BrowserResult<String> {
            Ok(self
                .bounded("url", self.page.url())
                .await?
                .unwrap_or_default())
        }

        async fn title(&self) -> BrowserResult<String> {
            Ok(self
                .bounded("title", self.page.get_title())
                .await?
                .unwrap_or_default())
        }

        async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>> {
            // No match is reported as an error by CDP; treat it as an empty set.
            match tokio::time::timeout(self.timeout, self.page.find_elements(selector)).await {
                Ok(Ok(elements)) => Ok(wrap(elements)),
                Ok(Err(e)) => {
                    debug!("Selector {} matched nothing: {}", selector, e);
                    Ok(Vec::new())
                }
                Err(_) => Err(BrowserError::Timeout {
                    operation: format!("query {}", selector),
                    seconds: self.timeout.as_secs(),
                }),
            }
        }

        async fn body_text(&self) -> BrowserResult<String> {
            let value = self
                .evaluate_value("document.body ? document.body.innerText : ''")
                .await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn content(&self) -> BrowserResult<String> {
            self.bounded("content", self.page.content()).await
        }

        async fn scroll_to_bottom(&self) -> BrowserResult<()> {
            self.evaluate_value("window.scrollTo(0, document.body.scrollHeight); true")
                .await
                .map(|_| ())
        }

        async fn scroll_to_top(&self) -> BrowserResult<()> {
            self.evaluate_value("window.scrollTo(0, 0); true")
                .await
                .map(|_| ())
        }

        async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
            let params = ScreenshotParams::builder().full_page(true).build();
            self.bounded("screenshot", self.page.screenshot(params)).await
        }

        async fn fetch_bytes(&self, url: &str) -> BrowserResult<FetchedResource> {
            debug!("Fetching {} through the page session", url);
            let result = self.evaluate_value(&fetch_script(url)).await?;

            if let Some(error) = result.get("error").and_then(|e| e.as_str()) {
                return Err(BrowserError::Fetch {
                    url: url.to_string(),
                    reason: error.to_string(),
                });
            }

            let status = result.get("status").and_then(|s| s.as_u64()).unwrap_or(0) as u16;
            let content_type = result
                .get("contentType")
                .and_then(|c| c.as_str())
                .unwrap_or("application/octet-stream")
                .to_string();
            let data_b64 = result.get("data").and_then(|d| d.as_str()).unwrap_or("");
            let data = base64::engine::general_purpose::STANDARD
                .decode(data_b64)
                .map_err(|e| BrowserError::Fetch {
                    url: url.to_string(),
                    reason: format!("Failed to decode base64 data: {}", e),
                })?;

            Ok(FetchedResource {
                url: url.to_string(),
                status,
                content_type,
                data,
            })
        }

        async fn close(&self) -> BrowserResult<()> {
            if let Err(e) = self.page.clone().close().await {
                debug!("Page close failed: {}", e);
            }
            if let Some(mut browser) = self.browser.lock().await.take() {
                if !self.remote {
                    if let Err(e) = browser.close().await {
                        warn!("Browser close failed: {}", e);
                    }
                    let _ = browser.wait().await;
                }
            }
            self.handler.abort();
            Ok(())
        }
    }

    /// A chromiumoxide element handle.
    pub struct ChromiumElement {
        element: chromiumoxide::Element,
    }

    #[async_trait]
    impl Element for ChromiumElement {
        async fn text(&self) -> BrowserResult<String> {
            Ok(self
                .element
                .inner_text()
                .await
                .map_err(protocol)?
                .unwrap_or_default())
        }

        async fn attr(&self, name: &str) -> BrowserResult<Option<String>> {
            self.element.attribute(name).await.map_err(protocol)
        }

        async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>> {
            match self.element.find_elements(selector).await {
                Ok(elements) => Ok(wrap(elements)),
                Err(_) => Ok(Vec::new()),
            }
        }

        async fn click(&self) -> BrowserResult<()> {
            self.element.click().await.map_err(protocol)?;
            Ok(())
        }

        async fn fill(&self, value: &str) -> BrowserResult<()> {
            self.element.click().await.map_err(protocol)?;
            self.element.type_str(value).await.map_err(protocol)?;
            Ok(())
        }

        async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
            self.element
                .screenshot(CaptureScreenshotFormat::Png)
                .await
                .map_err(protocol)
        }
    }
}
