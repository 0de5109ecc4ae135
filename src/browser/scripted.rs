//! In-memory page model driven through the same traits as the real browser.
//!
//! A `ScriptedPage` holds a small site: documents keyed by URL, each with a
//! title, body text and elements registered under the exact selectors the
//! crawler queries. It supports an optional login gate, scroll-revealed
//! elements, navigation failures and fetchable resources, and records what was
//! navigated, fetched and filled so callers can assert on it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Element, FetchedResource, Page, SessionLauncher};
use crate::error::{BrowserError, BrowserResult};

/// Bytes returned for full-page screenshots.
pub const PAGE_SCREENSHOT: &[u8] = b"\x89PNG\r\n\x1a\nscripted-page";

/// What happens when an element is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Navigate(String),
    /// Check the filled credentials against the login gate; on success mark
    /// the session authenticated and go to `next`, otherwise back to the
    /// login page.
    SubmitLogin { next: String },
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedElement {
    text: String,
    attrs: BTreeMap<String, String>,
    children: Vec<(String, ScriptedElement)>,
    on_click: Option<ClickAction>,
    appears_after_scrolls: usize,
    image: Option<Vec<u8>>,
}

impl ScriptedElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// An anchor with text and href.
    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self::text(text).with_attr("href", href)
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, selector: impl Into<String>, child: ScriptedElement) -> Self {
        self.children.push((selector.into(), child));
        self
    }

    pub fn on_click(mut self, action: ClickAction) -> Self {
        self.on_click = Some(action);
        self
    }

    /// Only present once the page has been scrolled `n` times.
    pub fn after_scrolls(mut self, n: usize) -> Self {
        self.appears_after_scrolls = n;
        self
    }

    /// Pixels returned by an element screenshot.
    pub fn with_image(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.image = Some(bytes.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedDocument {
    title: String,
    body_text: String,
    elements: Vec<(String, ScriptedElement)>,
    requires_login: bool,
}

impl ScriptedDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    pub fn element(mut self, selector: impl Into<String>, element: ScriptedElement) -> Self {
        self.elements.push((selector.into(), element));
        self
    }

    /// Redirect to the login page until the session is authenticated.
    pub fn gated(mut self) -> Self {
        self.requires_login = true;
        self
    }
}

#[derive(Debug, Clone)]
struct LoginGate {
    login_url: String,
    identifier_selector: String,
    identifier: String,
    secret_selector: String,
    secret: String,
}

#[derive(Default)]
struct State {
    documents: HashMap<String, ScriptedDocument>,
    current: Option<String>,
    scrolls: usize,
    authenticated: bool,
    gate: Option<LoginGate>,
    failing: HashSet<String>,
    resources: HashMap<String, FetchedResource>,
    navigations: Vec<String>,
    fetches: Vec<String>,
    scroll_calls: usize,
    filled: HashMap<String, String>,
    closes: usize,
}

impl State {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.navigations.push(url.to_string());
        if self.failing.contains(url) {
            return Err(BrowserError::Timeout {
                operation: format!("navigate to {}", url),
                seconds: 30,
            });
        }
        let doc = self
            .documents
            .get(url)
            .ok_or_else(|| BrowserError::Navigation {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            })?;

        let target = match self.gate {
            Some(ref gate) if doc.requires_login && !self.authenticated => gate.login_url.clone(),
            _ => url.to_string(),
        };
        self.current = Some(target);
        self.scrolls = 0;
        Ok(())
    }

    fn document(&self) -> Option<&ScriptedDocument> {
        self.current.as_ref().and_then(|url| self.documents.get(url))
    }

    fn submit_login(&mut self, next: &str) -> BrowserResult<()> {
        let Some(gate) = self.gate.clone() else {
            return self.navigate(next);
        };
        let matches = |selector: &str, expected: &str| {
            self.filled.get(selector).map(String::as_str) == Some(expected)
        };
        if matches(&gate.identifier_selector, &gate.identifier)
            && matches(&gate.secret_selector, &gate.secret)
        {
            self.authenticated = true;
            self.navigate(next)
        } else {
            self.navigate(&gate.login_url)
        }
    }
}

/// Scripted page. Clones share the same state.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub fn add_document(&self, url: impl Into<String>, document: ScriptedDocument) -> &Self {
        self.state().documents.insert(url.into(), document);
        self
    }

    /// Gate documents marked [`ScriptedDocument::gated`] behind `login_url`.
    pub fn require_login(
        &self,
        login_url: impl Into<String>,
        identifier_selector: impl Into<String>,
        identifier: impl Into<String>,
        secret_selector: impl Into<String>,
        secret: impl Into<String>,
    ) -> &Self {
        self.state().gate = Some(LoginGate {
            login_url: login_url.into(),
            identifier_selector: identifier_selector.into(),
            identifier: identifier.into(),
            secret_selector: secret_selector.into(),
            secret: secret.into(),
        });
        self
    }

    /// Navigation to `url` times out.
    pub fn fail_navigation(&self, url: impl Into<String>) -> &Self {
        self.state().failing.insert(url.into());
        self
    }

    pub fn add_resource(
        &self,
        url: impl Into<String>,
        status: u16,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> &Self {
        let url = url.into();
        self.state().resources.insert(
            url.clone(),
            FetchedResource {
                url,
                status,
                content_type: content_type.into(),
                data: data.into(),
            },
        );
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches.len()
    }

    pub fn scroll_calls(&self) -> usize {
        self.state().scroll_calls
    }

    pub fn filled(&self, selector: &str) -> Option<String> {
        self.state().filled.get(selector).cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().authenticated
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    fn handles(&self, elements: Vec<(String, ScriptedElement)>) -> Vec<Box<dyn Element>> {
        elements
            .into_iter()
            .map(|(selector, element)| {
                Box::new(ScriptedHandle {
                    state: Arc::clone(&self.state),
                    selector,
                    element,
                }) as Box<dyn Element>
            })
            .collect()
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.state().navigate(url)
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self
            .state()
            .current
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> BrowserResult<String> {
        Ok(self
            .state()
            .document()
            .map(|doc| doc.title.clone())
            .unwrap_or_default())
    }

    async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>> {
        let matched = {
            let state = self.state();
            let scrolls = state.scrolls;
            state
                .document()
                .map(|doc| {
                    doc.elements
                        .iter()
                        .filter(|(sel, el)| sel == selector && el.appears_after_scrolls <= scrolls)
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        Ok(self.handles(matched))
    }

    async fn body_text(&self) -> BrowserResult<String> {
        Ok(self
            .state()
            .document()
            .map(|doc| doc.body_text.clone())
            .unwrap_or_default())
    }

    async fn content(&self) -> BrowserResult<String> {
        let state = self.state();
        let (title, body) = state
            .document()
            .map(|doc| (doc.title.clone(), doc.body_text.clone()))
            .unwrap_or_default();
        Ok(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        let mut state = self.state();
        state.scrolls += 1;
        state.scroll_calls += 1;
        Ok(())
    }

    async fn scroll_to_top(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        Ok(PAGE_SCREENSHOT.to_vec())
    }

    async fn fetch_bytes(&self, url: &str) -> BrowserResult<FetchedResource> {
        let mut state = self.state();
        state.fetches.push(url.to_string());
        Ok(state
            .resources
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchedResource {
                url: url.to_string(),
                status: 404,
                content_type: "text/html".to_string(),
                data: Vec::new(),
            }))
    }

    async fn close(&self) -> BrowserResult<()> {
        self.state().closes += 1;
        Ok(())
    }
}

struct ScriptedHandle {
    state: Arc<Mutex<State>>,
    selector: String,
    element: ScriptedElement,
}

#[async_trait]
impl Element for ScriptedHandle {
    async fn text(&self) -> BrowserResult<String> {
        Ok(self.element.text.clone())
    }

    async fn attr(&self, name: &str) -> BrowserResult<Option<String>> {
        Ok(self.element.attrs.get(name).cloned())
    }

    async fn query(&self, selector: &str) -> BrowserResult<Vec<Box<dyn Element>>> {
        Ok(self
            .element
            .children
            .iter()
            .filter(|(sel, _)| sel == selector)
            .map(|(sel, child)| {
                Box::new(ScriptedHandle {
                    state: Arc::clone(&self.state),
                    selector: sel.clone(),
                    element: child.clone(),
                }) as Box<dyn Element>
            })
            .collect())
    }

    async fn click(&self) -> BrowserResult<()> {
        let mut state = lock(&self.state);
        match self.element.on_click {
            Some(ClickAction::Navigate(ref url)) => state.navigate(url),
            Some(ClickAction::SubmitLogin { ref next }) => state.submit_login(next),
            None => Ok(()),
        }
    }

    async fn fill(&self, value: &str) -> BrowserResult<()> {
        lock(&self.state)
            .filled
            .insert(self.selector.clone(), value.to_string());
        Ok(())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        self.element
            .image
            .clone()
            .ok_or_else(|| BrowserError::Protocol(format!("{} has no rendered box", self.selector)))
    }
}

/// Hands out clones of one scripted page, or fails to launch.
pub struct ScriptedLauncher {
    page: Option<ScriptedPage>,
}

impl ScriptedLauncher {
    pub fn new(page: ScriptedPage) -> Self {
        Self { page: Some(page) }
    }

    /// A launcher whose browser never starts.
    pub fn broken() -> Self {
        Self { page: None }
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn Page>> {
        match self.page {
            Some(ref page) => Ok(Box::new(page.clone())),
            None => Err(BrowserError::Launch("scripted browser unavailable".to_string())),
        }
    }
}
