//! Profile link discovery on the infinite-scroll directory listing.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info};

use crate::browser::{element_attr, element_text, CrawlSession, Page};
use crate::config::Settings;
use crate::error::{BrowserResult, CrawlError};
use crate::extract::resolve_url;
use crate::models::ProfileLink;

/// Attribute some listing cards carry with the person's office.
const OFFICE_ATTR: &str = "data-office-location";

pub struct LinkDiscoverer {
    link_selector: String,
    max_iterations: usize,
    scroll_settle: Duration,
}

/// What a discovery pass found.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub links: Vec<ProfileLink>,
    /// Scroll triggers issued before the count stabilized or the cap hit.
    pub iterations: usize,
}

impl LinkDiscoverer {
    pub fn new(profile_path_marker: &str, max_iterations: usize, scroll_settle: Duration) -> Self {
        Self {
            link_selector: format!(r#"a[href*="{}"]"#, profile_path_marker),
            max_iterations: max_iterations.max(1),
            scroll_settle,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.profile_path_marker,
            settings.max_scroll_iterations,
            settings.scroll_settle(),
        )
    }

    pub fn link_selector(&self) -> &str {
        &self.link_selector
    }

    /// Scroll the listing until no new links load, then collect them.
    ///
    /// An empty roster is an error: it means the selectors no longer match.
    pub async fn discover(&self, session: &CrawlSession) -> Result<Discovery, CrawlError> {
        let page = session.page();
        let iterations = self
            .scroll_until_stable(page)
            .await
            .map_err(CrawlError::Listing)?;
        let links = self.collect(page).await.map_err(CrawlError::Listing)?;

        info!(
            "Discovered {} profile links after {} scroll iterations",
            links.len(),
            iterations
        );
        if links.is_empty() {
            session.capture("no_profile_links").await;
            return Err(CrawlError::NoProfiles);
        }
        Ok(Discovery { links, iterations })
    }

    async fn scroll_until_stable(&self, page: &dyn Page) -> BrowserResult<usize> {
        let mut previous = page.count(&self.link_selector).await?;
        debug!("Initial profile link count: {}", previous);

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            page.scroll_to_bottom().await?;
            if !self.scroll_settle.is_zero() {
                tokio::time::sleep(self.scroll_settle).await;
            }
            let current = page.count(&self.link_selector).await?;
            debug!("Scroll {}: {} profile links", iterations, current);
            if current == previous {
                break;
            }
            previous = current;
        }

        page.scroll_to_top().await?;
        Ok(iterations)
    }

    async fn collect(&self, page: &dyn Page) -> BrowserResult<Vec<ProfileLink>> {
        let listing_url = page.current_url().await?;
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in page.query(&self.link_selector).await? {
            let Some(href) = element_attr(anchor.as_ref(), "href").await else {
                continue;
            };
            let name = element_text(anchor.as_ref()).await;
            if !is_name_like(&name) {
                continue;
            }
            let Some(url) = resolve_url(&listing_url, &href) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let mut link = ProfileLink::new(name, url);
            if let Some(img) = anchor.query("img").await.ok().and_then(|v| v.into_iter().next()) {
                link.thumbnail_url = element_attr(img.as_ref(), "src")
                    .await
                    .and_then(|src| resolve_url(&listing_url, &src));
            }
            link.office_location = element_attr(anchor.as_ref(), OFFICE_ATTR).await;
            links.push(link);
        }
        Ok(links)
    }
}

/// Listing anchors also wrap icons and "view" buttons; keep the ones that read like names.
pub fn is_name_like(text: &str) -> bool {
    let text = text.trim();
    let len = text.chars().count();
    (3..50).contains(&len)
        && text.matches(' ').count() <= 3
        && text.chars().next().is_some_and(char::is_uppercase)
}
