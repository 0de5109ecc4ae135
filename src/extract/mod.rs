//! Per-profile field extraction.
//!
//! Every field has an ordered list of [`Strategy`] values in [`fields`]. The
//! first non-empty result wins and its index is reported in an
//! [`ExtractionOutcome`]. A field that yields nothing stays empty; no single
//! field can abort a profile.

mod composite;
pub mod fields;
pub mod projects;
mod strategy;
mod text;

use tracing::{debug, info, warn};

use crate::browser::{element_attr, element_text, CrawlSession, Page};
use crate::config::Settings;
use crate::models::{ExtractionOutcome, ProfileLink, ProfileRecord, RecentPost};

pub use composite::{education, licenses, partition, EDUCATION_ARITY, LICENSE_ARITY};
pub use strategy::{first_match, Strategy};
pub use text::{clean_text, host_of, is_personal_website, normalize_location, resolve_url};

pub struct FieldExtractor {
    profile_path_marker: String,
}

impl FieldExtractor {
    pub fn new(profile_path_marker: impl Into<String>) -> Self {
        Self {
            profile_path_marker: profile_path_marker.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.profile_path_marker.clone())
    }

    /// Visit `link` and read its record.
    ///
    /// `None` when the page cannot be reached or the site redirected away
    /// from the profile.
    pub async fn extract(
        &self,
        session: &CrawlSession,
        link: &ProfileLink,
    ) -> Option<(ProfileRecord, Vec<ExtractionOutcome>)> {
        info!("Scraping profile: {}", link.name);
        if let Err(e) = session.navigate_with_retry(&link.url).await {
            warn!("Navigation to {} failed: {}", link.url, e);
            return None;
        }

        let landed = session.current_url().await;
        if !landed.contains(&self.profile_path_marker) {
            warn!("{} redirected to {}", link.url, landed);
            return None;
        }
        if session.debug_enabled() {
            session.capture(&format!("profile_{}", link.name)).await;
        }

        let page = session.page();
        let body = page.body_text().await.unwrap_or_default();
        let mut record = ProfileRecord::new(&link.url);
        let mut outcomes = Vec::new();
        let mut reader = FieldReader {
            page,
            body: &body,
            outcomes: &mut outcomes,
        };

        let scraped_name = reader.read("name", fields::NAME).await;
        record.name = match clean_text(&link.name) {
            listed if !listed.is_empty() => listed,
            _ => scraped_name.unwrap_or_default(),
        };
        record.position = reader.read("position", fields::POSITION).await.unwrap_or_default();
        record.department = reader.read("department", fields::DEPARTMENT).await.unwrap_or_default();
        record.bio = reader.read("bio", fields::BIO).await.unwrap_or_default();
        record.email = reader.read("email", fields::EMAIL).await.unwrap_or_default();
        record.phone = reader.read("phone", fields::PHONE).await.unwrap_or_default();
        record.mobile = reader.read("mobile", fields::MOBILE).await.unwrap_or_default();

        let office = match reader.read("office_location", fields::OFFICE_LOCATION).await {
            Some(office) => Some(office),
            None => link.office_location.clone().filter(|hint| !hint.trim().is_empty()),
        };
        record.office_location = office.map(|o| normalize_location(&o)).unwrap_or_default();

        record.years_with_firm = reader
            .read("years_with_firm", fields::YEARS_WITH_FIRM)
            .await
            .and_then(|years| text::leading_number(&years));
        record.teams_url = reader.read("teams_url", fields::TEAMS).await.unwrap_or_default();
        record.linkedin_url = reader.read("linkedin_url", fields::LINKEDIN).await.unwrap_or_default();
        record.website_url = website_url(page, host_of(&landed).as_deref()).await.unwrap_or_default();

        record.image_url = reader
            .read("image_url", fields::IMAGE)
            .await
            .and_then(|src| resolve_url(&landed, &src))
            .or_else(|| link.thumbnail_url.clone());

        record.memberships = texts(page, fields::MEMBERSHIP_PILLS).await;
        record.education = education(&cell_values(page, fields::EDUCATION_VALUES).await);
        record.licenses = licenses(&cell_values(page, fields::LICENSE_VALUES).await);
        record.recent_posts = recent_posts(page, &landed).await;
        record.projects = projects::read_projects(session, &landed).await;

        for outcome in &outcomes {
            debug!("{}: {}", link.name, outcome);
        }
        info!(
            "Found: {} | {} | {}",
            non_empty_or(&record.email, "No email"),
            non_empty_or(&record.phone, "No phone"),
            non_empty_or(&record.position, "No position"),
        );
        Some((record, outcomes))
    }
}

/// Runs strategy lists against one page and keeps the outcomes.
struct FieldReader<'a> {
    page: &'a dyn Page,
    body: &'a str,
    outcomes: &'a mut Vec<ExtractionOutcome>,
}

impl FieldReader<'_> {
    async fn read(&mut self, field: &'static str, strategies: &[Strategy]) -> Option<String> {
        match first_match(strategies, self.page, self.body).await {
            Some((index, value)) => {
                self.outcomes
                    .push(ExtractionOutcome::found(field, value.clone(), index));
                Some(value)
            }
            None => {
                self.outcomes.push(ExtractionOutcome::missing(field));
                None
            }
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Non-empty cleaned texts of every match.
async fn texts(page: &dyn Page, selector: &str) -> Vec<String> {
    let mut out = Vec::new();
    for element in page.query(selector).await.unwrap_or_default() {
        let text = clean_text(&element_text(element.as_ref()).await);
        if !text.is_empty() {
            out.push(text);
        }
    }
    out
}

/// Cleaned texts of every match, blanks kept so grid positions line up.
async fn cell_values(page: &dyn Page, selector: &str) -> Vec<String> {
    let mut out = Vec::new();
    for element in page.query(selector).await.unwrap_or_default() {
        out.push(clean_text(&element_text(element.as_ref()).await));
    }
    out
}

async fn website_url(page: &dyn Page, directory_host: Option<&str>) -> Option<String> {
    for link in page.query(fields::EXTERNAL_LINK).await.unwrap_or_default() {
        if let Some(href) = element_attr(link.as_ref(), "href").await {
            if is_personal_website(&href, directory_host) {
                return Some(href);
            }
        }
    }
    None
}

async fn recent_posts(page: &dyn Page, base: &str) -> Vec<RecentPost> {
    let mut posts = Vec::new();
    for link in page.query(fields::POST_LINK).await.unwrap_or_default() {
        let titled = match link.query(fields::POST_TITLE).await {
            Ok(titles) => match titles.first() {
                Some(title) => clean_text(&element_text(title.as_ref()).await),
                None => String::new(),
            },
            Err(_) => String::new(),
        };
        let title = if titled.is_empty() {
            clean_text(&element_text(link.as_ref()).await)
        } else {
            titled
        };
        if title.is_empty() {
            continue;
        }
        let url = element_attr(link.as_ref(), "href")
            .await
            .and_then(|href| resolve_url(base, &href))
            .unwrap_or_default();
        posts.push(RecentPost { title, url });
    }
    posts
}
