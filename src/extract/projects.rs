//! Project list extraction.
//!
//! People with many projects get a "Show All" link to a dedicated grid page;
//! the rest show a handful of project links inline, sometimes behind an
//! expandable section.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::text::{clean_text, resolve_url};
use crate::browser::{element_attr, element_text, CrawlSession, Element};
use crate::models::{profile_id_from_url, ProjectDetails, ProjectSource};

pub const SHOW_ALL_LINK: &str = r#"a[href*="/employee-projects/"]"#;
pub const PROJECT_LINK: &str = r#"a[href*="/project/"]"#;
pub const PROJECT_ROW: &str = r#"div[class*="gridViewStyles__HorizontalCell"]"#;
pub const ROW_CELL: &str = r#"td, div[class*="cell"], div[class*="Cell"]"#;

/// Controls that may reveal inline projects when clicked.
pub const EXPAND_CONTROLS: &[&str] = &[
    r#"div[class*="expandable"]"#,
    r#"div[class*="collapsible"]"#,
    r#"div[class*="accordion"]"#,
    r#"button[aria-expanded="false"]"#,
];

/// Scrolls allowed for the project grid to finish lazy loading.
pub const MAX_PROJECT_SCROLLS: usize = 5;

/// Link text this long (and not purely digits) is a project name.
const NAME_MIN_CHARS: usize = 11;

/// Read the projects for the profile at `profile_url`, where the session
/// currently is. The session ends on `profile_url` again.
pub async fn read_projects(
    session: &CrawlSession,
    profile_url: &str,
) -> BTreeMap<String, ProjectDetails> {
    let page = session.page();
    let show_all = match page.query_first(SHOW_ALL_LINK).await {
        Ok(Some(link)) => element_attr(link.as_ref(), "href")
            .await
            .and_then(|href| resolve_url(profile_url, &href)),
        _ => None,
    };

    match show_all {
        Some(projects_url) => {
            let projects = read_show_all(session, &projects_url).await;
            if let Err(e) = session.navigate_with_retry(profile_url).await {
                warn!("Could not return to {} after projects page: {}", profile_url, e);
            }
            projects
        }
        None => {
            let projects = read_inline(session, profile_url).await;
            // An expand control may have been a link.
            let landed = session.current_url().await;
            if landed != profile_url {
                debug!("Projects expansion moved to {}, returning", landed);
                if let Err(e) = session.navigate_with_retry(profile_url).await {
                    warn!("Could not return to {} after expanding projects: {}", profile_url, e);
                }
            }
            projects
        }
    }
}

async fn read_show_all(session: &CrawlSession, projects_url: &str) -> BTreeMap<String, ProjectDetails> {
    info!("Reading projects from {}", projects_url);
    if let Err(e) = session.navigate_with_retry(projects_url).await {
        warn!("Projects page {} failed: {}", projects_url, e);
        return BTreeMap::new();
    }
    let page = session.page();
    if let Err(e) = scroll_rows(session).await {
        debug!("Project grid scroll stopped: {}", e);
    }

    let rows = page.query(PROJECT_ROW).await.unwrap_or_default();
    let mut projects = BTreeMap::new();
    for row in rows {
        if let Some((id, details)) = read_row(row.as_ref(), projects_url).await {
            projects.entry(id).or_insert(details);
        }
    }
    debug!("{} projects on show-all page", projects.len());
    projects
}

async fn scroll_rows(session: &CrawlSession) -> crate::error::BrowserResult<()> {
    let page = session.page();
    let mut previous = page.count(PROJECT_ROW).await?;
    for _ in 0..MAX_PROJECT_SCROLLS {
        page.scroll_to_bottom().await?;
        session.settle().await;
        let current = page.count(PROJECT_ROW).await?;
        if current == previous {
            break;
        }
        previous = current;
    }
    page.scroll_to_top().await
}

async fn read_row(row: &dyn Element, base: &str) -> Option<(String, ProjectDetails)> {
    let links = row.query(PROJECT_LINK).await.ok()?;
    let mut name_link = None;
    let mut number = String::new();
    for link in &links {
        let text = clean_text(&element_text(link.as_ref()).await);
        if text.is_empty() {
            continue;
        }
        if is_project_name(&text) {
            if name_link.is_none() {
                let url = element_attr(link.as_ref(), "href")
                    .await
                    .and_then(|href| resolve_url(base, &href));
                if let Some(url) = url {
                    name_link = Some((text, url));
                }
            }
        } else if number.is_empty() {
            number = text;
        }
    }
    let (name, url) = name_link?;

    let cells = row.query(ROW_CELL).await.unwrap_or_default();
    let cell = |i: usize| cells.get(i);
    if number.is_empty() {
        if let Some(c) = cell(1) {
            let text = clean_text(&element_text(c.as_ref()).await);
            if !is_project_name(&text) {
                number = text;
            }
        }
    }
    let client = match cell(2) {
        Some(c) => clean_text(&element_text(c.as_ref()).await),
        None => String::new(),
    };
    let role = match cell(3) {
        Some(c) => clean_text(&element_text(c.as_ref()).await),
        None => String::new(),
    };

    let details = ProjectDetails {
        name,
        number,
        url,
        role,
        client,
        source: ProjectSource::ShowAllPage,
    };
    Some((project_key(&details), details))
}

async fn read_inline(session: &CrawlSession, profile_url: &str) -> BTreeMap<String, ProjectDetails> {
    let page = session.page();
    if page.count(PROJECT_LINK).await.unwrap_or(0) == 0 {
        expand_projects(session).await;
    }

    // Name and number are separate anchors to the same project.
    let mut grouped: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut order = Vec::new();
    for link in page.query(PROJECT_LINK).await.unwrap_or_default() {
        let Some(url) = element_attr(link.as_ref(), "href")
            .await
            .and_then(|href| resolve_url(profile_url, &href))
        else {
            continue;
        };
        let text = clean_text(&element_text(link.as_ref()).await);
        let entry = grouped.entry(url.clone()).or_insert_with(|| {
            order.push(url);
            (String::new(), String::new())
        });
        if text.is_empty() {
            continue;
        }
        if is_project_name(&text) {
            if entry.0.is_empty() {
                entry.0 = text;
            }
        } else if entry.1.is_empty() {
            entry.1 = text;
        }
    }

    let mut projects = BTreeMap::new();
    for url in order {
        let Some((name, number)) = grouped.remove(&url) else {
            continue;
        };
        let name = if name.is_empty() { number.clone() } else { name };
        if name.is_empty() {
            continue;
        }
        let details = ProjectDetails {
            name,
            number,
            url,
            role: String::new(),
            client: String::new(),
            source: ProjectSource::Inline,
        };
        projects.entry(project_key(&details)).or_insert(details);
    }
    debug!("{} inline projects", projects.len());
    projects
}

/// Click the first expand control that mentions projects.
async fn expand_projects(session: &CrawlSession) {
    let page = session.page();
    for selector in EXPAND_CONTROLS {
        for control in page.query(selector).await.unwrap_or_default() {
            let text = element_text(control.as_ref()).await.to_lowercase();
            if !text.contains("project") {
                continue;
            }
            if control.click().await.is_err() {
                continue;
            }
            session.settle().await;
            if page.count(PROJECT_LINK).await.unwrap_or(0) > 0 {
                debug!("Expanded projects via {}", selector);
                return;
            }
        }
    }
}

fn is_project_name(text: &str) -> bool {
    text.chars().count() >= NAME_MIN_CHARS && !text.chars().all(|c| c.is_ascii_digit())
}

/// Project number when known, else the last segment of its URL.
fn project_key(details: &ProjectDetails) -> String {
    if details.number.is_empty() {
        profile_id_from_url(&details.url)
    } else {
        details.number.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDocument, ScriptedElement, ScriptedPage};
    use crate::config::Settings;

    const PROFILE: &str = "https://dir.example.com/employee/7";
    const PROJECTS: &str = "https://dir.example.com/employee-projects/7";

    fn session(page: &ScriptedPage) -> CrawlSession {
        CrawlSession::from_page(Box::new(page.clone()), &Settings::immediate("unused"))
    }

    fn row(name: &str, number: &str, id: &str, client: &str, role: &str) -> ScriptedElement {
        let href = format!("/project/{}", id);
        ScriptedElement::new()
            .with_child(PROJECT_LINK, ScriptedElement::link(name, href.clone()))
            .with_child(PROJECT_LINK, ScriptedElement::link(number, href))
            .with_child(ROW_CELL, ScriptedElement::text(name))
            .with_child(ROW_CELL, ScriptedElement::text(number))
            .with_child(ROW_CELL, ScriptedElement::text(client))
            .with_child(ROW_CELL, ScriptedElement::text(role))
    }

    #[tokio::test]
    async fn test_show_all_page_and_return() {
        let page = ScriptedPage::new();
        page.add_document(
            PROFILE,
            ScriptedDocument::new("Profile")
                .element(SHOW_ALL_LINK, ScriptedElement::link("Show All", "/employee-projects/7")),
        )
        .add_document(
            PROJECTS,
            ScriptedDocument::new("Projects")
                .element(PROJECT_ROW, row("Central Library Renovation", "2101", "2101", "City of X", "Designer"))
                .element(
                    PROJECT_ROW,
                    row("Riverside Campus Master Plan", "1999", "88", "Univ", "Lead").after_scrolls(1),
                )
                .element(PROJECT_ROW, ScriptedElement::text("header row")),
        );
        let session = session(&page);
        session.navigate(PROFILE).await.unwrap();

        let projects = read_projects(&session, PROFILE).await;

        assert_eq!(projects.len(), 2);
        let library = &projects["2101"];
        assert_eq!(library.name, "Central Library Renovation");
        assert_eq!(library.url, "https://dir.example.com/project/2101");
        assert_eq!(library.client, "City of X");
        assert_eq!(library.role, "Designer");
        assert_eq!(library.source, ProjectSource::ShowAllPage);
        assert!(projects.contains_key("1999"));
        assert_eq!(session.current_url().await, PROFILE);
    }

    #[tokio::test]
    async fn test_failed_projects_page_still_returns() {
        let page = ScriptedPage::new();
        page.add_document(
            PROFILE,
            ScriptedDocument::new("Profile")
                .element(SHOW_ALL_LINK, ScriptedElement::link("Show All", "/employee-projects/7")),
        );
        page.fail_navigation(PROJECTS);
        let session = session(&page);
        session.navigate(PROFILE).await.unwrap();

        let projects = read_projects(&session, PROFILE).await;
        assert!(projects.is_empty());
        assert_eq!(session.current_url().await, PROFILE);
    }

    #[tokio::test]
    async fn test_inline_links_grouped_by_href() {
        let page = ScriptedPage::new();
        page.add_document(
            PROFILE,
            ScriptedDocument::new("Profile")
                .element(PROJECT_LINK, ScriptedElement::link("Central Library Renovation", "/project/2101"))
                .element(PROJECT_LINK, ScriptedElement::link("2101-00", "/project/2101"))
                .element(PROJECT_LINK, ScriptedElement::link("Harbor Pavilion Study", "/project/abc")),
        );
        let session = session(&page);
        session.navigate(PROFILE).await.unwrap();

        let projects = read_projects(&session, PROFILE).await;
        assert_eq!(projects.len(), 2);
        assert_eq!(projects["2101-00"].name, "Central Library Renovation");
        assert_eq!(projects["abc"].number, "");
        assert_eq!(projects["abc"].source, ProjectSource::Inline);
    }

    #[tokio::test]
    async fn test_expand_control_reveals_projects() {
        let page = ScriptedPage::new();
        page.add_document(
            PROFILE,
            ScriptedDocument::new("Profile").element(
                EXPAND_CONTROLS[0],
                ScriptedElement::text("Projects (3)")
                    .on_click(crate::browser::scripted::ClickAction::Navigate(
                        "https://dir.example.com/employee/7?expanded".to_string(),
                    )),
            ),
        )
        .add_document(
            "https://dir.example.com/employee/7?expanded",
            ScriptedDocument::new("Profile")
                .element(PROJECT_LINK, ScriptedElement::link("Harbor Pavilion Study", "/project/abc")),
        );
        let session = session(&page);
        session.navigate(PROFILE).await.unwrap();

        let projects = read_projects(&session, PROFILE).await;
        assert_eq!(projects.len(), 1);
        assert!(projects.contains_key("abc"));
        assert_eq!(session.current_url().await, PROFILE);
        assert_eq!(page.navigations().last().map(String::as_str), Some(PROFILE));
    }
}
