//! A scripted directory site for end-to-end crawl tests.

#![allow(dead_code)]

use std::path::Path;

use staffcrawl::auth::{IDENTIFIER_INPUT, SECRET_INPUT, SUBMIT_BUTTON};
use staffcrawl::browser::scripted::{ClickAction, ScriptedDocument, ScriptedElement, ScriptedPage};
use staffcrawl::config::{Settings, INDEX_FILENAME};
use staffcrawl::credentials::{Credentials, StaticCredentials};
use staffcrawl::extract::fields::IMAGE_SELECTORS;

pub const ORIGIN: &str = "https://dir.example.com";
pub const LISTING: &str = "https://dir.example.com/employees/1/all-employees";
pub const LOGIN: &str = "https://login.microsoftonline.com/common/oauth2/authorize";
pub const LOGIN_SECRET: &str = "https://login.microsoftonline.com/common/login";
pub const EMAIL: &str = "crawler@example.com";
pub const PASSWORD: &str = "correct horse";

const LINK_SELECTOR: &str = r#"a[href*="employee/"]"#;

/// Builds a login-gated directory with a listing and profile pages.
pub struct DirectorySite {
    page: ScriptedPage,
    listing: ScriptedDocument,
}

impl DirectorySite {
    pub fn new() -> Self {
        let page = ScriptedPage::new();
        page.add_document(
            LOGIN,
            ScriptedDocument::new("Sign in to your account")
                .element(IDENTIFIER_INPUT, ScriptedElement::new())
                .element(
                    SUBMIT_BUTTON,
                    ScriptedElement::new().on_click(ClickAction::Navigate(LOGIN_SECRET.to_string())),
                ),
        )
        .add_document(
            LOGIN_SECRET,
            ScriptedDocument::new("Enter password")
                .element(SECRET_INPUT, ScriptedElement::new())
                .element(
                    SUBMIT_BUTTON,
                    ScriptedElement::new().on_click(ClickAction::SubmitLogin {
                        next: LISTING.to_string(),
                    }),
                ),
        )
        .require_login(LOGIN, IDENTIFIER_INPUT, EMAIL, SECRET_INPUT, PASSWORD);

        Self {
            page,
            listing: ScriptedDocument::new("All Employees").gated(),
        }
    }

    /// Listed person with a reachable profile.
    pub fn person(self, id: u32, name: &str, email: &str) -> Self {
        self.add_person(id, name, email, None)
    }

    /// Listed person whose profile shows a photo served as `content_type`.
    pub fn person_with_photo(
        self,
        id: u32,
        name: &str,
        email: &str,
        content_type: &str,
        photo: &[u8],
    ) -> Self {
        self.add_person(id, name, email, Some((content_type, photo)))
    }

    fn add_person(mut self, id: u32, name: &str, email: &str, photo: Option<(&str, &[u8])>) -> Self {
        let path = format!("/employee/{}", id);
        self.listing = self
            .listing
            .element(LINK_SELECTOR, ScriptedElement::link(name, path.clone()));

        let mut profile = ScriptedDocument::new(name)
            .body(format!("{}\nArchitect\n{}", name, email))
            .element("h1", ScriptedElement::text(name))
            .element(
                r#"span[data-kafieldname="title"]"#,
                ScriptedElement::text("Architect"),
            );
        if !email.is_empty() {
            profile = profile.element(
                r#"a[href^="mailto:"]"#,
                ScriptedElement::link("Email", format!("mailto:{}", email)),
            );
        }
        if let Some((content_type, bytes)) = photo {
            let src = format!("/api/image/{}", id);
            profile = profile.element(
                IMAGE_SELECTORS[1],
                ScriptedElement::new().with_attr("src", src.clone()),
            );
            self.page
                .add_resource(format!("{}{}", ORIGIN, src), 200, content_type, bytes.to_vec());
        }
        self.page.add_document(format!("{}{}", ORIGIN, path), profile.gated());
        self
    }

    /// Listed person whose profile never loads.
    pub fn unreachable(mut self, id: u32, name: &str) -> Self {
        let path = format!("/employee/{}", id);
        self.listing = self
            .listing
            .element(LINK_SELECTOR, ScriptedElement::link(name, path.clone()));
        self.page.fail_navigation(format!("{}{}", ORIGIN, path));
        self
    }

    pub fn build(self) -> ScriptedPage {
        self.page.add_document(LISTING, self.listing);
        self.page
    }
}

pub fn settings(site_root: &Path) -> Settings {
    let mut settings = Settings::immediate(site_root);
    settings.base_url = LISTING.to_string();
    settings
}

pub fn credentials() -> StaticCredentials {
    StaticCredentials(Credentials::new(EMAIL, PASSWORD))
}

/// Image files on disk.
pub fn image_files(settings: &Settings) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(settings.images_dir()) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    files
}

/// Record files on disk, excluding the index.
pub fn record_files(settings: &Settings) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(settings.records_dir()) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".json") && name != INDEX_FILENAME)
        .collect();
    files.sort();
    files
}
