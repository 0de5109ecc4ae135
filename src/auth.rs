//! Scripted form-fill login.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::CrawlSession;
use crate::credentials::CredentialProvider;
use crate::error::CrawlError;

pub const IDENTIFIER_INPUT: &str = r#"input[type="email"]"#;
pub const SECRET_INPUT: &str = r#"input[type="password"]"#;
pub const SUBMIT_BUTTON: &str = r#"input[type="submit"]"#;

/// Case-insensitive substrings marking a login page in its URL or title.
const LOGIN_INDICATORS: &[&str] = &[
    "sign in",
    "login",
    "authentication",
    "microsoft",
    "oauth",
    "password",
    "username",
    "account",
];

/// Whether a URL or title looks like a login page.
pub fn looks_like_login(url: &str, title: &str) -> bool {
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    LOGIN_INDICATORS
        .iter()
        .any(|needle| url.contains(needle) || title.contains(needle))
}

/// Result of [`Authenticator::authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The target loaded without a login page.
    AlreadyAuthenticated,
    /// The form flow ran and the session left the login page.
    LoggedIn,
}

pub struct Authenticator<'a> {
    credentials: &'a dyn CredentialProvider,
    field_wait: Duration,
}

impl<'a> Authenticator<'a> {
    pub fn new(credentials: &'a dyn CredentialProvider, field_wait: Duration) -> Self {
        Self {
            credentials,
            field_wait,
        }
    }

    /// Navigate to `target_url`, logging in first if the site redirects to a
    /// login page. On success the session is back on `target_url`.
    pub async fn authenticate(
        &self,
        session: &CrawlSession,
        target_url: &str,
    ) -> Result<AuthOutcome, CrawlError> {
        info!("Opening {}", target_url);
        session
            .navigate_with_retry(target_url)
            .await
            .map_err(CrawlError::Listing)?;

        if !self.on_login_page(session).await {
            debug!("No login page detected");
            return Ok(AuthOutcome::AlreadyAuthenticated);
        }

        info!("Login page detected, submitting credentials");
        session.capture("login_page").await;
        let creds = self.credentials.credentials().await?;

        self.fill_and_submit(session, IDENTIFIER_INPUT, &creds.identifier)
            .await?;
        self.fill_and_submit(session, SECRET_INPUT, &creds.secret)
            .await?;

        if self.on_login_page(session).await {
            let url = session.current_url().await;
            warn!("Still on login page after submitting credentials: {}", url);
            session.capture("login_rejected").await;
            return Err(CrawlError::LoginRejected(url));
        }

        info!("Login successful");
        session
            .navigate_with_retry(target_url)
            .await
            .map_err(CrawlError::Listing)?;
        Ok(AuthOutcome::LoggedIn)
    }

    async fn on_login_page(&self, session: &CrawlSession) -> bool {
        let url = session.current_url().await;
        let title = session.page().title().await.unwrap_or_default();
        looks_like_login(&url, &title)
    }

    async fn fill_and_submit(
        &self,
        session: &CrawlSession,
        selector: &str,
        value: &str,
    ) -> Result<(), CrawlError> {
        let page = session.page();
        let field = match page.wait_for(selector, self.field_wait).await {
            Ok(field) => field,
            Err(e) => {
                debug!("Waiting for {} failed: {}", selector, e);
                session.capture("login_form_missing").await;
                return Err(CrawlError::LoginFormMissing(selector.to_string()));
            }
        };
        field
            .fill(value)
            .await
            .map_err(|_| CrawlError::LoginFormMissing(selector.to_string()))?;

        let submit = page
            .wait_for(SUBMIT_BUTTON, self.field_wait)
            .await
            .map_err(|_| CrawlError::LoginFormMissing(SUBMIT_BUTTON.to_string()))?;
        submit
            .click()
            .await
            .map_err(|_| CrawlError::LoginFormMissing(SUBMIT_BUTTON.to_string()))?;

        session.settle().await;
        Ok(())
    }
}
