//! Error types for the crawl engine.
//!
//! `CrawlError` is the only error that escapes the orchestrator. Field-level
//! and profile-level failures are absorbed where they happen and only show up
//! in logs and in the crawl summary counts.

use thiserror::Error;

/// Errors raised by the browser automation layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unavailable,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::Timeout { .. }
                | BrowserError::Navigation { .. }
                | BrowserError::Fetch { .. }
                | BrowserError::Protocol(_)
        )
    }
}

/// Errors resolving login credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credentials found (set STAFFCRAWL_EMAIL/STAFFCRAWL_PASSWORD or provide a credentials file)")]
    NotFound,

    #[error("Failed to read credentials file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Credential prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Errors writing artifacts to disk.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist temporary file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("No free record file name for {0}")]
    NameExhausted(String),
}

/// Fatal, session-level crawl failures.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Failed to start browser session: {0}")]
    SessionStart(#[source] BrowserError),

    #[error("Authentication impossible: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Login form field not found: {0}")]
    LoginFormMissing(String),

    #[error("Login rejected: still on a login page at {0}")]
    LoginRejected(String),

    #[error("Failed to load directory listing: {0}")]
    Listing(#[source] BrowserError),

    #[error("No profile links found on the directory listing (selectors may be stale)")]
    NoProfiles,

    #[error("No valid records extracted from {0} discovered profiles (markup may have changed)")]
    NoValidRecords(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
