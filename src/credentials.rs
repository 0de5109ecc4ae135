//! Login credential resolution.
//!
//! Order: environment, then a JSON secret file, then an interactive terminal
//! prompt when one is available.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CredentialError;

pub const EMAIL_ENV: &str = "STAFFCRAWL_EMAIL";
pub const PASSWORD_ENV: &str = "STAFFCRAWL_PASSWORD";

/// Login identifier and secret.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(alias = "email")]
    pub identifier: String,
    #[serde(alias = "password")]
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, CredentialError>;
}

/// A fixed pair.
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Environment, then secret files, then prompt.
pub struct ChainedCredentials {
    files: Vec<PathBuf>,
    interactive: bool,
}

impl ChainedCredentials {
    /// Look in `file`, then the per-user config directory.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let mut files = vec![file.into()];
        if let Some(dir) = dirs::config_dir() {
            files.push(dir.join("staffcrawl").join("credentials.json"));
        }
        Self {
            files,
            interactive: console::user_attended(),
        }
    }

    /// Never prompt, even on a terminal.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    fn from_env() -> Option<Credentials> {
        let identifier = std::env::var(EMAIL_ENV).ok()?;
        let secret = std::env::var(PASSWORD_ENV).ok()?;
        Some(Credentials::new(identifier, secret)).filter(Credentials::is_complete)
    }

    fn from_prompt() -> Result<Credentials, CredentialError> {
        let term = console::Term::stderr();
        term.write_line("Directory login required")?;
        term.write_str("Email: ")?;
        let identifier = term.read_line()?;
        term.write_str("Password: ")?;
        let secret = term.read_secure_line()?;
        Ok(Credentials::new(identifier.trim(), secret))
    }
}

/// Read `{"email": ..., "password": ...}`; a missing file is `Ok(None)`.
pub fn read_credentials_file(path: &Path) -> Result<Option<Credentials>, CredentialError> {
    if !path.is_file() {
        return Ok(None);
    }
    let unreadable = |reason: String| CredentialError::Unreadable {
        path: path.display().to_string(),
        reason,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let creds: Credentials = serde_json::from_str(&contents).map_err(|e| unreadable(e.to_string()))?;
    Ok(Some(creds).filter(Credentials::is_complete))
}

#[async_trait]
impl CredentialProvider for ChainedCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        if let Some(creds) = Self::from_env() {
            debug!("Using credentials from environment");
            return Ok(creds);
        }

        for file in &self.files {
            if let Some(creds) = read_credentials_file(file)? {
                info!("Using credentials from {}", file.display());
                return Ok(creds);
            }
        }

        if self.interactive {
            let creds = tokio::task::spawn_blocking(Self::from_prompt)
                .await
                .map_err(|e| CredentialError::Prompt(std::io::Error::other(e)))??;
            if creds.is_complete() {
                return Ok(creds);
            }
        }

        Err(CredentialError::NotFound)
    }
}
