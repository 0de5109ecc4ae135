//! Configuration management, using the prefer crate for file discovery.
//!
//! `Settings` is the resolved runtime configuration. `Config` mirrors the
//! on-disk file, where every key is optional and only overrides what it names.
//! Precedence, lowest first: defaults, config file, CLI flags / environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::retry::RetryPolicy;

/// Directory listing the crawler starts from.
pub const DEFAULT_BASE_URL: &str = "https://ei.ennead.com/employees/1/all-employees";

/// Record artifacts, relative to the site root.
pub const RECORDS_SUBDIR: &str = "assets/individual_employees";

/// Downloaded profile images, relative to the site root.
pub const IMAGES_SUBDIR: &str = "assets/images";

/// Index of record file names, inside the records directory.
pub const INDEX_FILENAME: &str = "employee_files_list.json";

/// Resolved runtime settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub base_url: String,
    /// Root of the generated site; artifacts live under `assets/`.
    pub site_root: PathBuf,
    pub debug_dir: PathBuf,
    /// Capture DOM and screenshots at each profile visit.
    pub debug: bool,
    /// Newest debug files kept per folder.
    pub debug_keep: usize,
    pub download_images: bool,
    /// Stop after this many profiles (0/None = all).
    pub max_profiles: Option<usize>,
    pub page_timeout_secs: u64,
    /// Bounded wait for each login form field.
    pub login_wait_secs: u64,
    /// Pause after each navigation for the SPA to render.
    pub settle_delay_ms: u64,
    /// Pause after each listing scroll.
    pub scroll_settle_ms: u64,
    pub max_scroll_iterations: usize,
    /// Fixed sleep between consecutive profile visits.
    pub profile_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Substring every profile URL contains.
    pub profile_path_marker: String,
    pub credentials_file: PathBuf,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            site_root: PathBuf::from("docs"),
            debug_dir: PathBuf::from("debug"),
            debug: false,
            debug_keep: 30,
            download_images: true,
            max_profiles: None,
            page_timeout_secs: 30,
            login_wait_secs: 15,
            settle_delay_ms: 2000,
            scroll_settle_ms: 2000,
            max_scroll_iterations: 20,
            profile_delay_ms: 1000,
            retry_attempts: crate::retry::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: crate::retry::DEFAULT_RETRY_DELAY.as_millis() as u64,
            profile_path_marker: "employee/".to_string(),
            credentials_file: PathBuf::from("credentials.json"),
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Settings rooted at `site_root` with every delay zeroed, for offline runs.
    pub fn immediate(site_root: impl Into<PathBuf>) -> Self {
        let site_root = site_root.into();
        Self {
            debug_dir: site_root.join("debug"),
            site_root,
            login_wait_secs: 0,
            settle_delay_ms: 0,
            scroll_settle_ms: 0,
            profile_delay_ms: 0,
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn records_dir(&self) -> PathBuf {
        self.site_root.join(RECORDS_SUBDIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.site_root.join(IMAGES_SUBDIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.records_dir().join(INDEX_FILENAME)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn login_wait(&self) -> Duration {
        Duration::from_secs(self.login_wait_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn profile_delay(&self) -> Duration {
        Duration::from_millis(self.profile_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    /// Ensure output directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        let mut dirs = vec![(self.records_dir(), "records_dir"), (self.images_dir(), "images_dir")];
        if self.debug {
            dirs.push((self.debug_dir.clone(), "debug_dir"));
        }

        for (dir, label) in dirs {
            #[cfg(unix)]
            Self::log_directory_diagnostics(&dir, label);

            fs::create_dir_all(&dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {} '{}': {}", label, dir.display(), e),
                )
            })?;
        }
        Ok(())
    }

    /// Log diagnostic information about a directory for debugging (Unix only).
    #[cfg(unix)]
    fn log_directory_diagnostics(path: &Path, label: &str) {
        use std::os::unix::fs::MetadataExt;
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };
        tracing::debug!(
            "{} check: path={}, running as uid={} gid={}",
            label,
            path.display(),
            uid,
            gid
        );

        match fs::metadata(path) {
            Ok(meta) => tracing::debug!(
                "{} exists: owner={}:{}, mode={:o}, is_dir={}",
                label,
                meta.uid(),
                meta.gid(),
                meta.mode() & 0o7777,
                meta.is_dir()
            ),
            Err(_) => tracing::debug!("{} does not exist, will attempt to create", label),
        }
    }
}

/// On-disk configuration file (TOML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_keep: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_profiles: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_wait_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_settle_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scroll_iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,

    /// Path to the config file this was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a config file via prefer; fall back to defaults.
    pub async fn load() -> Self {
        match prefer::load("staffcrawl").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref url) = self.base_url {
            settings.base_url = url.clone();
        }
        if let Some(ref root) = self.site_root {
            settings.site_root = self.resolve_path(root, base_dir);
        }
        if let Some(ref dir) = self.debug_dir {
            settings.debug_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref file) = self.credentials_file {
            settings.credentials_file = self.resolve_path(file, base_dir);
        }
        if let Some(debug) = self.debug {
            settings.debug = debug;
        }
        if let Some(keep) = self.debug_keep {
            settings.debug_keep = keep;
        }
        if let Some(download) = self.download_images {
            settings.download_images = download;
        }
        if let Some(limit) = self.max_profiles {
            settings.max_profiles = (limit > 0).then_some(limit);
        }
        if let Some(secs) = self.page_timeout_secs {
            settings.page_timeout_secs = secs;
        }
        if let Some(secs) = self.login_wait_secs {
            settings.login_wait_secs = secs;
        }
        if let Some(ms) = self.settle_delay_ms {
            settings.settle_delay_ms = ms;
        }
        if let Some(ms) = self.scroll_settle_ms {
            settings.scroll_settle_ms = ms;
        }
        if let Some(n) = self.max_scroll_iterations {
            settings.max_scroll_iterations = n;
        }
        if let Some(ms) = self.profile_delay_ms {
            settings.profile_delay_ms = ms;
        }
        if let Some(n) = self.retry_attempts {
            settings.retry_attempts = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            settings.retry_delay_ms = ms;
        }
        if let Some(ref marker) = self.profile_path_marker {
            settings.profile_path_marker = marker.clone();
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths from the working directory instead of the config file.
    pub use_cwd: bool,
}

/// Load settings from the config file layered over defaults.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    if let Some(ref path) = config.source_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    (settings, config)
}
