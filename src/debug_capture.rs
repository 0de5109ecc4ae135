//! Diagnostic DOM snapshots and screenshots.
//!
//! Files are written for humans chasing selector drift. Nothing here is ever
//! read back by the crawler.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::browser::Page;
use crate::error::StorageError;
use crate::storage::{sanitize_filename, write_atomic};

const DOM_SUBDIR: &str = "dom_captures";
const SCREENSHOT_SUBDIR: &str = "screenshots";

#[derive(Debug, Clone)]
pub struct DebugCapture {
    dom_dir: PathBuf,
    screenshot_dir: PathBuf,
    keep: usize,
}

impl DebugCapture {
    pub fn new(debug_dir: &Path, keep: usize) -> Self {
        Self {
            dom_dir: debug_dir.join(DOM_SUBDIR),
            screenshot_dir: debug_dir.join(SCREENSHOT_SUBDIR),
            keep,
        }
    }

    /// Dump the current DOM and a full-page screenshot tagged with `stage`.
    ///
    /// Each half is best effort: a failed screenshot still leaves the DOM.
    pub async fn capture(&self, page: &dyn Page, stage: &str) -> Result<Vec<PathBuf>, StorageError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let prefix = sanitize_filename(stage);
        let mut written = Vec::new();

        match page.content().await {
            Ok(html) => {
                let path = self.dom_dir.join(format!("{}_{}.html", prefix, stamp));
                write_atomic(&path, html.as_bytes())?;
                written.push(path);
            }
            Err(e) => debug!("DOM capture for {} skipped: {}", stage, e),
        }

        match page.screenshot().await {
            Ok(png) => {
                let path = self.screenshot_dir.join(format!("{}_{}.png", prefix, stamp));
                write_atomic(&path, &png)?;
                written.push(path);
            }
            Err(e) => debug!("Screenshot for {} skipped: {}", stage, e),
        }

        for dir in [&self.dom_dir, &self.screenshot_dir] {
            if let Err(e) = prune(dir, self.keep) {
                warn!("Failed to prune {}: {}", dir.display(), e);
            }
        }

        Ok(written)
    }
}

/// Delete all but the `keep` most recently modified files in `dir`.
fn prune(dir: &Path, keep: usize) -> std::io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut files: Vec<(std::time::SystemTime, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .collect();

    if files.len() <= keep {
        return Ok(0);
    }

    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    let mut removed = 0;
    for (_, path) in files.into_iter().skip(keep) {
        std::fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}
