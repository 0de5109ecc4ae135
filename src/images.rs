//! Profile image acquisition.
//!
//! Images are fetched from inside the page so the directory's session
//! cookies apply. When that fails the rendered photo element is screenshotted
//! instead. Files are named after the person's record file, so a second run
//! finds the existing file and makes no request at all, and namesakes with
//! separate records keep separate photos.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::browser::{CrawlSession, FetchedResource, Page};
use crate::config::{Settings, IMAGES_SUBDIR};
use crate::extract::fields::IMAGE_SELECTORS;
use crate::storage::{existing_image, image_extension, image_stem, relative_web_path, write_atomic};

pub struct ImageAcquirer {
    images_dir: PathBuf,
    enabled: bool,
}

impl ImageAcquirer {
    pub fn new(images_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            images_dir: images_dir.into(),
            enabled,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.images_dir(), settings.download_images)
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Store the photo for the record saved as `{record_stem}.json` and return
    /// its site-relative path.
    ///
    /// The session must still be on the person's profile page for the
    /// screenshot fallback to find the photo.
    pub async fn acquire(
        &self,
        session: &CrawlSession,
        image_url: Option<&str>,
        record_stem: &str,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let stem = image_stem(record_stem);
        if let Some(existing) = existing_image(&self.images_dir, &stem) {
            debug!("Image for {} already present: {}", record_stem, existing.display());
            return existing
                .file_name()
                .map(|name| relative_web_path(IMAGES_SUBDIR, &name.to_string_lossy()));
        }

        if let Some(url) = image_url {
            match self.fetch(session, url).await {
                Some(resource) => {
                    let ext = image_extension(&resource.content_type, &resource.data);
                    if let Some(path) = self.store(&stem, ext, &resource.data) {
                        info!("Downloaded image for {}: {}", record_stem, path);
                        return Some(path);
                    }
                }
                None => debug!("Falling back to screenshot for {}", record_stem),
            }
        }

        self.screenshot(session.page(), &stem, record_stem).await
    }

    async fn fetch(&self, session: &CrawlSession, url: &str) -> Option<FetchedResource> {
        let page = session.page();
        let resource = match session
            .retry()
            .run(&format!("fetch {}", url), || page.fetch_bytes(url))
            .await
        {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Image fetch {} failed: {}", url, e);
                return None;
            }
        };

        if !resource.is_ok() {
            warn!("Image fetch {} returned HTTP {}", url, resource.status);
            return None;
        }
        if !resource.is_image() {
            warn!("Image fetch {} returned {}", url, resource.content_type);
            return None;
        }
        if resource.data.is_empty() {
            warn!("Image fetch {} returned no data", url);
            return None;
        }
        Some(resource)
    }

    async fn screenshot(&self, page: &dyn Page, stem: &str, record_stem: &str) -> Option<String> {
        for selector in IMAGE_SELECTORS {
            let Ok(Some(element)) = page.query_first(selector).await else {
                continue;
            };
            match element.screenshot().await {
                Ok(png) if !png.is_empty() => {
                    let path = self.store(stem, "png", &png)?;
                    info!("Captured image for {} by screenshot: {}", record_stem, path);
                    return Some(path);
                }
                Ok(_) => continue,
                Err(e) => debug!("Screenshot of {} failed: {}", selector, e),
            }
        }
        warn!("No image captured for {}", record_stem);
        None
    }

    fn store(&self, stem: &str, ext: &str, data: &[u8]) -> Option<String> {
        let file_name = format!("{}.{}", stem, ext);
        match write_atomic(&self.images_dir.join(&file_name), data) {
            Ok(()) => Some(relative_web_path(IMAGES_SUBDIR, &file_name)),
            Err(e) => {
                warn!("Failed to write image {}: {}", file_name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDocument, ScriptedElement, ScriptedPage};
    use tempfile::tempdir;

    const PROFILE: &str = "https://dir.example.com/employee/1";
    const PHOTO: &str = "https://dir.example.com/api/image/1";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    async fn on_profile(doc: ScriptedDocument) -> (ScriptedPage, CrawlSession) {
        let page = ScriptedPage::new();
        page.add_document(PROFILE, doc);
        let session = CrawlSession::from_page(Box::new(page.clone()), &Settings::immediate("unused"));
        session.navigate(PROFILE).await.unwrap();
        (page, session)
    }

    #[tokio::test]
    async fn test_fetch_then_idempotent() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile")).await;
        page.add_resource(PHOTO, 200, "image/png", PNG);
        let acquirer = ImageAcquirer::new(dir.path(), true);

        let first = acquirer.acquire(&session, Some(PHOTO), "Ada Lovelace").await;
        assert_eq!(first.as_deref(), Some("assets/images/Ada_Lovelace_profile.png"));
        assert_eq!(page.fetch_count(), 1);
        assert!(dir.path().join("Ada_Lovelace_profile.png").is_file());

        let second = acquirer.acquire(&session, Some(PHOTO), "Ada Lovelace").await;
        assert_eq!(second, first);
        assert_eq!(page.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_extension_sniffed_when_type_is_generic() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile")).await;
        page.add_resource(PHOTO, 200, "image/*", PNG);
        let acquirer = ImageAcquirer::new(dir.path(), true);

        let path = acquirer.acquire(&session, Some(PHOTO), "Grace Hopper").await;
        assert_eq!(path.as_deref(), Some("assets/images/Grace_Hopper_profile.png"));
    }

    #[tokio::test]
    async fn test_screenshot_fallback_on_login_page_response() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile").element(
            IMAGE_SELECTORS[1],
            ScriptedElement::new()
                .with_attr("src", "/api/image/1")
                .with_image(PNG),
        ))
        .await;
        page.add_resource(PHOTO, 200, "text/html", b"<html>sign in</html>".to_vec());
        let acquirer = ImageAcquirer::new(dir.path(), true);

        let path = acquirer.acquire(&session, Some(PHOTO), "Ada Lovelace").await;
        assert_eq!(path.as_deref(), Some("assets/images/Ada_Lovelace_profile.png"));
        assert_eq!(page.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_capture() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile")).await;
        let acquirer = ImageAcquirer::new(dir.path(), true);

        assert_eq!(acquirer.acquire(&session, Some(PHOTO), "Ada").await, None);
        assert_eq!(page.fetch_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_makes_no_requests() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile")).await;
        let acquirer = ImageAcquirer::new(dir.path(), false);

        assert_eq!(acquirer.acquire(&session, Some(PHOTO), "Ada").await, None);
        assert_eq!(page.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_namesakes_keep_their_own_photos() {
        let dir = tempdir().unwrap();
        let (page, session) = on_profile(ScriptedDocument::new("Profile")).await;
        let other = "https://dir.example.com/api/image/2";
        page.add_resource(PHOTO, 200, "image/png", PNG);
        page.add_resource(other, 200, "image/jpeg", b"\xff\xd8\xff\xe0jfif".to_vec());
        let acquirer = ImageAcquirer::new(dir.path(), true);

        let first = acquirer.acquire(&session, Some(PHOTO), "Sam_Lee").await;
        let second = acquirer.acquire(&session, Some(other), "Sam_Lee_2").await;

        assert_eq!(first.as_deref(), Some("assets/images/Sam_Lee_profile.png"));
        assert_eq!(second.as_deref(), Some("assets/images/Sam_Lee_2_profile.jpg"));
        assert_eq!(page.fetch_count(), 2);
        assert_eq!(std::fs::read(dir.path().join("Sam_Lee_profile.png")).unwrap(), PNG);
    }
}
