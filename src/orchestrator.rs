//! Crawl orchestration.
//!
//! Sequences authentication, link discovery and per-profile extraction over a
//! single browser session. Fatal errors end the crawl; per-profile failures
//! are counted and skipped.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::browser::{CrawlSession, SessionLauncher};
use crate::config::Settings;
use crate::credentials::CredentialProvider;
use crate::discovery::LinkDiscoverer;
use crate::error::CrawlError;
use crate::extract::FieldExtractor;
use crate::images::ImageAcquirer;
use crate::models::ProfileLink;
use crate::persist::{IncrementalPersister, PersistOutcome};

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Authenticating,
    DiscoveringLinks,
    ExtractingProfiles,
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrawlState::Idle => "idle",
            CrawlState::Authenticating => "authenticating",
            CrawlState::DiscoveringLinks => "discovering links",
            CrawlState::ExtractingProfiles => "extracting profiles",
            CrawlState::Summarizing => "summarizing",
            CrawlState::Done => "done",
            CrawlState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a profile produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Navigation failed or the site redirected away from the profile.
    Unreachable,
    /// Extracted, but with neither name nor email.
    Invalid,
}

/// Progress reported while a crawl runs.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    State(CrawlState),
    LinksDiscovered {
        found: usize,
        selected: usize,
    },
    ProfileStarted {
        index: usize,
        total: usize,
        name: String,
    },
    ProfileSaved {
        name: String,
        file: String,
        updated: bool,
        has_image: bool,
    },
    ProfileSkipped {
        name: String,
        reason: SkipReason,
    },
    Finished(CrawlSummary),
}

/// Counts for a finished (or cancelled) crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub attempted: usize,
    pub valid: usize,
    pub with_images: usize,
    /// Profiles that could not be reached.
    pub skipped: usize,
    /// Profiles extracted without a name or email.
    pub invalid: usize,
    pub persisted: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct CrawlOrchestrator {
    settings: Settings,
    state: CrawlState,
}

impl CrawlOrchestrator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: CrawlState::Idle,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Run one crawl to completion, cancellation, or the first fatal error.
    ///
    /// The browser session is opened here and closed exactly once before
    /// returning, whatever the outcome. Events are sent with `try_send`, so a
    /// receiver that is not drained loses events but never blocks the crawl.
    pub async fn run(
        &mut self,
        launcher: &dyn SessionLauncher,
        credentials: &dyn CredentialProvider,
        events: mpsc::Sender<CrawlEvent>,
        cancel: CancellationToken,
    ) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        self.state = CrawlState::Idle;

        let result = match IncrementalPersister::open(&self.settings) {
            Ok(persister) => match CrawlSession::open(launcher, &self.settings).await {
                Ok(session) => {
                    let result = self
                        .crawl(&session, persister, credentials, &events, &cancel)
                        .await;
                    session.close().await;
                    result
                }
                Err(e) => Err(CrawlError::SessionStart(e)),
            },
            Err(e) => Err(CrawlError::Storage(e)),
        };

        match result {
            Ok(mut summary) => {
                summary.elapsed = started.elapsed();
                self.transition(CrawlState::Done, &events);
                info!(
                    "Crawl finished: {} attempted, {} valid, {} with images, {} skipped in {:.1}s",
                    summary.attempted,
                    summary.valid,
                    summary.with_images,
                    summary.skipped,
                    summary.elapsed.as_secs_f64()
                );
                emit(&events, CrawlEvent::Finished(summary.clone()));
                Ok(summary)
            }
            Err(e) => {
                warn!("Crawl failed during {}: {}", self.state, e);
                self.transition(CrawlState::Failed, &events);
                Err(e)
            }
        }
    }

    async fn crawl(
        &mut self,
        session: &CrawlSession,
        mut persister: IncrementalPersister,
        credentials: &dyn CredentialProvider,
        events: &mpsc::Sender<CrawlEvent>,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, CrawlError> {
        self.transition(CrawlState::Authenticating, events);
        Authenticator::new(credentials, self.settings.login_wait())
            .authenticate(session, &self.settings.base_url)
            .await?;

        self.transition(CrawlState::DiscoveringLinks, events);
        let mut links = LinkDiscoverer::from_settings(&self.settings)
            .discover(session)
            .await?
            .links;
        let found = links.len();
        if let Some(limit) = self.settings.max_profiles {
            links.truncate(limit);
        }
        info!("Processing {} of {} profiles", links.len(), found);
        emit(events, CrawlEvent::LinksDiscovered {
            found,
            selected: links.len(),
        });

        self.transition(CrawlState::ExtractingProfiles, events);
        let summary = self
            .extract_all(session, &links, &mut persister, events, cancel)
            .await?;

        self.transition(CrawlState::Summarizing, events);
        if summary.valid == 0 && !summary.cancelled && !links.is_empty() {
            return Err(CrawlError::NoValidRecords(links.len()));
        }
        Ok(summary)
    }

    async fn extract_all(
        &self,
        session: &CrawlSession,
        links: &[ProfileLink],
        persister: &mut IncrementalPersister,
        events: &mpsc::Sender<CrawlEvent>,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, CrawlError> {
        let extractor = FieldExtractor::from_settings(&self.settings);
        let images = ImageAcquirer::from_settings(&self.settings);
        let delay = self.settings.profile_delay();
        let mut summary = CrawlSummary::default();

        for (index, link) in links.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if index > 0 && !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            emit(events, CrawlEvent::ProfileStarted {
                index,
                total: links.len(),
                name: link.name.clone(),
            });
            summary.attempted += 1;

            let Some((mut record, outcomes)) = extractor.extract(session, link).await else {
                summary.skipped += 1;
                emit(events, CrawlEvent::ProfileSkipped {
                    name: link.name.clone(),
                    reason: SkipReason::Unreachable,
                });
                continue;
            };
            debug!(
                "{}: {}/{} fields found",
                link.name,
                outcomes.iter().filter(|o| o.is_found()).count(),
                outcomes.len()
            );

            if !record.is_valid() {
                warn!("No name or email for {}, skipping", link.url);
                summary.invalid += 1;
                emit(events, CrawlEvent::ProfileSkipped {
                    name: link.name.clone(),
                    reason: SkipReason::Invalid,
                });
                continue;
            }
            summary.valid += 1;

            let display_name = record.display_name();
            let stem = persister.record_stem(&record)?;
            record.image_local_path = images
                .acquire(session, record.image_url.as_deref(), &stem)
                .await;
            let has_image = record.has_image();
            if has_image {
                summary.with_images += 1;
            }

            let outcome = persister.persist(record)?;
            if let Some(file) = outcome.file_name() {
                summary.persisted += 1;
                emit(events, CrawlEvent::ProfileSaved {
                    name: display_name,
                    file: file.to_string(),
                    updated: matches!(outcome, PersistOutcome::Updated(_)),
                    has_image,
                });
            }
        }

        if summary.cancelled {
            info!(
                "Crawl cancelled after {} of {} profiles",
                summary.attempted,
                links.len()
            );
        }
        Ok(summary)
    }

    fn transition(&mut self, state: CrawlState, events: &mpsc::Sender<CrawlEvent>) {
        debug!("Crawl state: {} -> {}", self.state, state);
        self.state = state;
        emit(events, CrawlEvent::State(state));
    }
}

/// Progress is best effort: a full or closed channel drops the event rather
/// than stalling the crawl.
fn emit(events: &mpsc::Sender<CrawlEvent>, event: CrawlEvent) {
    if let Err(mpsc::error::TrySendError::Full(event)) = events.try_send(event) {
        debug!("Event channel full, dropping {:?}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDocument, ScriptedElement, ScriptedLauncher, ScriptedPage};
    use crate::credentials::{Credentials, StaticCredentials};
    use tempfile::tempdir;

    const LISTING: &str = "https://dir.example.com/employees/1/all-employees";

    fn settings(root: &std::path::Path) -> Settings {
        let mut settings = Settings::immediate(root);
        settings.base_url = LISTING.to_string();
        settings
    }

    fn creds() -> StaticCredentials {
        StaticCredentials(Credentials::new("pat@example.com", "hunter2"))
    }

    #[tokio::test]
    async fn test_profile_limit_and_states() {
        let dir = tempdir().unwrap();
        let page = ScriptedPage::new();
        let mut listing = ScriptedDocument::new("All Employees");
        for id in 1..=4 {
            let url = format!("https://dir.example.com/employee/{}", id);
            listing = listing.element(
                r#"a[href*="employee/"]"#,
                ScriptedElement::link(format!("Person Number{}", id), url.clone()),
            );
            page.add_document(url, ScriptedDocument::new("Profile"));
        }
        page.add_document(LISTING, listing);

        let mut settings = settings(dir.path());
        settings.max_profiles = Some(2);
        settings.download_images = false;
        let (tx, mut rx) = mpsc::channel(64);
        let mut orchestrator = CrawlOrchestrator::new(settings);

        let summary = orchestrator
            .run(&ScriptedLauncher::new(page.clone()), &creds(), tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.persisted, 2);
        assert_eq!(orchestrator.state(), CrawlState::Done);
        assert_eq!(page.close_count(), 1);

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CrawlEvent::State(state) = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                CrawlState::Authenticating,
                CrawlState::DiscoveringLinks,
                CrawlState::ExtractingProfiles,
                CrawlState::Summarizing,
                CrawlState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(64);
        let mut orchestrator = CrawlOrchestrator::new(settings(dir.path()));

        let err = orchestrator
            .run(&ScriptedLauncher::broken(), &creds(), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::SessionStart(_)));
        assert_eq!(orchestrator.state(), CrawlState::Failed);
    }

    #[tokio::test]
    async fn test_all_invalid_profiles_is_fatal() {
        let dir = tempdir().unwrap();
        let page = ScriptedPage::new();
        page.add_document(
            LISTING,
            ScriptedDocument::new("All Employees").element(
                r#"a[href*="employee/"]"#,
                ScriptedElement::link("Ada Lovelace", "/employee/1"),
            ),
        );
        page.fail_navigation("https://dir.example.com/employee/1");
        let (tx, _rx) = mpsc::channel(64);
        let mut orchestrator = CrawlOrchestrator::new(settings(dir.path()));

        let err = orchestrator
            .run(&ScriptedLauncher::new(page.clone()), &creds(), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::NoValidRecords(1)));
        assert_eq!(page.close_count(), 1);
    }
}
