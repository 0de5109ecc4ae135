//! End-to-end crawls against a scripted directory.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{credentials, image_files, record_files, settings, DirectorySite};
use serde_json::json;
use staffcrawl::browser::scripted::ScriptedLauncher;
use staffcrawl::config::Settings;
use staffcrawl::credentials::{CredentialProvider, Credentials, StaticCredentials};
use staffcrawl::error::CredentialError;
use staffcrawl::models::ProfileRecord;
use staffcrawl::persist::RecordIndex;
use staffcrawl::{CrawlError, CrawlOrchestrator, CrawlState};
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn read_index(settings: &Settings) -> RecordIndex {
    serde_json::from_str(&std::fs::read_to_string(settings.index_path()).unwrap()).unwrap()
}

#[tokio::test]
async fn test_login_then_three_profiles() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person(1, "Ada Lovelace", "ada@example.com")
        .person(2, "Grace Hopper", "grace@example.com")
        .person(3, "Alan Turing", "alan@example.com")
        .build();
    let (tx, _rx) = mpsc::channel(256);

    let summary = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(page.clone()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.valid, 3);
    assert_eq!(summary.with_images, 0);
    assert!(!summary.cancelled);
    assert!(page.is_authenticated());
    assert_eq!(page.fetch_count(), 0);
    assert_eq!(page.close_count(), 1);

    let files = record_files(&settings);
    assert_eq!(files, vec!["Ada_Lovelace.json", "Alan_Turing.json", "Grace_Hopper.json"]);
    let index = read_index(&settings);
    assert_eq!(index.total_count, 3);
    assert_eq!(index.employee_files, files);

    let ada: ProfileRecord = serde_json::from_str(
        &std::fs::read_to_string(settings.records_dir().join("Ada_Lovelace.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(ada.email, "ada@example.com");
    assert_eq!(ada.position, "Architect");
    assert_eq!(ada.profile_id, "1");
}

#[tokio::test]
async fn test_empty_listing_is_fatal() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new().build();
    let (tx, _rx) = mpsc::channel(256);
    let mut orchestrator = CrawlOrchestrator::new(settings.clone());

    let err = orchestrator
        .run(&ScriptedLauncher::new(page.clone()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::NoProfiles));
    assert_eq!(orchestrator.state(), CrawlState::Failed);
    assert!(record_files(&settings).is_empty());
    assert!(!settings.index_path().exists());
    assert_eq!(page.close_count(), 1);
}

#[tokio::test]
async fn test_one_timed_out_profile_is_skipped() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person(1, "Ada Lovelace", "ada@example.com")
        .person(2, "Grace Hopper", "grace@example.com")
        .unreachable(3, "Alan Turing")
        .person(4, "Edsger Dijkstra", "edsger@example.com")
        .person(5, "Barbara Liskov", "barbara@example.com")
        .build();
    let (tx, _rx) = mpsc::channel(256);

    let summary = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(page.clone()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.valid, 4);
    assert_eq!(summary.skipped, 1);
    assert_eq!(record_files(&settings).len(), 4);
    assert_eq!(read_index(&settings).total_count, 4);
    assert_eq!(page.close_count(), 1);
}

#[tokio::test]
async fn test_wrong_credentials_are_rejected() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person(1, "Ada Lovelace", "ada@example.com")
        .build();
    let wrong = StaticCredentials(Credentials::new(common::EMAIL, "wrong"));
    let (tx, _rx) = mpsc::channel(256);

    let err = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(page.clone()), &wrong, tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::LoginRejected(_)));
    assert!(record_files(&settings).is_empty());
    assert_eq!(page.close_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_first_profile() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person(1, "Ada Lovelace", "ada@example.com")
        .person(2, "Grace Hopper", "grace@example.com")
        .build();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, _rx) = mpsc::channel(256);

    let summary = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(page.clone()), &credentials(), tx, cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.attempted, 0);
    assert!(record_files(&settings).is_empty());
    assert_eq!(page.close_count(), 1);
}

#[tokio::test]
async fn test_recrawl_keeps_inventory_data() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let site = || {
        DirectorySite::new()
            .person(1, "Ada Lovelace", "ada@example.com")
            .build()
    };

    let (tx, _rx) = mpsc::channel(256);
    CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(site()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap();

    let path = settings.records_dir().join("Ada_Lovelace.json");
    let mut saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    saved["computer_info"] = json!({"hostname": "NYC-WS-014", "serial": "C02XYZ"});
    std::fs::write(&path, serde_json::to_string_pretty(&saved).unwrap()).unwrap();

    let (tx, _rx) = mpsc::channel(256);
    let summary = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(site()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.persisted, 1);

    let record: ProfileRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        record.computer_info,
        Some(json!({"hostname": "NYC-WS-014", "serial": "C02XYZ"}))
    );
    assert_eq!(record_files(&settings), vec!["Ada_Lovelace.json"]);
}

struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Err(CredentialError::NotFound)
    }
}

#[tokio::test]
async fn test_login_without_credentials_is_fatal() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person(1, "Ada Lovelace", "ada@example.com")
        .build();
    let (tx, _rx) = mpsc::channel(256);
    let mut orchestrator = CrawlOrchestrator::new(settings.clone());

    let err = orchestrator
        .run(&ScriptedLauncher::new(page.clone()), &NoCredentials, tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Credentials(CredentialError::NotFound)));
    assert_eq!(orchestrator.state(), CrawlState::Failed);
    assert!(record_files(&settings).is_empty());
    assert!(!settings.index_path().exists());
    assert_eq!(page.close_count(), 1);
}

#[tokio::test]
async fn test_namesakes_get_their_own_records_and_photos() {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF";
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let page = DirectorySite::new()
        .person_with_photo(1, "Sam Lee", "sam.lee@example.com", "image/png", PNG)
        .person_with_photo(2, "Sam Lee", "sam.lee2@example.com", "image/jpeg", JPEG)
        .build();
    let (tx, _rx) = mpsc::channel(256);

    let summary = CrawlOrchestrator::new(settings.clone())
        .run(&ScriptedLauncher::new(page.clone()), &credentials(), tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.with_images, 2);
    assert_eq!(page.fetch_count(), 2);
    assert_eq!(record_files(&settings), vec!["Sam_Lee.json", "Sam_Lee_2.json"]);
    assert_eq!(image_files(&settings), vec!["Sam_Lee_2_profile.jpg", "Sam_Lee_profile.png"]);

    let second: ProfileRecord = serde_json::from_str(
        &std::fs::read_to_string(settings.records_dir().join("Sam_Lee_2.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(second.email, "sam.lee2@example.com");
    assert_eq!(
        second.image_local_path.as_deref(),
        Some("assets/images/Sam_Lee_2_profile.jpg")
    );
    assert_eq!(
        std::fs::read(settings.images_dir().join("Sam_Lee_2_profile.jpg")).unwrap(),
        JPEG
    );
}

#[tokio::test]
async fn test_undrained_event_channel_does_not_stall() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path());
    let mut site = DirectorySite::new();
    for id in 1..=6 {
        site = site.person(id, &format!("Person Number{}", id), "");
    }
    let page = site.build();
    let (tx, _rx) = mpsc::channel(1);

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        CrawlOrchestrator::new(settings.clone()).run(
            &ScriptedLauncher::new(page.clone()),
            &credentials(),
            tx,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("crawl stalled on a full event channel")
    .unwrap();

    assert_eq!(summary.valid, 6);
    assert_eq!(record_files(&settings).len(), 6);
    assert_eq!(page.close_count(), 1);
}
