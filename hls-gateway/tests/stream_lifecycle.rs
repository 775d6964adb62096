//! Registry lifecycle tests against fake transcoder scripts.

#![cfg(unix)]

mod common;

use std::time::Duration;

use hls_gateway::Error;
use hls_gateway::stream::{PLAYLIST_FILE, StreamStatus, wait_for_file};
use tempfile::TempDir;

use common::{
    CRASHING_TRANSCODER, FORKING_TRANSCODER, OBEDIENT_TRANSCODER, RUNNING_TRANSCODER,
    SHORT_LIVED_TRANSCODER, STUBBORN_TRANSCODER, eventually, registry_with, registry_with_timeouts,
};

#[tokio::test]
async fn start_then_stop_removes_record_and_artifacts() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, RUNNING_TRANSCODER).await;

    let snapshot = registry.start("cam1", "rtsp://host/feed").await.unwrap();
    assert_eq!(snapshot.source_url, "rtsp://host/feed");
    assert_eq!(snapshot.status, StreamStatus::Running);
    assert_eq!(
        snapshot.command_line.last().map(String::as_str),
        Some(snapshot.playlist_path().to_str().unwrap())
    );

    let looked_up = registry.lookup("cam1").unwrap();
    assert_eq!(looked_up.source_url, "rtsp://host/feed");
    assert_eq!(looked_up.status, StreamStatus::Running);
    assert_eq!(
        registry.playlist_url("cam1").as_deref(),
        Some("/api/streams/cam1/playlist.m3u8")
    );

    assert!(
        wait_for_file(
            &snapshot.playlist_path(),
            Duration::from_secs(5),
            Duration::from_millis(50)
        )
        .await
    );
    assert!(registry.resolve_artifact("cam1", PLAYLIST_FILE).await.is_some());

    let listed = registry.list_active();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].stream_id, "cam1");
    assert_eq!(listed[0].status, StreamStatus::Running);
    assert!(listed[0].started_at.ends_with('Z'));

    registry.stop("cam1").await.unwrap();

    assert!(registry.list_active().is_empty());
    assert!(registry.lookup("cam1").is_none());
    assert!(!registry.artifact_dir("cam1").exists());
    #[cfg(target_os = "linux")]
    assert!(!common::process_alive(snapshot.pid));
}

#[tokio::test]
async fn restarting_same_id_replaces_process() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, RUNNING_TRANSCODER).await;

    let first = registry.start("cam1", "rtsp://host/a").await.unwrap();
    let second = registry.start("cam1", "rtsp://host/b").await.unwrap();

    assert_ne!(first.pid, second.pid);
    #[cfg(target_os = "linux")]
    assert!(!common::process_alive(first.pid));

    let listed = registry.list_active();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].rtsp_url, "rtsp://host/b");

    // The first monitor must not evict the replacement.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(registry.lookup("cam1").unwrap().pid, second.pid);

    registry.stop("cam1").await.unwrap();
}

#[tokio::test]
async fn stop_unknown_id_has_no_side_effects() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, RUNNING_TRANSCODER).await;
    registry.start("cam1", "rtsp://host/feed").await.unwrap();

    let err = registry.stop("ghost").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(registry.active_count(), 1);
    assert!(registry.artifact_dir("cam1").exists());

    registry.stop("cam1").await.unwrap();
}

#[tokio::test]
async fn crashed_transcoder_is_removed_but_artifacts_stay() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, CRASHING_TRANSCODER).await;

    registry.start("cam2", "rtsp://host/feed").await.unwrap();

    let registry_ref = registry.clone();
    assert!(eventually(Duration::from_secs(5), move || registry_ref.lookup("cam2").is_none()).await);
    assert!(registry.artifact_dir("cam2").is_dir());
    assert!(matches!(registry.stop("cam2").await, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn invalid_scheme_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, RUNNING_TRANSCODER).await;

    let err = registry.start("x", "ftp://bad").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(registry.lookup("x").is_none());
    assert!(!registry.artifact_dir("x").exists());
}

#[tokio::test]
async fn shutdown_stops_every_stream() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, RUNNING_TRANSCODER).await;

    registry.start("a", "rtsp://host/a").await.unwrap();
    registry.start("b", "/srv/media/b.mp4").await.unwrap();
    assert_eq!(registry.active_count(), 2);

    registry.shutdown().await;

    assert_eq!(registry.active_count(), 0);
    assert!(!registry.artifact_dir("a").exists());
    assert!(!registry.artifact_dir("b").exists());
}

async fn wait_for_playlist(snapshot: &hls_gateway::stream::StreamSnapshot) {
    assert!(
        wait_for_file(
            &snapshot.playlist_path(),
            Duration::from_secs(5),
            Duration::from_millis(20)
        )
        .await,
        "fake transcoder never wrote its playlist"
    );
}

#[tokio::test]
async fn stop_escalates_to_sigkill_when_sigterm_is_ignored() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with_timeouts(
        &temp,
        STUBBORN_TRANSCODER,
        Duration::from_millis(300),
        Duration::from_secs(3),
    )
    .await;

    let snapshot = registry.start("cam1", "rtsp://host/feed").await.unwrap();
    wait_for_playlist(&snapshot).await;

    registry.stop("cam1").await.unwrap();

    assert!(registry.lookup("cam1").is_none());
    assert!(!registry.artifact_dir("cam1").exists());
    assert!(!process_utils::group_exists(snapshot.pid).unwrap());
    #[cfg(target_os = "linux")]
    assert!(!common::process_alive(snapshot.pid));
}

#[tokio::test]
async fn stop_kills_group_members_that_outlive_the_leader() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, FORKING_TRANSCODER).await;

    let snapshot = registry.start("cam1", "rtsp://host/feed").await.unwrap();
    wait_for_playlist(&snapshot).await;
    assert!(process_utils::group_exists(snapshot.pid).unwrap());

    registry.stop("cam1").await.unwrap();

    assert!(
        !process_utils::group_exists(snapshot.pid).unwrap(),
        "process group {} still has members after stop",
        snapshot.pid
    );
    assert!(!registry.artifact_dir("cam1").exists());
}

#[tokio::test]
async fn stop_wins_over_exit_triggered_by_sigterm() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, OBEDIENT_TRANSCODER).await;

    let snapshot = registry.start("cam1", "rtsp://host/feed").await.unwrap();
    wait_for_playlist(&snapshot).await;

    registry.stop("cam1").await.unwrap();
    assert!(!registry.artifact_dir("cam1").exists());

    // The monitor sees a clean exit for a record that is already gone.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(registry.lookup("cam1").is_none());
    assert_eq!(registry.active_count(), 0);
    assert!(!registry.artifact_dir("cam1").exists());
}

#[tokio::test]
async fn stop_racing_natural_exit_has_a_single_winner() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&temp, SHORT_LIVED_TRANSCODER).await;

    let snapshot = registry.start("cam1", "rtsp://host/feed").await.unwrap();
    wait_for_playlist(&snapshot).await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    match registry.stop("cam1").await {
        // Stop took the record first and cleaned up.
        Ok(()) => assert!(!registry.artifact_dir("cam1").exists()),
        // The monitor removed it first and kept the artifacts.
        Err(Error::NotFound { .. }) => assert!(registry.artifact_dir("cam1").exists()),
        Err(e) => panic!("unexpected stop error: {e}"),
    }

    let registry_ref = registry.clone();
    assert!(eventually(Duration::from_secs(2), move || registry_ref.active_count() == 0).await);
    assert!(registry.lookup("cam1").is_none());
}
