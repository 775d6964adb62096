//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hls_gateway::database::{self, DbPool};
use hls_gateway::stream::{RegistryConfig, StreamRegistry};
use tempfile::TempDir;

/// Fake transcoder that writes the playlist (its last argument) and idles.
pub const RUNNING_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
printf '#EXTM3U\n#EXT-X-VERSION:3\n' > "$last"
exec sleep 30
"#;

/// Fake transcoder that ignores SIGTERM and has to be killed.
pub const STUBBORN_TRANSCODER: &str = r#"#!/bin/sh
trap '' TERM
for last; do :; done
printf '#EXTM3U\n' > "$last"
while :; do sleep 1; done
"#;

/// Fake transcoder that leaves a TERM-ignoring child in its process group and
/// then exits on SIGTERM itself.
pub const FORKING_TRANSCODER: &str = r#"#!/bin/sh
sh -c 'trap "" TERM; while :; do sleep 1; done' &
sleep 0.2
for last; do :; done
printf '#EXTM3U\n' > "$last"
exec sleep 30
"#;

/// Fake transcoder that exits cleanly as soon as it is asked to stop.
pub const OBEDIENT_TRANSCODER: &str = r#"#!/bin/sh
trap 'exit 0' TERM
for last; do :; done
printf '#EXTM3U\n' > "$last"
sleep 30 &
wait
"#;

/// Fake transcoder that finishes on its own shortly after starting.
pub const SHORT_LIVED_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
printf '#EXTM3U\n' > "$last"
sleep 0.3
exit 0
"#;

/// Fake transcoder that fails immediately.
pub const CRASHING_TRANSCODER: &str = r#"#!/bin/sh
echo "rtsp://host/feed: Connection refused" >&2
exit 3
"#;

/// Write an executable script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

pub fn registry_config(temp: &TempDir, transcoder: &Path) -> RegistryConfig {
    RegistryConfig {
        output_root: temp.path().join("hls_output"),
        transcoder_path: transcoder.display().to_string(),
        stop_timeout: Duration::from_secs(3),
        kill_timeout: Duration::from_secs(3),
        ..Default::default()
    }
}

pub async fn registry_with(temp: &TempDir, script: &str) -> Arc<StreamRegistry> {
    registry_with_timeouts(temp, script, Duration::from_secs(3), Duration::from_secs(3)).await
}

pub async fn registry_with_timeouts(
    temp: &TempDir,
    script: &str,
    stop_timeout: Duration,
    kill_timeout: Duration,
) -> Arc<StreamRegistry> {
    let transcoder = write_script(temp.path(), "fake-ffmpeg", script);
    let config = RegistryConfig {
        stop_timeout,
        kill_timeout,
        ..registry_config(temp, &transcoder)
    };
    Arc::new(
        StreamRegistry::new(config)
            .await
            .expect("Failed to create registry"),
    )
}

pub async fn setup_test_db() -> DbPool {
    let pool = database::init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");
    database::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Poll `condition` every 50 ms for up to `timeout`.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
