//! Stream registry.
//!
//! Owns the table of active transcoders and implements the start/stop
//! sequences. Map access is serialized by the table mutex; whole start/stop
//! sequences for one id are serialized by a per-id async slot lock, so a
//! replacement never overlaps a concurrent stop of the same id and two
//! transcoders never write into the same artifact directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::command::{HlsOutputConfig, PLAYLIST_FILE, TranscoderCommand};
use super::monitor::{MonitorContext, spawn_monitor};
use super::process::TranscoderProcess;
use super::reconcile::reconcile_artifact_root;
use super::record::{
    StreamRecord, StreamSnapshot, StreamSummary, StreamTable, playlist_url_for,
};
use crate::utils::fs;
use crate::utils::url::{is_safe_path_component, validate_source_url};
use crate::{Error, Result};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Root directory holding one artifact directory per stream id.
    pub output_root: PathBuf,
    /// Transcoder executable.
    pub transcoder_path: String,
    pub hls: HlsOutputConfig,
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout: Duration,
    /// Bound on waiting for the process after SIGKILL.
    pub kill_timeout: Duration,
    /// Artifact directories older than this are removed at startup.
    pub stale_after: Duration,
    /// URL prefix for playlist links.
    pub playlist_url_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./hls_output"),
            transcoder_path: "ffmpeg".to_string(),
            hls: HlsOutputConfig::default(),
            stop_timeout: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(60 * 60),
            playlist_url_prefix: "/api/streams".to_string(),
        }
    }
}

/// The stream registry.
pub struct StreamRegistry {
    config: RegistryConfig,
    table: Arc<StreamTable>,
    slots: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl StreamRegistry {
    /// Create the registry, preparing the artifact root and removing stale
    /// directories from a previous run.
    pub async fn new(config: RegistryConfig) -> Result<Self> {
        fs::ensure_dir_all_with_op("creating HLS output directory", &config.output_root).await?;

        let report =
            reconcile_artifact_root(&config.output_root, config.stale_after, SystemTime::now())
                .await;
        info!(
            root = %config.output_root.display(),
            removed = report.removed.len(),
            kept = report.kept.len(),
            failed = report.failed.len(),
            "Artifact root reconciled"
        );

        Ok(Self {
            config,
            table: Arc::new(StreamTable::new()),
            slots: DashMap::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Directory the transcoder for `stream_id` writes into.
    pub fn artifact_dir(&self, stream_id: &str) -> PathBuf {
        self.config.output_root.join(stream_id)
    }

    fn slot(&self, stream_id: &str) -> Arc<AsyncMutex<()>> {
        self.slots
            .entry(stream_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Start (or replace) the transcoder for `stream_id`.
    pub async fn start(&self, stream_id: &str, source_url: &str) -> Result<StreamSnapshot> {
        validate_stream_id(stream_id)?;
        validate_source_url(source_url).map_err(Error::Validation)?;

        let slot = self.slot(stream_id);
        let guard = slot.lock().await;

        if let Some(previous) = self.table.remove(stream_id) {
            info!(stream_id = %stream_id, pid = previous.process.pid(), "Replacing running stream");
            self.teardown(previous).await;
        }

        let artifact_path = self.artifact_dir(stream_id);
        let created_dir = !fs::is_dir(&artifact_path).await;
        fs::ensure_dir_all(&artifact_path).await?;

        let command = TranscoderCommand::hls(
            self.config.transcoder_path.clone(),
            source_url,
            &artifact_path,
            &self.config.hls,
        );

        let spawned = match TranscoderProcess::spawn(stream_id, &command) {
            Ok(spawned) => spawned,
            Err(source) => {
                error!(stream_id = %stream_id, error = %source, "Error starting stream");
                if created_dir && let Err(e) = fs::remove_dir_all_if_exists(&artifact_path).await {
                    warn!(stream_id = %stream_id, error = %e, "Failed to remove artifact directory");
                }
                drop(guard);
                drop(slot);
                self.prune_slots();
                return Err(Error::SpawnFailure {
                    stream_id: stream_id.to_string(),
                    source,
                });
            }
        };

        let instance = Uuid::new_v4();
        let record = StreamRecord {
            id: stream_id.to_string(),
            source_url: source_url.to_string(),
            process: spawned.handle.clone(),
            artifact_path,
            command_line: command.command_line(),
            instance,
        };
        let snapshot = record.snapshot();

        // Insert before the monitor runs so an instant exit still finds the record.
        self.table.insert(record);
        spawn_monitor(MonitorContext {
            stream_id: stream_id.to_string(),
            instance,
            child: spawned.child,
            exit_tx: spawned.exit_tx,
            kill_token: spawned.handle.kill_token(),
            stderr_tail: spawned.handle.stderr_buffer(),
            table: self.table.clone(),
        });

        info!(
            stream_id = %stream_id,
            pid = snapshot.pid,
            source = %source_url,
            "Started stream"
        );
        debug!(stream_id = %stream_id, command = ?snapshot.command_line, "Transcoder command line");

        Ok(snapshot)
    }

    /// Stop the transcoder for `stream_id` and delete its artifacts.
    pub async fn stop(&self, stream_id: &str) -> Result<()> {
        if !self.table.contains(stream_id) {
            return Err(Error::not_found("Stream", stream_id));
        }

        let slot = self.slot(stream_id);
        let guard = slot.lock().await;

        // Taking the record out first means the monitor sees it gone and
        // leaves cleanup to us.
        let record = self
            .table
            .remove(stream_id)
            .ok_or_else(|| Error::not_found("Stream", stream_id))?;

        self.teardown(record).await;
        drop(guard);
        drop(slot);
        self.prune_slots();

        info!(stream_id = %stream_id, "Stopped stream");
        Ok(())
    }

    /// Terminate a record's process group and delete its artifact directory.
    ///
    /// Never fails: the record is already out of the table, so errors only
    /// affect what is left on disk. The directory is removed only after the
    /// whole group is gone, so a replacement never shares it with a straggler.
    async fn teardown(&self, record: StreamRecord) {
        let process = &record.process;

        if let Err(e) = process
            .terminate_within(&record.id, self.config.stop_timeout)
            .await
        {
            warn!(stream_id = %record.id, pid = process.pid(), error = %e, "Escalating to SIGKILL");
            process.kill();
            if !process.wait_for_exit(self.config.kill_timeout).await {
                error!(
                    stream_id = %record.id,
                    pid = process.pid(),
                    "Transcoder still running after SIGKILL"
                );
            }
        }

        if !process.reap_group(self.config.kill_timeout).await {
            error!(
                stream_id = %record.id,
                pgid = process.pid(),
                "Process group still has members after SIGKILL"
            );
        }

        match fs::remove_dir_all_if_exists(&record.artifact_path).await {
            Ok(_) => {}
            Err(e) => warn!(stream_id = %record.id, error = %e, "Failed to remove artifacts"),
        }
    }

    /// Drop slot locks nobody holds or waits on and whose id is not registered.
    fn prune_slots(&self) {
        self.slots
            .retain(|id, slot| Arc::strong_count(slot) > 1 || self.table.contains(id));
    }

    /// Snapshot of the record for `stream_id`.
    pub fn lookup(&self, stream_id: &str) -> Option<StreamSnapshot> {
        self.table.snapshot(stream_id)
    }

    /// Status summaries of every registered stream, in no particular order.
    pub fn list_active(&self) -> Vec<StreamSummary> {
        self.table.summaries(&self.config.playlist_url_prefix)
    }

    /// Playlist URL for a registered stream.
    pub fn playlist_url(&self, stream_id: &str) -> Option<String> {
        self.table
            .contains(stream_id)
            .then(|| playlist_url_for(&self.config.playlist_url_prefix, stream_id))
    }

    /// Resolve a playback file for `stream_id`.
    ///
    /// The registry-confirmed directory is preferred; for ids not in the
    /// registry the path is built from the artifact root directly. That second
    /// tier serves streams that are mid-teardown or whose transcoder crashed.
    pub async fn resolve_artifact(&self, stream_id: &str, file_name: &str) -> Option<PathBuf> {
        if !is_safe_path_component(stream_id) || !is_safe_path_component(file_name) {
            return None;
        }

        let dir = match self.table.snapshot(stream_id) {
            Some(snapshot) => snapshot.artifact_path,
            None => self.artifact_dir(stream_id),
        };
        let path = dir.join(file_name);

        if fs::is_file(&path).await {
            Some(path)
        } else {
            debug!(stream_id = %stream_id, path = %path.display(), "Artifact not found");
            None
        }
    }

    /// Playlist path for `stream_id`, if the playlist exists.
    pub async fn resolve_playlist(&self, stream_id: &str) -> Option<PathBuf> {
        self.resolve_artifact(stream_id, PLAYLIST_FILE).await
    }

    /// Number of registered streams.
    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    /// Stop every registered stream concurrently.
    pub async fn shutdown(self: &Arc<Self>) {
        let ids = self.table.ids();
        if ids.is_empty() {
            return;
        }

        info!(count = ids.len(), "Stopping all active streams");
        let mut tasks = JoinSet::new();
        for id in ids {
            let registry = Arc::clone(self);
            tasks.spawn(async move {
                match registry.stop(&id).await {
                    Ok(()) | Err(Error::NotFound { .. }) => {}
                    Err(e) => warn!(stream_id = %id, error = %e, "Failed to stop stream"),
                }
            });
        }
        while tasks.join_next().await.is_some() {}
        info!("Stopped all active streams");
    }
}

/// Stream ids become directory names, so they must be a single path component.
pub fn validate_stream_id(stream_id: &str) -> Result<()> {
    if stream_id.trim().is_empty() {
        return Err(Error::validation("Stream id must not be empty"));
    }
    if !is_safe_path_component(stream_id) {
        return Err(Error::validation(
            "Stream id must not contain path separators or be '.' / '..'",
        ));
    }
    Ok(())
}

/// Wait until `path` exists, polling every `interval`, for at most `timeout`.
pub async fn wait_for_file(path: &Path, timeout: Duration, interval: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if fs::is_file(path).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
