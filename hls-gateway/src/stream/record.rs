//! Registry records and the lock-guarded stream table.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::command::PLAYLIST_FILE;
use super::process::TranscoderProcess;

/// Computed status of a registered stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Running,
    Stopped,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// One active stream, owned by the registry table.
#[derive(Debug)]
pub(crate) struct StreamRecord {
    pub id: String,
    pub source_url: String,
    pub process: TranscoderProcess,
    pub artifact_path: PathBuf,
    pub command_line: Vec<String>,
    /// Distinguishes this spawn from a later replacement under the same id.
    pub instance: Uuid,
}

impl StreamRecord {
    pub fn status(&self) -> StreamStatus {
        if self.process.has_exited() {
            StreamStatus::Stopped
        } else {
            StreamStatus::Running
        }
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            id: self.id.clone(),
            source_url: self.source_url.clone(),
            artifact_path: self.artifact_path.clone(),
            started_at: self.process.started_at(),
            command_line: self.command_line.clone(),
            pid: self.process.pid(),
            status: self.status(),
        }
    }
}

/// Immutable copy of a record, safe to hold outside the table lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    pub id: String,
    pub source_url: String,
    pub artifact_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub command_line: Vec<String>,
    pub pid: u32,
    pub status: StreamStatus,
}

impl StreamSnapshot {
    pub fn playlist_path(&self) -> PathBuf {
        self.artifact_path.join(PLAYLIST_FILE)
    }
}

/// Status listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub stream_id: String,
    pub rtsp_url: String,
    pub started_at: String,
    pub status: StreamStatus,
    pub playlist_url: Option<String>,
}

/// Build the public playlist URL for a stream id.
pub fn playlist_url_for(prefix: &str, stream_id: &str) -> String {
    format!(
        "{}/{}/{}",
        prefix.trim_end_matches('/'),
        stream_id,
        PLAYLIST_FILE
    )
}

/// The map of active streams.
///
/// Every access goes through one mutex and is synchronous, so the lock is
/// never held across an await point.
#[derive(Debug, Default)]
pub(crate) struct StreamTable {
    records: Mutex<HashMap<String, StreamRecord>>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning whatever was registered under its id.
    pub fn insert(&self, record: StreamRecord) -> Option<StreamRecord> {
        self.records.lock().insert(record.id.clone(), record)
    }

    pub fn remove(&self, stream_id: &str) -> Option<StreamRecord> {
        self.records.lock().remove(stream_id)
    }

    /// Remove the record only if it is still the given spawn instance.
    pub fn remove_instance(&self, stream_id: &str, instance: Uuid) -> Option<StreamRecord> {
        let mut records = self.records.lock();
        match records.get(stream_id) {
            Some(record) if record.instance == instance => records.remove(stream_id),
            _ => None,
        }
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.records.lock().contains_key(stream_id)
    }

    pub fn snapshot(&self, stream_id: &str) -> Option<StreamSnapshot> {
        self.records.lock().get(stream_id).map(StreamRecord::snapshot)
    }

    pub fn summaries(&self, url_prefix: &str) -> Vec<StreamSummary> {
        self.records
            .lock()
            .values()
            .map(|record| StreamSummary {
                stream_id: record.id.clone(),
                rtsp_url: record.source_url.clone(),
                started_at: record
                    .process
                    .started_at()
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
                status: record.status(),
                playlist_url: Some(playlist_url_for(url_prefix, &record.id)),
            })
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_url_for() {
        assert_eq!(
            playlist_url_for("/api/streams", "cam1"),
            "/api/streams/cam1/playlist.m3u8"
        );
        assert_eq!(
            playlist_url_for("/api/streams/", "cam1"),
            "/api/streams/cam1/playlist.m3u8"
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&StreamStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(StreamStatus::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_empty_table() {
        let table = StreamTable::new();
        assert_eq!(table.len(), 0);
        assert!(!table.contains("cam1"));
        assert!(table.remove("cam1").is_none());
        assert!(table.remove_instance("cam1", Uuid::new_v4()).is_none());
        assert!(table.summaries("/api/streams").is_empty());
    }
}
