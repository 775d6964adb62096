//! Startup reconciliation of the artifact root.
//!
//! The registry does not survive a restart, so every directory found under
//! the artifact root at boot belongs to a transcoder of a previous run. Old
//! ones are deleted; recent ones are left alone.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::utils::fs;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Directory names that were deleted.
    pub removed: Vec<String>,
    /// Directory names younger than the threshold.
    pub kept: Vec<String>,
    /// Directory names that could not be inspected or deleted.
    pub failed: Vec<String>,
}

/// Delete subdirectories of `root` older than `stale_after`, measured at `now`.
///
/// Age uses the creation time, or the modification time on filesystems that
/// do not record creation. Errors are logged and counted, never returned.
pub async fn reconcile_artifact_root(
    root: &Path,
    stale_after: Duration,
    now: SystemTime,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "Failed to list artifact root");
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Failed to read artifact root entry");
                break;
            }
        };

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat artifact directory");
                report.failed.push(name);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }

        let Some(created) = metadata.created().or_else(|_| metadata.modified()).ok() else {
            warn!(path = %path.display(), "No timestamp available for artifact directory");
            report.failed.push(name);
            continue;
        };

        let age = now.duration_since(created).unwrap_or(Duration::ZERO);
        if age <= stale_after {
            debug!(path = %path.display(), age_secs = age.as_secs(), "Keeping recent artifact directory");
            report.kept.push(name);
            continue;
        }

        match fs::remove_dir_all_if_exists(&path).await {
            Ok(_) => {
                info!(stream_id = %name, "Cleaned up stale stream directory");
                report.removed.push(name);
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove stale stream directory");
                report.failed.push(name);
            }
        }
    }

    report
}
