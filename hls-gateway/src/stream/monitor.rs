//! Lifecycle monitor.
//!
//! One task per spawned transcoder. It owns the `Child`, awaits its exit (or
//! a kill request), publishes the exit to the process handle and then
//! reconciles the registry. Records that were already taken out by an
//! explicit stop or replaced by a newer spawn are left alone.

use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::process::ExitInfo;
use super::record::StreamTable;
use super::stderr::StderrTail;
use crate::Error;

/// Everything a monitor task needs, moved into the task.
pub(crate) struct MonitorContext {
    pub stream_id: String,
    pub instance: Uuid,
    pub child: Child,
    pub exit_tx: watch::Sender<Option<ExitInfo>>,
    pub kill_token: CancellationToken,
    pub stderr_tail: StderrTail,
    pub table: Arc<StreamTable>,
}

/// Spawn the monitor task for one transcoder.
pub(crate) fn spawn_monitor(ctx: MonitorContext) -> JoinHandle<()> {
    let MonitorContext {
        stream_id,
        instance,
        mut child,
        exit_tx,
        kill_token,
        stderr_tail,
        table,
    } = ctx;

    tokio::spawn(async move {
        let (status, killed) = tokio::select! {
            _ = kill_token.cancelled() => {
                if let Err(e) = child.start_kill() {
                    debug!(stream_id = %stream_id, "start_kill failed: {}", e);
                }
                (child.wait().await, true)
            }
            status = child.wait() => (status, false),
        };

        let code = match status {
            Ok(exit_status) => exit_status.code(),
            Err(e) => {
                error!(stream_id = %stream_id, "Error waiting for transcoder: {}", e);
                Some(-1)
            }
        };
        let exit = ExitInfo { code, killed };
        exit_tx.send_replace(Some(exit));

        // First remover wins: `stop` takes the record out before signalling,
        // so finding it here means nobody asked this process to exit.
        match table.remove_instance(&stream_id, instance) {
            Some(record) => {
                if exit.success() {
                    info!(stream_id = %stream_id, "Transcoder finished, stream removed");
                } else {
                    let crash = Error::ProcessCrash {
                        stream_id: stream_id.clone(),
                        exit: exit.to_string(),
                    };
                    let tail = stderr_tail.lines();
                    if tail.is_empty() {
                        error!(stream_id = %stream_id, code = ?exit.code, "{}", crash);
                    } else {
                        error!(
                            stream_id = %stream_id,
                            code = ?exit.code,
                            stderr = %tail.join("\n"),
                            "{}",
                            crash
                        );
                    }
                }
                // Crash path keeps the artifacts on disk for inspection.
                debug!(
                    stream_id = %stream_id,
                    path = %record.artifact_path.display(),
                    "Leaving artifact directory in place"
                );
            }
            None if killed => {
                warn!(stream_id = %stream_id, %exit, "Transcoder exited after forced kill");
            }
            None => {
                debug!(stream_id = %stream_id, %exit, "Transcoder exited after stop");
            }
        }
    })
}
