//! Transcoder process handle.
//!
//! A [`TranscoderProcess`] is the capability the registry holds for one
//! running transcoder. It never owns the `Child` itself: the lifecycle
//! monitor owns and reaps the child and publishes the exit through a watch
//! channel, so any number of snapshot readers and at most one stopper can
//! observe the exit without racing over `Child::wait`.

use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use process_utils::{ProcessGroupExt, group_exists, is_group_gone, kill_group, terminate_group};
use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::command::TranscoderCommand;
use super::stderr::{StderrTail, spawn_stderr_logger};
use crate::{Error, Result};

/// Poll interval while waiting for stray group members to die.
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a transcoder process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when the process was ended by a signal or could not
    /// be waited on.
    pub code: Option<i32>,
    /// The exit followed a kill request from [`TranscoderProcess::kill`].
    pub killed: bool,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None if self.killed => f.write_str("killed"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Handle to one running transcoder.
#[derive(Debug, Clone)]
pub struct TranscoderProcess {
    pid: u32,
    started_at: DateTime<Utc>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill_token: CancellationToken,
    stderr_tail: StderrTail,
}

/// The pieces produced by a successful spawn.
///
/// The handle goes into the registry record; the child and the exit sender go
/// to the lifecycle monitor.
pub struct SpawnedTranscoder {
    pub handle: TranscoderProcess,
    pub child: Child,
    pub exit_tx: watch::Sender<Option<ExitInfo>>,
}

impl TranscoderProcess {
    /// Spawn `command` as the leader of a new process group.
    ///
    /// stdin is closed, stdout is discarded, stderr is consumed line by line
    /// by a logging task.
    pub fn spawn(stream_id: &str, command: &TranscoderCommand) -> std::io::Result<SpawnedTranscoder> {
        let mut child = process_utils::tokio_command(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .new_process_group()
            .spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("transcoder exited before its pid was known"))?;

        let stderr_tail = StderrTail::default();
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_logger(stream_id.to_string(), stderr, stderr_tail.clone());
        }

        let (exit_tx, exit_rx) = watch::channel(None);

        Ok(SpawnedTranscoder {
            handle: Self {
                pid,
                started_at: Utc::now(),
                exit_rx,
                kill_token: CancellationToken::new(),
                stderr_tail,
            },
            child,
            exit_tx,
        })
    }

    /// Process id, which is also the process group id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the monitor has observed the process exit.
    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// Most recent stderr lines.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.lines()
    }

    pub(crate) fn stderr_buffer(&self) -> StderrTail {
        self.stderr_tail.clone()
    }

    pub(crate) fn kill_token(&self) -> CancellationToken {
        self.kill_token.clone()
    }

    /// Ask the whole process group to exit (`SIGTERM`).
    ///
    /// Platforms without process-group signals fall back to a direct kill of
    /// the child through the monitor.
    pub fn terminate(&self) -> std::io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }

        match terminate_group(self.pid) {
            Ok(()) => Ok(()),
            Err(e) if is_group_gone(&e) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
                debug!(pid = self.pid, "Group signals unsupported, killing child directly");
                self.kill_token.cancel();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Unconditionally kill the process group and the child.
    pub fn kill(&self) {
        if !self.has_exited() {
            match kill_group(self.pid) {
                Ok(()) => {}
                Err(e) if is_group_gone(&e) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {}
                Err(e) => warn!(pid = self.pid, "Failed to SIGKILL process group: {}", e),
            }
        }
        self.kill_token.cancel();
    }

    /// Wait until the exit has been observed, at most `timeout`.
    ///
    /// Returns `false` on timeout. A monitor that went away without
    /// publishing an exit counts as exited (its `Child` was dropped and
    /// killed with it).
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let mut rx = self.exit_rx.clone();
        tokio::time::timeout(timeout, async move {
            let _ = rx.wait_for(|exit| exit.is_some()).await;
        })
        .await
        .is_ok()
    }

    /// Kill whatever is left of the process group once the leader is gone.
    ///
    /// Children the transcoder forked stay in its group and can ignore the
    /// SIGTERM the leader obeyed. The group id cannot be reused while any of
    /// them lives, so signalling it here only reaches those stragglers.
    /// Returns `false` if members are still present after `timeout`.
    pub async fn reap_group(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut signalled = false;

        loop {
            match group_exists(self.pid) {
                Ok(false) => return true,
                Ok(true) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Unsupported => return true,
                Err(e) => {
                    warn!(pid = self.pid, "Failed to query process group: {}", e);
                    return false;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            if !signalled {
                debug!(pid = self.pid, "Process group outlived its leader, sending SIGKILL");
                signalled = true;
            }
            match kill_group(self.pid) {
                Ok(()) => {}
                Err(e) if is_group_gone(&e) => return true,
                Err(e) => {
                    warn!(pid = self.pid, "Failed to SIGKILL process group: {}", e);
                    return false;
                }
            }

            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
    }

    /// Graceful termination bounded by `timeout`.
    ///
    /// Returns [`Error::TerminationFailure`] if the process is still alive
    /// when the timeout elapses; the caller is expected to escalate to
    /// [`TranscoderProcess::kill`].
    pub async fn terminate_within(&self, stream_id: &str, timeout: Duration) -> Result<()> {
        self.terminate()?;

        if self.wait_for_exit(timeout).await {
            Ok(())
        } else {
            Err(Error::TerminationFailure {
                stream_id: stream_id.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}
