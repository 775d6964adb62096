//! Transcoder stderr consumption.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Number of stderr lines kept for crash reports.
pub const STDERR_TAIL_LINES: usize = 32;

/// Bounded buffer of the most recent stderr lines of one process.
#[derive(Debug, Clone)]
pub struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl StderrTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

impl Default for StderrTail {
    fn default() -> Self {
        Self::new(STDERR_TAIL_LINES)
    }
}

/// Whether a (trimmed) stderr line is part of ffmpeg's version/build banner.
pub fn is_banner_line(line: &str) -> bool {
    line.contains("ffmpeg version")
        || line.contains("built with")
        || line.contains("configuration:")
        || is_library_version_line(line)
}

/// `libavutil      58. 29.100 / 58. 29.100`
fn is_library_version_line(line: &str) -> bool {
    let Some((name, versions)) = line
        .strip_prefix("lib")
        .and_then(|rest| rest.split_once(char::is_whitespace))
    else {
        return false;
    };

    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric())
        && versions.trim_start().starts_with(|c: char| c.is_ascii_digit())
        && versions.contains('/')
}

/// Spawn a task that logs every non-banner stderr line of a transcoder.
///
/// Lines that look like errors are logged at `warn`, everything else at
/// `debug` (ffmpeg reports progress on stderr). All logged lines are also
/// pushed into `tail`.
pub fn spawn_stderr_logger(
    stream_id: String,
    stderr: ChildStderr,
    tail: StderrTail,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() || is_banner_line(line) {
                        continue;
                    }

                    if line.contains("Error") || line.contains("error") {
                        warn!(stream_id = %stream_id, "ffmpeg: {}", line);
                    } else {
                        debug!(stream_id = %stream_id, "ffmpeg: {}", line);
                    }
                    tail.push(line);
                }
                Ok(None) => {
                    debug!(stream_id = %stream_id, "Transcoder stderr closed");
                    break;
                }
                Err(e) => {
                    error!(stream_id = %stream_id, "Error reading transcoder stderr: {}", e);
                    break;
                }
            }
        }
    })
}
