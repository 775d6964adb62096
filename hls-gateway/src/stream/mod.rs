//! Stream lifecycle supervision.
//!
//! - [`registry`]: the table of active transcoders and the start/stop sequences
//! - [`process`]: handle to one transcoder process group
//! - [`monitor`]: per-process exit watcher that reconciles the registry
//! - [`reconcile`]: startup cleanup of stale artifact directories
//! - [`command`]: transcoder argument construction
//! - [`stderr`]: stderr line consumer

pub mod command;
mod monitor;
pub mod process;
pub mod reconcile;
mod record;
pub mod registry;
pub mod stderr;

pub use command::{HlsOutputConfig, PLAYLIST_FILE, SEGMENT_PATTERN, TranscoderCommand};
pub use process::{ExitInfo, TranscoderProcess};
pub use reconcile::{ReconcileReport, reconcile_artifact_root};
pub use record::{StreamSnapshot, StreamStatus, StreamSummary, playlist_url_for};
pub use registry::{RegistryConfig, StreamRegistry, validate_stream_id, wait_for_file};
