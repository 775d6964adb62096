//! Panic reporting.
//!
//! Panics are logged through `tracing`. Release builds abort on panic, which
//! can drop buffered log lines, so there the record is also appended straight
//! to today's log file.

use std::fs::OpenOptions;
use std::io::Write;
use std::panic::{PanicHookInfo, take_hook};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::logging::LOG_FILE_PREFIX;

/// Install the hook, chaining to the previously installed one.
pub fn install(log_dir: impl AsRef<Path>) {
    let log_dir = log_dir.as_ref().to_path_buf();
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let record = panic_record(info);
        tracing::error!(target: "hls_gateway::panic", "{record}");

        if cfg!(panic = "abort") {
            let _ = append_to_daily_log(&log_dir, &record);
        }

        previous_hook(info);
    }));
}

fn append_to_daily_log(log_dir: &Path, record: &str) -> std::io::Result<()> {
    let path = PathBuf::from(log_dir).join(format!(
        "{}.{}",
        LOG_FILE_PREFIX,
        Local::now().format("%Y-%m-%d")
    ));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")
}

fn panic_record(info: &PanicHookInfo<'_>) -> String {
    let payload = info
        .payload()
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| info.to_string());
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "<unknown>".to_string());
    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");

    format!(
        "{} PANIC thread={} location={} payload={}\n{}",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
        thread_name,
        location,
        payload,
        std::backtrace::Backtrace::force_capture()
    )
}
