//! hls-gateway library crate.
//!
//! Supervises RTSP to HLS transcoder processes, serves their artifacts over
//! HTTP and stores overlay/settings metadata in SQLite.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod panic_hook;
pub mod stream;
pub mod utils;

pub use error::{Error, Result};
