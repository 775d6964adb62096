//! HTTP facade.
//!
//! Translates JSON requests into registry and repository operations and
//! serves HLS artifacts from the output root.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
