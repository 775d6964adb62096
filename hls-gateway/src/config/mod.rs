//! Environment-driven service configuration.
//!
//! Values are read once at startup, after `.env` has been loaded. Numeric
//! variables that fail to parse are ignored with a warning.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::stream::RegistryConfig;

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse a comma separated list; `*` allows any origin.
    pub fn parse(value: &str) -> Self {
        let origins: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.iter().any(|origin| origin == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    /// Request body size limit in bytes.
    pub body_limit: usize,
    pub database_url: String,
    pub log_dir: PathBuf,
    /// How long the start handler waits for the first playlist.
    pub playlist_wait: Duration,
    pub registry: RegistryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: CorsOrigins::List(vec!["http://localhost:3000".to_string()]),
            body_limit: 16 * 1024 * 1024,
            database_url: "sqlite:hls-gateway.db?mode=rwc".to_string(),
            log_dir: PathBuf::from("./logs"),
            playlist_wait: Duration::from_secs(5),
            registry: RegistryConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported env vars: `API_BIND_ADDRESS`, `API_PORT`, `CORS_ORIGINS`,
    /// `HLS_OUTPUT_DIR`, `FFMPEG_PATH`, `DATABASE_URL`, `LOG_DIR`,
    /// `PLAYLIST_WAIT_SECS`, `MAX_BODY_BYTES`.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(bind_address) = non_empty("API_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }
        if let Some(port) = parse_var(&lookup, "API_PORT") {
            config.port = port;
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            config.cors_origins = CorsOrigins::parse(&origins);
        }
        if let Some(body_limit) = parse_var(&lookup, "MAX_BODY_BYTES") {
            config.body_limit = body_limit;
        }
        if let Some(database_url) = non_empty("DATABASE_URL") {
            config.database_url = database_url;
        }
        if let Some(log_dir) = non_empty("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PLAYLIST_WAIT_SECS") {
            config.playlist_wait = Duration::from_secs(secs);
        }
        if let Some(output_dir) = non_empty("HLS_OUTPUT_DIR") {
            config.registry.output_root = PathBuf::from(output_dir);
        }
        if let Some(ffmpeg) = non_empty("FFMPEG_PATH") {
            config.registry.transcoder_path = ffmpeg;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = key, value = %raw, error = %e, "Ignoring invalid environment value");
            None
        }
    }
}
