//! API request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{AppSettings, Overlay};
use crate::stream::StreamSummary;

/// Value of the `status` field on successful responses.
pub const STATUS_SUCCESS: &str = "success";

/// Stream id used when a request does not name one.
pub const DEFAULT_STREAM_ID: &str = "default";

fn default_stream_id() -> String {
    DEFAULT_STREAM_ID.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartStreamRequest {
    #[serde(default)]
    pub rtsp_url: Option<String>,
    #[serde(default = "default_stream_id")]
    pub stream_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartStreamResponse {
    pub message: String,
    pub playlist_url: String,
    pub stream_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopStreamRequest {
    #[serde(default = "default_stream_id")]
    pub stream_id: String,
}

impl Default for StopStreamRequest {
    fn default() -> Self {
        Self {
            stream_id: default_stream_id(),
        }
    }
}

/// Generic `{message, status}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    pub status: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamStatusResponse {
    pub active_streams: Vec<StreamSummary>,
    pub total_streams: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayCreatedResponse {
    pub id: String,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayListResponse {
    pub overlays: Vec<Overlay>,
    pub count: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayResponse {
    pub overlay: Overlay,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub settings: AppSettings,
    pub status: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    /// `connected` or `disconnected`
    pub database: String,
    pub active_streams: usize,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}
