//! Application settings document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Application settings, stored as a single JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub auto_start_streams: bool,
    pub default_stream_quality: String,
    pub max_concurrent_streams: i64,
    pub retention_days: i64,
    pub notifications_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_start_streams: false,
            default_stream_quality: "720p".to_string(),
            max_concurrent_streams: 5,
            retention_days: 7,
            notifications_enabled: true,
        }
    }
}

fn invalid(key: &str) -> Error {
    Error::validation(format!("Invalid type for setting: {}", key))
}

impl AppSettings {
    /// Merge the known keys of `patch` into these settings.
    ///
    /// All values are type-checked before anything is applied, so a rejected
    /// patch leaves the settings untouched. Unknown keys are ignored.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> Result<()> {
        let mut merged = self.clone();

        for (key, value) in patch {
            match key.as_str() {
                "auto_start_streams" => {
                    merged.auto_start_streams = value.as_bool().ok_or_else(|| invalid(key))?
                }
                "default_stream_quality" => {
                    merged.default_stream_quality =
                        value.as_str().ok_or_else(|| invalid(key))?.to_string()
                }
                "max_concurrent_streams" => {
                    merged.max_concurrent_streams = value.as_i64().ok_or_else(|| invalid(key))?
                }
                "retention_days" => {
                    merged.retention_days = value.as_i64().ok_or_else(|| invalid(key))?
                }
                "notifications_enabled" => {
                    merged.notifications_enabled = value.as_bool().ok_or_else(|| invalid(key))?
                }
                _ => {}
            }
        }

        *self = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert!(!settings.auto_start_streams);
        assert_eq!(settings.default_stream_quality, "720p");
        assert_eq!(settings.max_concurrent_streams, 5);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let settings: AppSettings = serde_json::from_value(json!({"retention_days": 30})).unwrap();
        assert_eq!(settings.retention_days, 30);
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn test_merge_applies_known_keys() {
        let mut settings = AppSettings::default();
        settings
            .merge(&patch(json!({
                "auto_start_streams": true,
                "max_concurrent_streams": 8,
                "unknown": "ignored"
            })))
            .unwrap();
        assert!(settings.auto_start_streams);
        assert_eq!(settings.max_concurrent_streams, 8);
    }

    #[test]
    fn test_merge_rejects_wrong_type_without_partial_apply() {
        let mut settings = AppSettings::default();
        let err = settings
            .merge(&patch(json!({
                "auto_start_streams": true,
                "retention_days": "seven"
            })))
            .unwrap_err();
        assert!(err.to_string().contains("retention_days"));
        assert_eq!(settings, AppSettings::default());
    }
}
