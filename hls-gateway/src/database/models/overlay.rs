//! Overlay database model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{ms_to_datetime, now_ms};
use crate::{Error, Result};

/// Kind of overlay content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayType {
    Text,
    Image,
}

impl OverlayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

fn empty_style() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_active() -> bool {
    true
}

/// Fields supplied when creating an overlay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewOverlay {
    pub name: String,
    #[serde(rename = "type")]
    pub overlay_type: OverlayType,
    pub content: String,
    pub position: Position,
    pub size: Size,
    #[serde(default = "empty_style")]
    pub style: serde_json::Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial overlay update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverlayPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub overlay_type: Option<OverlayType>,
    pub content: Option<String>,
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub style: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

fn check_style(style: &serde_json::Value) -> Result<()> {
    if style.is_object() {
        Ok(())
    } else {
        Err(Error::validation("Overlay style must be a JSON object"))
    }
}

/// Overlay row.
#[derive(Debug, Clone, FromRow)]
pub struct OverlayDbModel {
    pub id: String,
    pub name: String,
    /// `text` or `image`
    pub overlay_type: String,
    pub content: String,
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
    /// JSON object
    pub style: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OverlayDbModel {
    /// Build a new row with a fresh id and timestamps.
    pub fn new(overlay: NewOverlay) -> Result<Self> {
        check_style(&overlay.style)?;
        let now = now_ms();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: overlay.name,
            overlay_type: overlay.overlay_type.as_str().to_string(),
            content: overlay.content,
            position_x: overlay.position.x,
            position_y: overlay.position.y,
            width: overlay.size.width,
            height: overlay.size.height,
            style: serde_json::to_string(&overlay.style)?,
            is_active: overlay.is_active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn apply(&mut self, patch: OverlayPatch) -> Result<()> {
        if let Some(style) = &patch.style {
            check_style(style)?;
            self.style = serde_json::to_string(style)?;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(overlay_type) = patch.overlay_type {
            self.overlay_type = overlay_type.as_str().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(position) = patch.position {
            self.position_x = position.x;
            self.position_y = position.y;
        }
        if let Some(size) = patch.size {
            self.width = size.width;
            self.height = size.height;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        self.updated_at = now_ms().max(self.updated_at);
        Ok(())
    }

    /// Decode into the API shape.
    pub fn to_overlay(&self) -> Result<Overlay> {
        let overlay_type = OverlayType::parse(&self.overlay_type).ok_or_else(|| {
            Error::Other(format!("Unknown overlay type in database: {}", self.overlay_type))
        })?;

        Ok(Overlay {
            id: self.id.clone(),
            name: self.name.clone(),
            overlay_type,
            content: self.content.clone(),
            position: Position {
                x: self.position_x,
                y: self.position_y,
            },
            size: Size {
                width: self.width,
                height: self.height,
            },
            style: serde_json::from_str(&self.style)?,
            is_active: self.is_active,
            created_at: ms_to_datetime(self.created_at),
            updated_at: ms_to_datetime(self.updated_at),
        })
    }
}

/// Overlay as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub overlay_type: OverlayType,
    pub content: String,
    pub position: Position,
    pub size: Size,
    pub style: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_overlay() -> NewOverlay {
        serde_json::from_value(json!({
            "name": "Logo",
            "type": "image",
            "content": "https://example.com/logo.png",
            "position": {"x": 10, "y": 20.5},
            "size": {"width": 100, "height": 50}
        }))
        .unwrap()
    }

    #[test]
    fn test_new_overlay_defaults() {
        let overlay = new_overlay();
        assert_eq!(overlay.overlay_type, OverlayType::Image);
        assert_eq!(overlay.style, json!({}));
        assert!(overlay.is_active);
        assert_eq!(overlay.position.y, 20.5);
    }

    #[test]
    fn test_missing_size_is_rejected() {
        let result = serde_json::from_value::<NewOverlay>(json!({
            "name": "Title",
            "type": "text",
            "content": "Hello",
            "position": {"x": 0, "y": 0}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_numeric_position_is_rejected() {
        let result = serde_json::from_value::<NewOverlay>(json!({
            "name": "Title",
            "type": "text",
            "content": "Hello",
            "position": {"x": "left", "y": 0},
            "size": {"width": 1, "height": 1}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_row_round_trips_to_api_shape() {
        let row = OverlayDbModel::new(new_overlay()).unwrap();
        let overlay = row.to_overlay().unwrap();
        assert_eq!(overlay.id, row.id);
        assert_eq!(overlay.size, Size { width: 100.0, height: 50.0 });

        let value = serde_json::to_value(&overlay).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["position"]["x"], 10.0);
    }

    #[test]
    fn test_apply_patch() {
        let mut row = OverlayDbModel::new(new_overlay()).unwrap();
        row.apply(OverlayPatch {
            name: Some("Banner".to_string()),
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(row.name, "Banner");
        assert!(!row.is_active);
        assert_eq!(row.content, "https://example.com/logo.png");

        let err = row
            .apply(OverlayPatch {
                style: Some(json!("red")),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
