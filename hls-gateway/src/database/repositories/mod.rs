//! Repository layer for database access.

pub mod overlay;
pub mod settings;

pub use overlay::{OverlayRepository, SqlxOverlayRepository};
pub use settings::{SettingsRepository, SqlxSettingsRepository};
