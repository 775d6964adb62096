//! Database models.
//!
//! These map directly to the database schema; JSON columns are stored as
//! text and decoded on the way out.

pub mod overlay;
pub mod settings;

pub use overlay::*;
pub use settings::*;
