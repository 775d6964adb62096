//! Settings repository.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::AppSettings;
use crate::database::time::now_ms;

/// Settings repository trait.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Stored settings, or the defaults if none were ever saved.
    async fn get(&self) -> Result<AppSettings>;
    /// Merge `patch` into the stored settings and save the result.
    async fn update(&self, patch: &Map<String, Value>) -> Result<AppSettings>;
}

/// SQLx implementation of SettingsRepository.
pub struct SqlxSettingsRepository {
    pool: SqlitePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self) -> Result<AppSettings> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM app_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match document {
            Some(document) => Ok(serde_json::from_str(&document)?),
            None => Ok(AppSettings::default()),
        }
    }

    async fn update(&self, patch: &Map<String, Value>) -> Result<AppSettings> {
        let mut settings = self.get().await?;
        settings.merge(patch)?;

        sqlx::query(
            r#"
            INSERT INTO app_settings (id, document, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(serde_json::to_string(&settings)?)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(settings)
    }
}
