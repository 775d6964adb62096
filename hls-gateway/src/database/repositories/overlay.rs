//! Overlay repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{NewOverlay, OverlayDbModel, OverlayPatch};
use crate::{Error, Result};

/// Overlay repository trait.
#[async_trait]
pub trait OverlayRepository: Send + Sync {
    async fn create(&self, overlay: NewOverlay) -> Result<OverlayDbModel>;
    async fn get(&self, id: &str) -> Result<OverlayDbModel>;
    /// Active overlays, newest first.
    async fn list_active(&self) -> Result<Vec<OverlayDbModel>>;
    async fn update(&self, id: &str, patch: OverlayPatch) -> Result<OverlayDbModel>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// SQLx implementation of OverlayRepository.
pub struct SqlxOverlayRepository {
    pool: SqlitePool,
}

impl SqlxOverlayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OverlayRepository for SqlxOverlayRepository {
    async fn create(&self, overlay: NewOverlay) -> Result<OverlayDbModel> {
        let row = OverlayDbModel::new(overlay)?;
        sqlx::query(
            r#"
            INSERT INTO overlays (
                id, name, overlay_type, content, position_x, position_y,
                width, height, style, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.overlay_type)
        .bind(&row.content)
        .bind(row.position_x)
        .bind(row.position_y)
        .bind(row.width)
        .bind(row.height)
        .bind(&row.style)
        .bind(row.is_active)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: &str) -> Result<OverlayDbModel> {
        sqlx::query_as::<_, OverlayDbModel>("SELECT * FROM overlays WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Overlay", id))
    }

    async fn list_active(&self) -> Result<Vec<OverlayDbModel>> {
        let overlays = sqlx::query_as::<_, OverlayDbModel>(
            "SELECT * FROM overlays WHERE is_active = 1 ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(overlays)
    }

    async fn update(&self, id: &str, patch: OverlayPatch) -> Result<OverlayDbModel> {
        let mut row = self.get(id).await?;
        row.apply(patch)?;

        let result = sqlx::query(
            r#"
            UPDATE overlays SET
                name = ?,
                overlay_type = ?,
                content = ?,
                position_x = ?,
                position_y = ?,
                width = ?,
                height = ?,
                style = ?,
                is_active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.name)
        .bind(&row.overlay_type)
        .bind(&row.content)
        .bind(row.position_x)
        .bind(row.position_y)
        .bind(row.width)
        .bind(row.height)
        .bind(&row.style)
        .bind(row.is_active)
        .bind(row.updated_at)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Overlay", id));
        }
        Ok(row)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM overlays WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Overlay", id));
        }
        Ok(())
    }
}
