//! Asset job status repository: the `animals_recognized_at` marker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use fauna_core::{Error, Result, StatusRepository};

/// PostgreSQL implementation of StatusRepository.
#[derive(Clone)]
pub struct PgStatusRepository {
    pool: Pool<Postgres>,
}

impl PgStatusRepository {
    /// Create a new PgStatusRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

}

#[async_trait]
impl StatusRepository for PgStatusRepository {
    async fn mark_animals_recognized(&self, asset_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO asset_job_status (asset_id, animals_recognized_at) VALUES ($1, $2)
             ON CONFLICT (asset_id) DO UPDATE SET animals_recognized_at = EXCLUDED.animals_recognized_at",
        )
        .bind(asset_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn animals_recognized_at(&self, asset_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT animals_recognized_at FROM asset_job_status WHERE asset_id = $1",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(at.flatten())
    }
}
