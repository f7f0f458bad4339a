//! Asset repository implementation.
//!
//! Assets belong to the surrounding asset-management system; this repository
//! only reads them. A qualifying asset is not soft-deleted, not hidden, and
//! has at least one preview file.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use fauna_core::{AssetRepository, AssetVisibility, DetectableAsset, Error, PreviewFile, Result};

/// Shared predicate for qualifying assets. Expects the asset aliased as `a`.
const QUALIFYING: &str = "a.deleted_at IS NULL
    AND a.visibility <> 'hidden'::asset_visibility
    AND EXISTS (
        SELECT 1 FROM asset_files f
        WHERE f.asset_id = a.id AND f.type = 'preview'::asset_file_type
    )";

/// PostgreSQL implementation of AssetRepository.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: Pool<Postgres>,
    eligible_sql: String,
    count_sql: String,
    page_sql: String,
}

impl PgAssetRepository {
    /// Create a new PgAssetRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            eligible_sql: format!(
                "SELECT a.id FROM assets a
                 LEFT JOIN asset_job_status s ON s.asset_id = a.id
                 WHERE {QUALIFYING}
                   AND ($1 OR s.animals_recognized_at IS NULL)"
            ),
            count_sql: format!("SELECT COUNT(*) FROM assets a WHERE {QUALIFYING}"),
            page_sql: format!(
                "SELECT a.id FROM assets a
                 WHERE {QUALIFYING}
                 ORDER BY a.id
                 LIMIT $1 OFFSET $2"
            ),
        }
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    fn stream_eligible(&self, force: bool) -> BoxStream<'_, Result<Uuid>> {
        debug!(subsystem = "db", component = "assets", force, "Streaming eligible assets");
        sqlx::query_scalar::<_, Uuid>(&self.eligible_sql)
            .bind(force)
            .fetch(&self.pool)
            .map_err(Error::Database)
            .boxed()
    }

    async fn count_detectable(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&self.count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.max(0) as u64)
    }

    async fn page_detectable(&self, page: u32, page_size: u32) -> Result<Vec<Uuid>> {
        let offset = i64::from(page) * i64::from(page_size);
        let ids = sqlx::query_scalar::<_, Uuid>(&self.page_sql)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn get_detectable(&self, asset_id: Uuid) -> Result<Option<DetectableAsset>> {
        let row = sqlx::query(
            "SELECT id, owner_id, visibility::text AS visibility
             FROM assets
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let visibility: String = row.get("visibility");
        let files = sqlx::query(
            "SELECT id, asset_id, path FROM asset_files
             WHERE asset_id = $1 AND type = 'preview'::asset_file_type
             ORDER BY created_at, id",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Some(DetectableAsset {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            visibility: visibility.parse::<AssetVisibility>()?,
            preview_files: files
                .into_iter()
                .map(|f| PreviewFile {
                    id: f.get("id"),
                    asset_id: f.get("asset_id"),
                    path: f.get("path"),
                })
                .collect(),
        }))
    }
}
