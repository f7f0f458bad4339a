//! Tag repository implementation.
//!
//! Tags are unique per `(user_id, value)` (`tags_user_id_value_uq`). Upserts
//! go through `ON CONFLICT DO NOTHING` followed by a read, so a caller racing
//! another worker for the same name gets the row the other worker created.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use fauna_core::defaults::TAG_PATH_SEPARATOR;
use fauna_core::{
    new_v7, parent_tag_value, tag_lineage, validate_tag_value, Error, Result, Tag, TagRepository,
};

const TAG_COLUMNS: &str = "id, user_id, value, parent_id, created_at, updated_at";

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_tag_row(row: PgRow) -> Tag {
        Tag {
            id: row.get("id"),
            user_id: row.get("user_id"),
            value: row.get("value"),
            parent_id: row.get("parent_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }


    /// Insert one tag, or read the existing row for `(owner_id, value)`.
    ///
    /// Existing rows are not updated, so the shared `Animals` root is never
    /// row-locked by a tagging transaction. The only write to an existing
    /// row fills a missing `parent_id`.
    async fn insert_or_get(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        value: &str,
        parent_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Tag> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO tags (id, user_id, value, parent_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             ON CONFLICT (user_id, value) DO NOTHING
             RETURNING {TAG_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(owner_id)
        .bind(value)
        .bind(parent_id)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        if let Some(row) = inserted {
            return Ok(Self::parse_tag_row(row));
        }

        // A fresh statement sees rows committed by the racing insert.
        let row = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE user_id = $1 AND value = $2"
        ))
        .bind(owner_id)
        .bind(value)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        let existing = Self::parse_tag_row(row);

        match (existing.parent_id, parent_id) {
            (None, Some(parent_id)) => {
                let row = sqlx::query(&format!(
                    "UPDATE tags SET parent_id = COALESCE(parent_id, $1), updated_at = $2
                     WHERE id = $3
                     RETURNING {TAG_COLUMNS}"
                ))
                .bind(parent_id)
                .bind(now)
                .bind(existing.id)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;
                Ok(Self::parse_tag_row(row))
            }
            _ => Ok(existing),
        }
    }
}

/// Escape `LIKE` wildcards so `value` matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn upsert_tags(&self, owner_id: Uuid, names: &[String]) -> Result<Vec<Tag>> {
        for name in names {
            validate_tag_value(name).map_err(Error::InvalidInput)?;
        }

        // Sorted so concurrent upserts lock rows in the same order, and so
        // every parent is written before its children.
        let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let owner_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        if !owner_exists {
            return Err(Error::UserNotFound(owner_id));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut resolved: HashMap<String, Tag> = HashMap::new();

        for name in &unique {
            for value in tag_lineage(name) {
                if resolved.contains_key(value) {
                    continue;
                }
                let parent_id = parent_tag_value(value)
                    .and_then(|parent| resolved.get(parent))
                    .map(|t| t.id);

                let tag = Self::insert_or_get(&mut tx, owner_id, value, parent_id, now).await?;
                resolved.insert(value.to_string(), tag);
            }
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tags",
            owner_id = %owner_id,
            tag_count = unique.len(),
            "Upserted tags"
        );

        Ok(unique
            .into_iter()
            .filter_map(|name| resolved.remove(name))
            .collect())
    }

    async fn link_assets(&self, tag_id: Uuid, asset_ids: &[Uuid]) -> Result<u64> {
        if asset_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO tag_asset (tag_id, asset_id)
             SELECT $1, asset_id FROM UNNEST($2::uuid[]) AS t(asset_id)
             ON CONFLICT DO NOTHING",
        )
        .bind(tag_id)
        .bind(asset_ids)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn unlink_asset_under(&self, asset_id: Uuid, root: &str, keep: &[Uuid]) -> Result<u64> {
        let descendants = format!("{}{}%", escape_like(root), TAG_PATH_SEPARATOR);
        let result = sqlx::query(
            "DELETE FROM tag_asset ta
             USING tags t
             WHERE ta.tag_id = t.id
               AND ta.asset_id = $1
               AND (t.value = $2 OR t.value LIKE $3)
               AND NOT (ta.tag_id = ANY($4::uuid[]))",
        )
        .bind(asset_id)
        .bind(root)
        .bind(descendants)
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn get_for_asset(&self, asset_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT t.id, t.user_id, t.value, t.parent_id, t.created_at, t.updated_at
             FROM tags t
             JOIN tag_asset ta ON ta.tag_id = t.id
             WHERE ta.asset_id = $1
             ORDER BY t.value",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_tag_row).collect())
    }
}
