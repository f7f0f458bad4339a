//! System configuration stored in `system_metadata`.
//!
//! The animal detection settings live as one JSON document under the
//! `animal_detection` key. Missing keys fall back to the built-in defaults,
//! and a missing row means "all defaults".

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres};
use tracing::debug;

use fauna_core::defaults::ANIMAL_CONFIG_KEY;
use fauna_core::{AnimalDetectionConfig, ConfigProvider, Error, Result};

/// PostgreSQL-backed [`ConfigProvider`].
#[derive(Clone)]
pub struct PgSystemConfigRepository {
    pool: Pool<Postgres>,
}

impl PgSystemConfigRepository {
    /// Create a new PgSystemConfigRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Persist the animal detection config, replacing any previous value.
    pub async fn set_animal_detection_config(&self, config: &AnimalDetectionConfig) -> Result<()> {
        if !(0.0..=1.0).contains(&config.min_score) {
            return Err(Error::Config(format!(
                "min_score must be within [0, 1], got {}",
                config.min_score
            )));
        }
        let value = serde_json::to_value(config)?;
        sqlx::query(
            "INSERT INTO system_metadata (key, value, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
        )
        .bind(ANIMAL_CONFIG_KEY)
        .bind(&value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigProvider for PgSystemConfigRepository {
    async fn animal_detection_config(&self) -> Result<AnimalDetectionConfig> {
        let value: Option<JsonValue> =
            sqlx::query_scalar("SELECT value FROM system_metadata WHERE key = $1")
                .bind(ANIMAL_CONFIG_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        let Some(value) = value else {
            debug!(
                subsystem = "db",
                component = "system_config",
                "No stored animal detection config, using defaults"
            );
            return Ok(AnimalDetectionConfig::default());
        };

        serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid {} config: {}", ANIMAL_CONFIG_KEY, e)))
    }
}
