//! # fauna-db
//!
//! PostgreSQL database layer for the fauna animal detection pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - Read access to assets and their preview files
//! - The per-asset `animals_recognized_at` marker
//! - Concurrency-safe, owner-scoped tag upserts and asset links
//! - A `FOR UPDATE SKIP LOCKED` job queue
//! - Live feature configuration from `system_metadata`
//!
//! ## Example
//!
//! ```rust,ignore
//! use fauna_db::{Database, JobQueue, WorkItem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/fauna").await?;
//!     let queued = db.jobs.submit_batch(&[WorkItem::page(0)]).await?;
//!     println!("Queued {} work items", queued);
//!     Ok(())
//! }
//! ```
pub mod assets;
pub mod jobs;
pub mod pool;
pub mod status;
pub mod system_config;
pub mod tags;

// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use fauna_core::*;

pub use assets::PgAssetRepository;
pub use jobs::PgJobRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use status::PgStatusRepository;
pub use system_config::PgSystemConfigRepository;
pub use tags::PgTagRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Asset reads and eligibility enumeration.
    pub assets: PgAssetRepository,
    /// Per-asset job markers.
    pub status: PgStatusRepository,
    /// Owner-scoped tags.
    pub tags: PgTagRepository,
    /// Job repository for background processing.
    pub jobs: PgJobRepository,
    /// Live feature configuration.
    pub config: PgSystemConfigRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            assets: PgAssetRepository::new(pool.clone()),
            status: PgStatusRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            config: PgSystemConfigRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
