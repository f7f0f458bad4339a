//! Job queue repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use fauna_core::defaults::JOB_MAX_RETRIES;
use fauna_core::{new_v7, Error, Job, JobQueue, JobType, Result, WorkItem};

const JOB_COLUMNS: &str = "id, asset_id, job_type::text AS job_type, status::text AS status, \
     payload, result, error_message, retry_count, max_retries, created_at, started_at, completed_at";

/// Error recorded on jobs recovered from a dead worker.
pub const STALE_JOB_ERROR: &str = "worker stopped while the job was running";

/// PostgreSQL implementation of the job queue.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Woken whenever jobs are queued so idle workers skip their poll sleep.
    notify: Arc<Notify>,
    max_retries: i32,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
            max_retries: JOB_MAX_RETRIES,
        }
    }

    /// Override the retry budget given to newly queued jobs.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries.max(0);
        self
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn parse_job_row(row: PgRow) -> Result<Job> {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");
        Ok(Job {
            id: row.get("id"),
            asset_id: row.get("asset_id"),
            job_type: job_type.parse()?,
            status: status.parse()?,
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    /// Queue a single job.
    pub async fn queue(
        &self,
        job_type: JobType,
        asset_id: Option<Uuid>,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let job_id = new_v7();
        sqlx::query(
            "INSERT INTO job_queue (id, asset_id, job_type, status, payload, max_retries, created_at)
             VALUES ($1, $2, $3::job_type, 'pending'::job_status, $4, $5, $6)",
        )
        .bind(job_id)
        .bind(asset_id)
        .bind(job_type.as_str())
        .bind(&payload)
        .bind(self.max_retries)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    /// Claim the next pending job whose type is in `job_types`.
    /// An empty slice means "claim any type".
    pub async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let type_strings: Vec<String> = job_types.iter().map(|t| t.as_str().to_string()).collect();

        // SKIP LOCKED lets any number of workers claim concurrently without
        // handing the same job to two of them.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'running'::job_status, started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'::job_status
                   AND (cardinality($2::text[]) = 0 OR job_type::text = ANY($2))
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(&type_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    /// Mark a job as completed.
    pub async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed'::job_status, completed_at = $1, result = $2
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Record a failed attempt: back to pending while retries remain,
    /// otherwise failed for good.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) = sqlx::query_as(
            "SELECT retry_count, max_retries FROM job_queue WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if retry_count < max_retries {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending'::job_status, retry_count = $1, error_message = $2,
                     started_at = NULL
                 WHERE id = $3",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed'::job_status, completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(Utc::now())
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    /// Mark a job failed without consuming the retry budget.
    pub async fn abandon(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'failed'::job_status, completed_at = $1, error_message = $2
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Recover jobs left `running` by a crashed worker.
    ///
    /// Each recovery counts as an attempt: jobs with retries left go back to
    /// `pending`, the rest are failed. Returns the number of jobs recovered.
    pub async fn requeue_stale(&self, older_than: chrono::Duration) -> Result<u64> {
        let now = Utc::now();
        let cutoff = now - older_than;
        let result = sqlx::query(
            "UPDATE job_queue
             SET status = CASE WHEN retry_count < max_retries
                               THEN 'pending'::job_status ELSE 'failed'::job_status END,
                 retry_count = LEAST(retry_count + 1, max_retries),
                 started_at = CASE WHEN retry_count < max_retries THEN NULL ELSE started_at END,
                 completed_at = CASE WHEN retry_count < max_retries THEN NULL ELSE $2 END,
                 error_message = $3
             WHERE status = 'running'::job_status AND started_at < $1",
        )
        .bind(cutoff)
        .bind(now)
        .bind(STALE_JOB_ERROR)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            self.notify.notify_waiters();
        }
        Ok(result.rows_affected())
    }

    /// Get job by ID.
    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    /// Get pending jobs count.
    pub async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_queue WHERE status = 'pending'::job_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}

#[async_trait]
impl JobQueue for PgJobRepository {
    async fn submit_batch(&self, items: &[WorkItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(items.len());
        let mut asset_ids = Vec::with_capacity(items.len());
        let mut payloads = Vec::with_capacity(items.len());
        for item in items {
            ids.push(new_v7());
            asset_ids.push(item.asset_id());
            payloads.push(serde_json::to_value(item)?);
        }

        // One round trip per batch.
        let result = sqlx::query(
            "INSERT INTO job_queue (id, asset_id, job_type, status, payload, max_retries, created_at)
             SELECT id, asset_id, $4::job_type, 'pending'::job_status, payload, $5, $6
             FROM UNNEST($1::uuid[], $2::uuid[], $3::jsonb[]) AS t(id, asset_id, payload)",
        )
        .bind(&ids)
        .bind(&asset_ids)
        .bind(&payloads)
        .bind(JobType::AnimalDetection.as_str())
        .bind(self.max_retries)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "jobs",
            op = "submit_batch",
            batch_size = items.len(),
            "Submitted work items"
        );

        self.notify.notify_waiters();
        Ok(result.rows_affected() as usize)
    }
}
