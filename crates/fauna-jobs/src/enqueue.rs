//! Enumeration phase: drain the eligibility stream into batched queue submissions.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use fauna_core::defaults::{
    ENV_PAGE_SIZE, ENV_QUEUE_BATCH_SIZE, ENV_WORK_ITEM_GRANULARITY, PAGE_SIZE, QUEUE_BATCH_SIZE,
};
use fauna_core::logging::{BATCH_COUNT, DURATION_MS, FORCE};
use fauna_core::{
    AssetRepository, ConfigProvider, Granularity, JobQueue, JobType, Result, RunStatus, WorkItem,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Enqueue tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueConfig {
    /// Work items per queue submission.
    pub batch_size: usize,
    /// Assets per page work item.
    pub page_size: u32,
    /// Work item shape for forced runs.
    pub granularity: Granularity,
}

impl Default for EnqueueConfig {
    fn default() -> Self {
        Self {
            batch_size: QUEUE_BATCH_SIZE,
            page_size: PAGE_SIZE,
            granularity: Granularity::default(),
        }
    }
}

impl EnqueueConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FAUNA_QUEUE_BATCH_SIZE` | `1000` | Work items per submission |
    /// | `FAUNA_PAGE_SIZE` | `1000` | Assets per page item |
    /// | `FAUNA_WORK_ITEM_GRANULARITY` | `asset` | `asset` or `page` (forced runs only) |
    pub fn from_env() -> Self {
        let batch_size = std::env::var(ENV_QUEUE_BATCH_SIZE)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(QUEUE_BATCH_SIZE);

        let page_size = std::env::var(ENV_PAGE_SIZE)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(PAGE_SIZE);

        let granularity = match std::env::var(ENV_WORK_ITEM_GRANULARITY) {
            Ok(v) => v.parse::<Granularity>().unwrap_or_else(|e| {
                warn!(subsystem = "jobs", component = "enqueuer", error = %e, "Falling back to per-asset work items");
                Granularity::Asset
            }),
            Err(_) => Granularity::Asset,
        };

        Self::default()
            .with_batch_size(batch_size)
            .with_page_size(page_size)
            .with_granularity(granularity)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }
}

/// Outcome and counters of one queue-all run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueSummary {
    pub status: RunStatus,
    pub force: bool,
    /// Work items submitted.
    pub items: usize,
    /// Queue submissions performed.
    pub batches: usize,
}

impl EnqueueSummary {
    fn new(status: RunStatus, force: bool) -> Self {
        Self {
            status,
            force,
            items: 0,
            batches: 0,
        }
    }
}

/// Drains eligible assets into the job queue in bounded batches.
#[derive(Clone)]
pub struct BatchEnqueuer {
    assets: Arc<dyn AssetRepository>,
    queue: Arc<dyn JobQueue>,
    config_provider: Arc<dyn ConfigProvider>,
    config: EnqueueConfig,
}

impl BatchEnqueuer {
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        queue: Arc<dyn JobQueue>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            assets,
            queue,
            config_provider,
            config: EnqueueConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EnqueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EnqueueConfig {
        &self.config
    }

    /// Enqueue detection work for every eligible asset.
    pub async fn queue_all(&self, force: bool) -> Result<RunStatus> {
        self.run(force).await.map(|summary| summary.status)
    }

    /// Like [`queue_all`](Self::queue_all), returning the submission counters.
    pub async fn run(&self, force: bool) -> Result<EnqueueSummary> {
        let start = Instant::now();

        let detection_config = self.config_provider.animal_detection_config().await?;
        if !detection_config.enabled {
            info!(
                subsystem = "jobs",
                component = "enqueuer",
                op = "queue_all",
                force,
                "Animal detection is disabled, skipping"
            );
            return Ok(EnqueueSummary::new(RunStatus::Skipped, force));
        }

        let mut summary = EnqueueSummary::new(RunStatus::Completed, force);
        if force && self.config.granularity == Granularity::Page {
            self.enqueue_pages(&mut summary).await?;
        } else {
            self.enqueue_assets(force, &mut summary).await?;
        }

        info!(
            subsystem = "jobs",
            component = "enqueuer",
            op = "queue_all",
            force,
            granularity = ?self.config.granularity,
            item_count = summary.items,
            batch_count = summary.batches,
            duration_ms = start.elapsed().as_millis() as u64,
            "Queued animal detection work"
        );
        Ok(summary)
    }

    async fn enqueue_assets(&self, force: bool, summary: &mut EnqueueSummary) -> Result<()> {
        // Only the current batch is held in memory.
        let mut buffer = Vec::with_capacity(self.config.batch_size);

        let mut stream = self.assets.stream_eligible(force);
        while let Some(asset_id) = stream.try_next().await? {
            buffer.push(WorkItem::asset(asset_id));
            if buffer.len() >= self.config.batch_size {
                self.flush(&mut buffer, summary).await?;
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, summary).await?;
        }
        Ok(())
    }

    async fn enqueue_pages(&self, summary: &mut EnqueueSummary) -> Result<()> {
        let count = self.assets.count_detectable().await?;
        let page_size = u64::from(self.config.page_size);
        let pages = count.div_ceil(page_size);

        debug!(
            subsystem = "jobs",
            component = "enqueuer",
            asset_count = count,
            page_size,
            pages,
            "Enqueuing page work items"
        );

        let mut buffer = Vec::with_capacity(self.config.batch_size);
        for page in 0..pages {
            let number = u32::try_from(page).map_err(|_| {
                fauna_core::Error::InvalidInput(format!("Page number {} out of range", page))
            })?;
            buffer.push(WorkItem::page(number));
            if buffer.len() >= self.config.batch_size {
                self.flush(&mut buffer, summary).await?;
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, summary).await?;
        }
        Ok(())
    }

    async fn flush(&self, buffer: &mut Vec<WorkItem>, summary: &mut EnqueueSummary) -> Result<()> {
        self.queue.submit_batch(buffer).await?;
        summary.items += buffer.len();
        summary.batches += 1;
        debug!(
            subsystem = "jobs",
            component = "enqueuer",
            batch_size = buffer.len(),
            batch_count = summary.batches,
            "Submitted batch"
        );
        buffer.clear();
        Ok(())
    }
}

#[async_trait]
impl JobHandler for BatchEnqueuer {
    fn job_type(&self) -> JobType {
        JobType::AnimalDetectionQueueAll
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let request = match ctx.queue_all_request() {
            Ok(request) => request,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        let start = Instant::now();
        match self.run(request.force).await {
            Ok(summary) => JobResult::Success(Some(json!({
                "status": summary.status,
                FORCE: summary.force,
                "items": summary.items,
                BATCH_COUNT: summary.batches,
                DURATION_MS: start.elapsed().as_millis() as u64,
            }))),
            Err(e) => JobResult::from_error(&e),
        }
    }
}
