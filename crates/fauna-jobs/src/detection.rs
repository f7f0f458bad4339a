//! Processing phase: detect animals for the assets of a work item.
//!
//! Per asset the worker loads the preview, asks the inference service for
//! detections, makes `Animals/<Label>` tags the asset's only animal links
//! (dropping any an earlier detection left) and finally stamps
//! `animals_recognized_at`. The timestamp is always written last, so an asset
//! that fails halfway stays eligible and is picked up by the next natural run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use fauna_core::defaults::{INFERENCE_TIMEOUT_SECS, PAGE_SIZE};
use fauna_core::logging::{ASSET_ID, DURATION_MS, PAGE};
use fauna_core::{
    animal_tag_names, AnimalDetector, AssetRepository, ConfigProvider, Error, JobType, Result,
    StatusRepository, TagRepository, WorkItem,
};

use crate::dispatch::ChunkDispatcher;
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::materializer::TagMaterializer;

/// Terminal outcome of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Animals found; the listed tag values are linked.
    Tagged { tags: Vec<String> },
    /// Inference succeeded with nothing at or above the minimum score.
    NoAnimals,
    /// The asset has no preview file. Marked processed.
    NoPreview,
    /// The asset is hidden. Left untouched.
    Hidden,
    /// The asset no longer exists. Left untouched.
    Missing,
    /// The feature is disabled. Left untouched.
    Skipped,
}

impl AssetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tagged { .. } => "tagged",
            Self::NoAnimals => "no_animals",
            Self::NoPreview => "no_preview",
            Self::Hidden => "hidden",
            Self::Missing => "missing",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-item counters, stored as the job result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub assets: usize,
    pub tagged: usize,
    pub no_animals: usize,
    pub no_preview: usize,
    pub hidden: usize,
    pub skipped: usize,
    pub missing: usize,
    pub failed: usize,
    /// Ids of the assets counted in `failed`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_assets: Vec<Uuid>,
}

impl ItemReport {
    fn record(&mut self, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::Tagged { .. } => self.tagged += 1,
            AssetOutcome::NoAnimals => self.no_animals += 1,
            AssetOutcome::NoPreview => self.no_preview += 1,
            AssetOutcome::Hidden => self.hidden += 1,
            AssetOutcome::Missing => self.missing += 1,
            AssetOutcome::Skipped => self.skipped += 1,
        }
    }

    fn record_failure(&mut self, asset_id: Uuid) {
        self.failed += 1;
        self.failed_assets.push(asset_id);
    }

    /// Assets that reached a terminal outcome other than failure.
    pub fn succeeded(&self) -> usize {
        self.assets - self.failed
    }

    /// Job result document for `item`.
    pub fn to_json(&self, item: &WorkItem, duration_ms: u64) -> JsonValue {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(obj) = value.as_object_mut() {
            match *item {
                WorkItem::SingleAsset { id } => {
                    obj.insert(ASSET_ID.to_string(), json!(id));
                }
                WorkItem::Page { number } => {
                    obj.insert(PAGE.to_string(), json!(number));
                }
            }
            obj.insert(DURATION_MS.to_string(), json!(duration_ms));
        }
        value
    }
}

/// Runs animal detection for work items.
#[derive(Clone)]
pub struct DetectionWorker {
    assets: Arc<dyn AssetRepository>,
    status: Arc<dyn StatusRepository>,
    detector: Arc<dyn AnimalDetector>,
    config_provider: Arc<dyn ConfigProvider>,
    materializer: TagMaterializer,
    dispatcher: ChunkDispatcher,
    inference_timeout: Duration,
}

impl DetectionWorker {
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        status: Arc<dyn StatusRepository>,
        tags: Arc<dyn TagRepository>,
        detector: Arc<dyn AnimalDetector>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            dispatcher: ChunkDispatcher::new(assets.clone()).with_page_size(PAGE_SIZE),
            materializer: TagMaterializer::new(tags),
            assets,
            status,
            detector,
            config_provider,
            inference_timeout: Duration::from_secs(INFERENCE_TIMEOUT_SECS),
        }
    }

    /// Page size used to resolve page work items.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.dispatcher = self.dispatcher.with_page_size(page_size);
        self
    }

    /// Upper bound on inference per configured endpoint, on top of the
    /// client's own request timeout.
    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    /// Run detection for one asset.
    pub async fn detect_asset(&self, asset_id: Uuid) -> Result<AssetOutcome> {
        let Some(asset) = self.assets.get_detectable(asset_id).await? else {
            debug!(subsystem = "jobs", component = "detector", %asset_id, "Asset no longer exists");
            return Ok(AssetOutcome::Missing);
        };

        if !asset.visibility.is_detectable() {
            debug!(subsystem = "jobs", component = "detector", %asset_id, "Asset is hidden");
            return Ok(AssetOutcome::Hidden);
        }

        let Some(preview_path) = asset.preview_path() else {
            debug!(subsystem = "jobs", component = "detector", %asset_id, "Asset has no preview");
            self.status.mark_animals_recognized(asset_id, Utc::now()).await?;
            return Ok(AssetOutcome::NoPreview);
        };

        let config = self.config_provider.animal_detection_config().await?;
        if !config.enabled {
            return Ok(AssetOutcome::Skipped);
        }

        let options = config.detection_options();
        // Failover may try every endpoint in turn.
        let attempts = config.inference_endpoints.len().clamp(1, u32::MAX as usize) as u32;
        let deadline = self.inference_timeout.saturating_mul(attempts);
        let start = Instant::now();
        let result = tokio::time::timeout(
            deadline,
            self.detector
                .detect_animals(&config.inference_endpoints, preview_path, &options),
        )
        .await
        .map_err(|_| Error::Timeout(deadline.as_secs()))??
        .retain_above(options.min_score);

        debug!(
            subsystem = "jobs",
            component = "detector",
            %asset_id,
            model = options.model_name.as_deref().unwrap_or("default"),
            min_score = options.min_score,
            detection_count = result.animals.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Inference complete"
        );
        for detection in &result.animals {
            trace!(%asset_id, label = %detection.label, score = detection.score, "Detection");
        }

        // Runs on the empty result too, clearing links from an earlier detection.
        let names = animal_tag_names(&result);
        let tags = self
            .materializer
            .materialize(asset.owner_id, asset_id, &names)
            .await?;
        let outcome = if tags.is_empty() {
            AssetOutcome::NoAnimals
        } else {
            AssetOutcome::Tagged {
                tags: tags.into_iter().map(|t| t.value).collect(),
            }
        };

        self.status.mark_animals_recognized(asset_id, Utc::now()).await?;
        Ok(outcome)
    }

    /// Process every asset of `item`. Per-asset failures are logged and
    /// counted; only failing to resolve the item is an error.
    pub async fn process_item(&self, item: &WorkItem) -> Result<ItemReport> {
        let asset_ids = self.dispatcher.resolve(item).await?;
        let mut report = ItemReport {
            assets: asset_ids.len(),
            ..Default::default()
        };

        for asset_id in asset_ids {
            match self.detect_asset(asset_id).await {
                Ok(outcome) => {
                    trace!(subsystem = "jobs", component = "detector", %asset_id, outcome = outcome.as_str(), "Asset done");
                    report.record(&outcome);
                }
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "detector",
                        %asset_id,
                        error = %e,
                        "Animal detection failed for asset"
                    );
                    report.record_failure(asset_id);
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl JobHandler for DetectionWorker {
    fn job_type(&self) -> JobType {
        JobType::AnimalDetection
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let item = match ctx.work_item() {
            Ok(item) => item,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        let start = Instant::now();
        ctx.report_progress(0, Some("Detecting animals"));
        match self.process_item(&item).await {
            Ok(report) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    subsystem = "jobs",
                    component = "detector",
                    job_id = %ctx.job.id,
                    ?item,
                    asset_count = report.assets,
                    tagged = report.tagged,
                    failed = report.failed,
                    duration_ms,
                    "Work item processed"
                );
                ctx.report_progress(100, None);
                JobResult::Success(Some(report.to_json(&item, duration_ms)))
            }
            Err(e) => JobResult::from_error(&e),
        }
    }
}
