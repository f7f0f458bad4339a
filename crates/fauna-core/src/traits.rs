//! Core traits for fauna's collaborators.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy. The pipeline only ever holds `Arc<dyn Trait>` handles, so the
//! Postgres and HTTP implementations can be swapped for in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Source of the live animal detection configuration.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Read the current configuration. Implementations must not cache.
    async fn animal_detection_config(&self) -> Result<AnimalDetectionConfig>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Client of the external animal recognition service.
#[async_trait]
pub trait AnimalDetector: Send + Sync {
    /// Detect animals in the image at `image_path`.
    ///
    /// Only detections scoring at least `options.min_score` are returned.
    async fn detect_animals(
        &self,
        endpoints: &[String],
        image_path: &str,
        options: &DetectionOptions,
    ) -> Result<DetectionResult>;
}

// =============================================================================
// ASSET REPOSITORY
// =============================================================================

/// Read access to assets for detection.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Lazily enumerate ids of assets needing detection.
    ///
    /// With `force = false` only assets without an `animals_recognized_at`
    /// marker are yielded; with `force = true` every non-hidden asset with a
    /// preview file is. Each id is yielded at most once, and the stream
    /// never materializes the full result.
    fn stream_eligible(&self, force: bool) -> BoxStream<'_, Result<Uuid>>;

    /// Count non-hidden assets with at least one preview file.
    async fn count_detectable(&self) -> Result<u64>;

    /// Ids of one page of non-hidden assets with a preview file, ordered by id.
    async fn page_detectable(&self, page: u32, page_size: u32) -> Result<Vec<Uuid>>;

    /// Load the detectable view of an asset, `None` if it no longer exists.
    async fn get_detectable(&self, asset_id: Uuid) -> Result<Option<DetectableAsset>>;
}

// =============================================================================
// STATUS REPOSITORY
// =============================================================================

/// Persists the per-asset idempotency marker.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Set `animals_recognized_at`, last write wins.
    async fn mark_animals_recognized(&self, asset_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Read `animals_recognized_at`, `None` when never processed.
    async fn animals_recognized_at(&self, asset_id: Uuid) -> Result<Option<DateTime<Utc>>>;
}

// =============================================================================
// TAG REPOSITORY
// =============================================================================

/// Owner-scoped tag storage.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Return existing-or-created tags for `names`, one per unique name,
    /// ordered by value.
    ///
    /// Must be safe under concurrency: two callers upserting the same
    /// `(owner_id, name)` observe the same tag id.
    async fn upsert_tags(&self, owner_id: Uuid, names: &[String]) -> Result<Vec<Tag>>;

    /// Link a tag to assets. Existing links are left untouched.
    ///
    /// Returns the number of links created.
    async fn link_assets(&self, tag_id: Uuid, asset_ids: &[Uuid]) -> Result<u64>;

    /// Remove links between `asset_id` and every tag under `root` (the root
    /// itself included) whose id is not in `keep`.
    ///
    /// Returns the number of links removed.
    async fn unlink_asset_under(&self, asset_id: Uuid, root: &str, keep: &[Uuid]) -> Result<u64>;

    /// Tags linked to an asset, ordered by value.
    async fn get_for_asset(&self, asset_id: Uuid) -> Result<Vec<Tag>>;
}

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Submission side of the job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a batch of detection work items. Returns the number queued.
    async fn submit_batch(&self, items: &[WorkItem]) -> Result<usize>;
}
