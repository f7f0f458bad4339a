//! Core data models for the animal detection pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::Error;

// =============================================================================
// ASSETS
// =============================================================================

/// Visibility state of an asset.
///
/// Only `Hidden` assets are excluded from detection; hidden assets are the
/// derived halves of live photos and similar internal artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetVisibility {
    #[default]
    Timeline,
    Archive,
    Hidden,
    Locked,
}

impl AssetVisibility {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeline => "timeline",
            Self::Archive => "archive",
            Self::Hidden => "hidden",
            Self::Locked => "locked",
        }
    }

    /// Whether assets with this visibility take part in animal detection.
    pub fn is_detectable(&self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

impl fmt::Display for AssetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetVisibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeline" => Ok(Self::Timeline),
            "archive" => Ok(Self::Archive),
            "hidden" => Ok(Self::Hidden),
            "locked" => Ok(Self::Locked),
            other => Err(Error::InvalidInput(format!(
                "Unknown asset visibility: {}",
                other
            ))),
        }
    }
}

/// A derived preview image belonging to exactly one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewFile {
    pub id: Uuid,
    pub asset_id: Uuid,
    /// Storage path of the preview image.
    pub path: String,
}

/// The subset of an asset the detection worker needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectableAsset {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub visibility: AssetVisibility,
    pub preview_files: Vec<PreviewFile>,
}

impl DetectableAsset {
    /// Path of the preview sent to the inference service.
    pub fn preview_path(&self) -> Option<&str> {
        self.preview_files.first().map(|f| f.path.as_str())
    }
}

// =============================================================================
// DETECTION
// =============================================================================

/// A single (label, score) pair returned by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Detections for one asset, ordered as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub animals: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(animals: Vec<Detection>) -> Self {
        Self { animals }
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    /// Drop detections scoring below `min_score`.
    pub fn retain_above(mut self, min_score: f32) -> Self {
        self.animals.retain(|d| d.score >= min_score);
        self
    }
}

/// Per-request inference options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOptions {
    pub model_name: Option<String>,
    pub min_score: f32,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Feature configuration for animal detection.
///
/// Read fresh for every enqueue and every asset so changes take effect
/// without a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalDetectionConfig {
    pub enabled: bool,
    pub model_name: Option<String>,
    pub min_score: f32,
    pub inference_endpoints: Vec<String>,
}

impl Default for AnimalDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::ANIMAL_DETECTION_ENABLED,
            model_name: Some(defaults::ANIMAL_MODEL.to_string()),
            min_score: defaults::ANIMAL_MIN_SCORE,
            inference_endpoints: vec![defaults::ML_URL.to_string()],
        }
    }
}

impl AnimalDetectionConfig {
    /// Options forwarded to the inference service.
    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions {
            model_name: self.model_name.clone(),
            min_score: self.min_score,
        }
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// An owner-scoped, hierarchical tag such as `Animals/Dog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub value: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// WORK ITEMS
// =============================================================================

/// Payload of one animal detection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    /// Process exactly one asset.
    SingleAsset { id: Uuid },
    /// Process one page of qualifying assets, resolved when the job runs.
    Page { number: u32 },
}

impl WorkItem {
    pub fn asset(id: Uuid) -> Self {
        Self::SingleAsset { id }
    }

    pub fn page(number: u32) -> Self {
        Self::Page { number }
    }

    /// The asset id for single-asset items.
    pub fn asset_id(&self) -> Option<Uuid> {
        match self {
            Self::SingleAsset { id } => Some(*id),
            Self::Page { .. } => None,
        }
    }
}

/// How forced runs split work into queue items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One job per asset.
    #[default]
    Asset,
    /// One job per page of qualifying assets.
    Page,
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" | "single_asset" => Ok(Self::Asset),
            "page" => Ok(Self::Page),
            other => Err(Error::Config(format!(
                "Unknown work item granularity: {}",
                other
            ))),
        }
    }
}

/// Outcome of a queue-all invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The feature is disabled; nothing was enqueued.
    Skipped,
    /// Every eligible asset was submitted.
    Completed,
}

/// Payload of a queue-all job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAllRequest {
    #[serde(default)]
    pub force: bool,
}

// =============================================================================
// JOBS
// =============================================================================

/// Type of job to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Enumerate eligible assets and enqueue detection work items.
    AnimalDetectionQueueAll,
    /// Detect animals for one work item.
    AnimalDetection,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnimalDetectionQueueAll => "animal_detection_queue_all",
            Self::AnimalDetection => "animal_detection",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "animal_detection_queue_all" => Ok(Self::AnimalDetectionQueueAll),
            "animal_detection" => Ok(Self::AnimalDetection),
            other => Err(Error::Job(format!("Unknown job type: {}", other))),
        }
    }
}

/// Status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Job(format!("Unknown job status: {}", other))),
        }
    }
}

/// A row of the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Set for single-asset detection jobs.
    pub asset_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
