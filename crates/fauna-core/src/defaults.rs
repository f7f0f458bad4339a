//! Centralized default constants for the fauna pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// ENQUEUE
// =============================================================================

/// Number of work items buffered before one bulk submission to the queue.
pub const QUEUE_BATCH_SIZE: usize = 1000;

/// Number of assets resolved per page work item.
pub const PAGE_SIZE: u32 = 1000;

// =============================================================================
// ANIMAL DETECTION
// =============================================================================

/// Root segment of every tag produced by animal detection.
pub const ANIMAL_TAG_ROOT: &str = "Animals";

/// Separator between hierarchical tag segments.
pub const TAG_PATH_SEPARATOR: char = '/';

/// Maximum tag value length in characters.
pub const TAG_MAX_LEN: usize = 100;

/// Default classification model served by the machine learning service.
pub const ANIMAL_MODEL: &str = "resnet34";

/// Default minimum detection score.
pub const ANIMAL_MIN_SCORE: f32 = 0.5;

/// Whether animal detection is enabled when no configuration is stored.
pub const ANIMAL_DETECTION_ENABLED: bool = true;

/// Key of the stored animal detection configuration row.
pub const ANIMAL_CONFIG_KEY: &str = "animal_detection";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default machine learning service URL.
pub const ML_URL: &str = "http://127.0.0.1:3003";

/// Timeout for a single inference request in seconds.
pub const INFERENCE_TIMEOUT_SECS: u64 = 30;

/// Timeout for machine learning health probes in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Task key of the animal recognition entry in a predict request.
pub const ML_TASK_ANIMAL_RECOGNITION: &str = "animal-recognition";

/// Model type of the animal recognition entry in a predict request.
pub const ML_TYPE_RECOGNITION: &str = "recognition";

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum retry count for failed jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

/// Default job worker poll interval in milliseconds when the queue is empty.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default job execution timeout in seconds (30 minutes, a page of 1000
/// assets at a few hundred milliseconds each).
pub const JOB_TIMEOUT_SECS: u64 = 1800;

/// Default worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// Animal detection configuration source (`database` or `env`).
pub const ENV_CONFIG_SOURCE: &str = "FAUNA_CONFIG_SOURCE";

/// Enables or disables animal detection (`true`/`false`).
pub const ENV_ANIMAL_DETECTION_ENABLED: &str = "FAUNA_ANIMAL_DETECTION_ENABLED";

/// Model name override.
pub const ENV_ANIMAL_MODEL: &str = "FAUNA_ANIMAL_MODEL";

/// Minimum score override.
pub const ENV_ANIMAL_MIN_SCORE: &str = "FAUNA_ANIMAL_MIN_SCORE";

/// Comma-separated machine learning endpoints.
pub const ENV_ML_URLS: &str = "FAUNA_ML_URLS";

/// Inference request timeout in seconds.
pub const ENV_INFERENCE_TIMEOUT_SECS: &str = "FAUNA_INFERENCE_TIMEOUT_SECS";

/// Queue submission batch size.
pub const ENV_QUEUE_BATCH_SIZE: &str = "FAUNA_QUEUE_BATCH_SIZE";

/// Page work item size.
pub const ENV_PAGE_SIZE: &str = "FAUNA_PAGE_SIZE";

/// Work item granularity for forced runs (`asset` or `page`).
pub const ENV_WORK_ITEM_GRANULARITY: &str = "FAUNA_WORK_ITEM_GRANULARITY";
