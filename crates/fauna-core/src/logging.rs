//! Structured logging schema and field name constants for fauna.
//!
//! All crates use these field names for structured `tracing` events so log
//! aggregation can query by the same keys across every subsystem. The same
//! keys are used in JSON job results so a job row and its log lines line up.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, e.g. a single asset failed and will be retried |
//! | INFO  | Lifecycle events (startup, shutdown), run summaries |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (individual detections) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "enqueuer", "dispatcher", "detector", "materializer", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "queue_all", "detect", "upsert_tags", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Asset UUID being operated on.
pub const ASSET_ID: &str = "asset_id";

/// Owning user UUID.
pub const OWNER_ID: &str = "owner_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

/// Page number of a page work item.
pub const PAGE: &str = "page";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of work items in a queue submission.
pub const BATCH_SIZE: &str = "batch_size";

/// Number of queue submissions performed.
pub const BATCH_COUNT: &str = "batch_count";

/// Number of assets resolved for a work item.
pub const ASSET_COUNT: &str = "asset_count";

/// Number of detections returned by the inference service.
pub const DETECTION_COUNT: &str = "detection_count";

/// Number of tags materialized for an asset.
pub const TAG_COUNT: &str = "tag_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Machine learning endpoint URL.
pub const ENDPOINT: &str = "endpoint";

/// Minimum detection score used for the request.
pub const MIN_SCORE: &str = "min_score";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Terminal per-asset outcome.
pub const OUTCOME: &str = "outcome";

/// Whether the run was forced.
pub const FORCE: &str = "force";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
