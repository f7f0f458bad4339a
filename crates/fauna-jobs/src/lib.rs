//! # fauna-jobs
//!
//! Two-phase animal detection pipeline and the background worker that runs it.
//!
//! This crate provides:
//! - Enumeration: drain eligible assets into bounded queue submissions
//! - Processing: per-asset inference, tag materialization and status marking
//! - Async job processing with concurrent workers
//! - Progress tracking and notifications via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fauna_db::Database;
//! use fauna_inference::MachineLearningClient;
//! use fauna_jobs::{BatchEnqueuer, DetectionWorker, WorkerBuilder, WorkerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let config = Arc::new(db.config.clone());
//!
//! let enqueuer = BatchEnqueuer::new(Arc::new(db.assets.clone()), Arc::new(db.jobs.clone()), config.clone());
//! let detector = DetectionWorker::new(
//!     Arc::new(db.assets.clone()),
//!     Arc::new(db.status.clone()),
//!     Arc::new(db.tags.clone()),
//!     Arc::new(MachineLearningClient::from_env()),
//!     config,
//! );
//!
//! let handle = WorkerBuilder::new(db)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(enqueuer)
//!     .with_handler(detector)
//!     .build()
//!     .await
//!     .start();
//!
//! // Graceful shutdown
//! handle.shutdown_and_wait().await?;
//! ```

pub mod detection;
pub mod dispatch;
pub mod enqueue;
pub mod handler;
pub mod materializer;
pub mod worker;

// Re-export core types
pub use fauna_core::*;

pub use detection::{AssetOutcome, DetectionWorker, ItemReport};
pub use dispatch::ChunkDispatcher;
pub use enqueue::{BatchEnqueuer, EnqueueConfig, EnqueueSummary};
pub use handler::{JobContext, JobHandler, JobResult};
pub use materializer::TagMaterializer;
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
