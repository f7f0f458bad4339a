//! # fauna-core
//!
//! Core types, traits, and abstractions for the fauna animal detection
//! pipeline.
//!
//! This crate provides the data model (assets, detections, tags, work items,
//! jobs), the collaborator traits the pipeline is written against, tag naming
//! rules, and the shared defaults that other fauna crates depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod tags;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use config::{ConfigSource, EnvConfigProvider};
pub use error::{Error, Result};
pub use models::*;
pub use tags::*;
pub use traits::*;
pub use uuid_utils::new_v7;
