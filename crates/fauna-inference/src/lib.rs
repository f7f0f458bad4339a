//! # fauna-inference
//!
//! Client for the external machine-learning service that recognizes animals
//! in preview images.
//!
//! This crate provides:
//! - [`MachineLearningClient`], the production [`AnimalDetector`] speaking the
//!   service's multipart `/predict` protocol with endpoint failover
//! - A mock detector for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use fauna_inference::{AnimalDetector, AnimalDetectionConfig, MachineLearningClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = MachineLearningClient::from_env();
//!     let config = AnimalDetectionConfig::default();
//!     let result = client
//!         .detect_animals(
//!             &config.inference_endpoints,
//!             "/thumbs/preview.jpeg",
//!             &config.detection_options(),
//!         )
//!         .await;
//!     println!("{:?}", result);
//! }
//! ```

pub mod client;

// Mock detector for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use fauna_core::*;

pub use client::MachineLearningClient;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockAnimalDetector;
