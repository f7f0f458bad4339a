//! Mock animal detector for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fauna_inference::mock::MockAnimalDetector;
//! use fauna_core::Detection;
//!
//! let detector = MockAnimalDetector::new()
//!     .with_detections("/thumbs/a.jpeg", vec![Detection::new("Dog", 0.8)])
//!     .with_failure("/thumbs/broken.jpeg");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fauna_core::{AnimalDetector, Detection, DetectionOptions, DetectionResult, Error, Result};

/// Mock detector returning fixed results per image path.
#[derive(Clone, Default)]
pub struct MockAnimalDetector {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    detections: HashMap<String, Vec<Detection>>,
    default_detections: Vec<Detection>,
    failing_paths: HashSet<String>,
    fail_all: bool,
    latency_ms: u64,
}

/// One recorded `detect_animals` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub endpoints: Vec<String>,
    pub image_path: String,
    pub options: DetectionOptions,
}

impl MockAnimalDetector {
    /// Create a mock that detects nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `detections` (before score filtering) for `image_path`.
    pub fn with_detections(mut self, image_path: impl Into<String>, detections: Vec<Detection>) -> Self {
        Arc::make_mut(&mut self.config)
            .detections
            .insert(image_path.into(), detections);
        self
    }

    /// Return `detections` for every path without an explicit mapping.
    pub fn with_default_detections(mut self, detections: Vec<Detection>) -> Self {
        Arc::make_mut(&mut self.config).default_detections = detections;
        self
    }

    /// Fail every call for `image_path`.
    pub fn with_failure(mut self, image_path: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_paths
            .insert(image_path.into());
        self
    }

    /// Fail every call.
    pub fn failing() -> Self {
        let mut mock = Self::new();
        Arc::make_mut(&mut mock.config).fail_all = true;
        mock
    }

    /// Set simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AnimalDetector for MockAnimalDetector {
    async fn detect_animals(
        &self,
        endpoints: &[String],
        image_path: &str,
        options: &DetectionOptions,
    ) -> Result<DetectionResult> {
        if let Ok(mut calls) = self.call_log.lock() {
            calls.push(MockCall {
                endpoints: endpoints.to_vec(),
                image_path: image_path.to_string(),
                options: options.clone(),
            });
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail_all || self.config.failing_paths.contains(image_path) {
            return Err(Error::Inference(format!(
                "Simulated failure for {}",
                image_path
            )));
        }

        let detections = self
            .config
            .detections
            .get(image_path)
            .unwrap_or(&self.config.default_detections)
            .clone();
        Ok(DetectionResult::new(detections).retain_above(options.min_score))
    }
}
