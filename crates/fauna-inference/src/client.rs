//! HTTP client for the machine-learning service.
//!
//! Requests are `multipart/form-data` POSTs to `{endpoint}/predict` carrying an
//! `entries` JSON part that selects the task and model, and an `image` part
//! with the preview bytes:
//!
//! ```json
//! {"animal-recognition": {"recognition": {"modelName": "resnet34", "options": {"minScore": 0.5}}}}
//! ```
//!
//! The response is keyed by task: `{"animal-recognition": [{"label": "Dog", "score": 0.91}]}`.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use fauna_core::defaults::{
    ENV_INFERENCE_TIMEOUT_SECS, HEALTH_TIMEOUT_SECS, INFERENCE_TIMEOUT_SECS,
    ML_TASK_ANIMAL_RECOGNITION, ML_TYPE_RECOGNITION,
};
use fauna_core::{AnimalDetector, Detection, DetectionOptions, DetectionResult, Error, Result};

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(rename = "animal-recognition", default)]
    animals: Vec<Detection>,
}

/// Client for the animal recognition task of the machine-learning service.
#[derive(Clone)]
pub struct MachineLearningClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl MachineLearningClient {
    /// Create a client whose requests are bounded by `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FAUNA_INFERENCE_TIMEOUT_SECS` | `30` | Per-request timeout |
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var(ENV_INFERENCE_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(INFERENCE_TIMEOUT_SECS);
        Self::new(timeout_secs)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the `entries` document for an animal recognition request.
    pub fn entries(options: &DetectionOptions) -> JsonValue {
        let mut recognition = json!({ "options": { "minScore": options.min_score } });
        if let Some(model) = &options.model_name {
            recognition["modelName"] = json!(model);
        }
        json!({ ML_TASK_ANIMAL_RECOGNITION: { ML_TYPE_RECOGNITION: recognition } })
    }

    async fn predict(
        &self,
        endpoint: &str,
        image: Vec<u8>,
        file_name: String,
        entries: String,
    ) -> Result<DetectionResult> {
        let url = format!("{}/predict", endpoint.trim_end_matches('/'));

        let image_part = reqwest::multipart::Part::bytes(image)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| Error::Internal(format!("Failed to create multipart: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .text("entries", entries)
            .part("image", image_part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout.as_secs())
                } else {
                    Error::Request(format!("Request to {} failed: {}", url, e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response from {}: {}", url, e)))?;

        Ok(DetectionResult::new(parsed.animals))
    }

    /// Check whether an endpoint answers `GET /ping`.
    pub async fn health_check(&self, endpoint: &str) -> Result<bool> {
        let url = format!("{}/ping", endpoint.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

impl Default for MachineLearningClient {
    fn default() -> Self {
        Self::new(INFERENCE_TIMEOUT_SECS)
    }
}

#[async_trait]
impl AnimalDetector for MachineLearningClient {
    async fn detect_animals(
        &self,
        endpoints: &[String],
        image_path: &str,
        options: &DetectionOptions,
    ) -> Result<DetectionResult> {
        if endpoints.is_empty() {
            return Err(Error::Inference(
                "No inference endpoints configured".to_string(),
            ));
        }

        let image = tokio::fs::read(image_path).await?;
        let file_name = Path::new(image_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("preview")
            .to_string();
        let entries = Self::entries(options).to_string();

        let mut last_error = None;
        for endpoint in endpoints {
            let start = Instant::now();
            match self
                .predict(endpoint, image.clone(), file_name.clone(), entries.clone())
                .await
            {
                Ok(result) => {
                    let result = result.retain_above(options.min_score);
                    debug!(
                        subsystem = "inference",
                        component = "ml_client",
                        op = "detect_animals",
                        endpoint = %endpoint,
                        model = options.model_name.as_deref().unwrap_or("default"),
                        detection_count = result.animals.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Animal recognition complete"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        subsystem = "inference",
                        component = "ml_client",
                        endpoint = %endpoint,
                        error = %e,
                        "Inference endpoint failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Inference(format!(
            "All {} inference endpoints failed; last error: {}",
            endpoints.len(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}
