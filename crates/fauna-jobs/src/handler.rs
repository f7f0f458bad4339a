//! Job handler abstraction shared by every job type.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use fauna_core::{Error, Job, JobType, QueueAllRequest, Result, WorkItem};

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    /// Progress callback for updating job progress.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Get the asset ID for this job, if any.
    pub fn asset_id(&self) -> Option<Uuid> {
        self.job.asset_id
    }

    /// Get the job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Decode the payload of a detection job.
    pub fn work_item(&self) -> Result<WorkItem> {
        let payload = self
            .payload()
            .ok_or_else(|| Error::Job(format!("Job {} has no work item payload", self.job.id)))?;
        serde_json::from_value(payload.clone())
            .map_err(|e| Error::Job(format!("Job {} has an invalid work item: {}", self.job.id, e)))
    }

    /// Decode the payload of a queue-all job. A missing payload means an
    /// unforced run.
    pub fn queue_all_request(&self) -> Result<QueueAllRequest> {
        match self.payload() {
            None | Some(JsonValue::Null) => Ok(QueueAllRequest::default()),
            Some(payload) => serde_json::from_value(payload.clone()).map_err(|e| {
                Error::Job(format!(
                    "Job {} has an invalid queue-all request: {}",
                    self.job.id, e
                ))
            }),
        }
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
    /// Job should be retried after a delay.
    Retry(String),
}

impl JobResult {
    /// Map a pipeline error to a failure, retrying only when it may pass later.
    pub fn from_error(error: &Error) -> Self {
        if error.is_transient() {
            Self::Retry(error.to_string())
        } else {
            Self::Failed(error.to_string())
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job type.
    fn can_handle(&self, job_type: JobType) -> bool {
        self.job_type() == job_type
    }
}
