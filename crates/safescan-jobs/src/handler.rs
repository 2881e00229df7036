//! Job handler contract between the worker and the extraction pipeline.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use safescan_core::ExtractionJob;

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The delivered job, as leased from the repository.
    pub job: ExtractionJob,
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    pub fn new(job: ExtractionJob) -> Self {
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

    pub fn job_id(&self) -> Uuid {
        self.job.id
    }

    /// 1-based delivery count for this job.
    pub fn delivery_attempt(&self) -> u32 {
        self.job.delivery_attempts
    }
}

/// Delivery disposition returned by a handler.
///
/// `Success` and `Failed` are acknowledged; `Retry` releases the lease so the
/// job is redelivered.
#[derive(Debug)]
pub enum JobResult {
    /// Job reached a state that needs no redelivery, with optional summary.
    Success(Option<JsonValue>),
    /// Job reached a terminal failure state.
    Failed(String),
    /// Job should be redelivered.
    Retry(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// Execute one delivery of a job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_job_context_exposes_job() {
        let mut job = ExtractionJob::new("uploads/a.png", "owner");
        job.delivery_attempts = 2;
        let ctx = JobContext::new(job.clone());
        assert_eq!(ctx.job_id(), job.id);
        assert_eq!(ctx.delivery_attempt(), 2);
    }

    #[test]
    fn test_job_context_report_progress_no_callback() {
        let ctx = JobContext::new(ExtractionJob::new("k", "o"));
        // Should not panic
        ctx.report_progress(50, Some("test"));
        ctx.report_progress(100, None);
    }

    #[test]
    fn test_job_context_with_progress_callback() {
        let progress_log = Arc::new(Mutex::new(Vec::new()));
        let progress_log_clone = progress_log.clone();

        let ctx = JobContext::new(ExtractionJob::new("k", "o")).with_progress_callback(
            move |percent, message| {
                progress_log_clone
                    .lock()
                    .unwrap()
                    .push((percent, message.map(String::from)));
            },
        );

        ctx.report_progress(20, Some("integrity_check"));
        ctx.report_progress(100, None);

        let log = progress_log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], (20, Some("integrity_check".to_string())));
        assert_eq!(log[1], (100, None));
    }
}
