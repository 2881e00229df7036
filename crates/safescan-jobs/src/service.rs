//! Job lifecycle surface for request handlers.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use safescan_core::{detect_image_type, Error, ExtractionJob, ExtractionResult, Result};
use safescan_store::Store;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::pipeline::ExtractionPipeline;
use crate::worker::WorkerConfig;

/// Object-store prefix for submitted images.
pub const UPLOAD_KEY_PREFIX: &str = "uploads";

/// Submit jobs, read their status and results.
#[derive(Clone)]
pub struct JobService {
    store: Store,
    pipeline: Arc<ExtractionPipeline>,
    /// Lease held by an inline delivery.
    lease: Duration,
}

impl JobService {
    pub fn new(store: Store, pipeline: Arc<ExtractionPipeline>) -> Self {
        Self {
            store,
            pipeline,
            lease: WorkerConfig::default().lease,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Queue a job for an image already in object storage.
    pub async fn submit(&self, image_ref: &str, owner: &str) -> Result<Uuid> {
        if image_ref.trim().is_empty() {
            return Err(Error::InvalidInput("image_ref is required".into()));
        }
        if owner.trim().is_empty() {
            return Err(Error::InvalidInput("owner is required".into()));
        }
        let job = ExtractionJob::new(image_ref, owner);
        self.store.jobs.insert(&job).await?;
        info!(job_id = %job.id, owner, image_ref, "Job submitted");
        Ok(job.id)
    }

    /// Store `bytes` under a fresh upload key and queue a job for it.
    pub async fn submit_bytes(&self, bytes: Vec<u8>, owner: &str) -> Result<Uuid> {
        let key = format!("{}/{}", UPLOAD_KEY_PREFIX, Uuid::now_v7());
        let content_type = detect_image_type(&bytes).unwrap_or("application/octet-stream");
        self.store.objects.put(&key, bytes, content_type).await?;
        self.submit(&key, owner).await
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<ExtractionJob> {
        self.store
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// The job's result, once it has reached a terminal state.
    pub async fn get_result(&self, job_id: Uuid) -> Result<Option<ExtractionResult>> {
        self.get_status(job_id).await?;
        self.store.results.get(job_id).await
    }

    /// Run one delivery of `job_id` inline, outside the worker.
    ///
    /// Leases the job like a worker delivery, so it fails with
    /// `AlreadyClaimed` while a worker holds it. Returns the job as
    /// persisted afterwards.
    pub async fn process_now(&self, job_id: Uuid) -> Result<ExtractionJob> {
        let job = self.get_status(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        let job = self.store.jobs.claim(job_id, self.lease).await?;

        match self.pipeline.execute(JobContext::new(job)).await {
            JobResult::Success(_) | JobResult::Failed(_) => {
                self.store.jobs.ack(job_id).await?;
            }
            JobResult::Retry(reason) => {
                info!(%job_id, %reason, "Inline delivery deferred");
                self.store.jobs.release(job_id).await?;
            }
        }
        self.get_status(job_id).await
    }
}
