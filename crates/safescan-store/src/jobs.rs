//! In-memory extraction job repository with delivery leases.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use safescan_core::{Error, ExtractionJob, JobRepository, JobStatus, Result};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, ExtractionJob>,
    /// Lease expiry per job currently delivered to a worker.
    leases: HashMap<Uuid, Instant>,
}

/// Job repository held in process memory.
#[derive(Default)]
pub struct MemoryJobRepository {
    inner: RwLock<Inner>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `job_id` currently holds a live lease.
    pub async fn is_leased(&self, job_id: Uuid) -> bool {
        let inner = self.inner.read().await;
        inner
            .leases
            .get(&job_id)
            .is_some_and(|until| *until > Instant::now())
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn insert(&self, job: &ExtractionJob) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(Error::InvalidInput(format!("job {} already exists", job.id)));
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ExtractionJob>> {
        Ok(self.inner.read().await.jobs.get(&job_id).cloned())
    }

    async fn update(&self, job: &ExtractionJob) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("job {}", job.id))),
        }
    }

    async fn claim_next(&self, lease: Duration) -> Result<Option<ExtractionJob>> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        let next = inner
            .jobs
            .values()
            .filter(|job| matches!(job.status, JobStatus::Queued | JobStatus::Processing))
            .filter(|job| inner.leases.get(&job.id).map_or(true, |until| *until <= now))
            .min_by_key(|job| (job.created_at, job.id))
            .map(|job| job.id);

        let Some(job_id) = next else {
            return Ok(None);
        };

        inner.leases.insert(job_id, now + lease);
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::Internal(format!("job {} vanished during claim", job_id)))?;
        job.delivery_attempts += 1;
        debug!(
            subsystem = "store",
            component = "jobs",
            op = "claim_next",
            job_id = %job_id,
            delivery_attempt = job.delivery_attempts,
            "Leased job"
        );
        Ok(Some(job.clone()))
    }

    async fn claim(&self, job_id: Uuid, lease: Duration) -> Result<ExtractionJob> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        let status = inner
            .jobs
            .get(&job_id)
            .map(|job| job.status)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "job {} is {} and cannot be delivered",
                job_id,
                status.as_str()
            )));
        }
        if inner.leases.get(&job_id).is_some_and(|until| *until > now) {
            return Err(Error::AlreadyClaimed(format!(
                "another delivery of job {}",
                job_id
            )));
        }

        inner.leases.insert(job_id, now + lease);
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::Internal(format!("job {} vanished during claim", job_id)))?;
        job.delivery_attempts += 1;
        debug!(
            subsystem = "store",
            component = "jobs",
            op = "claim",
            job_id = %job_id,
            delivery_attempt = job.delivery_attempts,
            "Leased job"
        );
        Ok(job.clone())
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        self.inner.write().await.leases.remove(&job_id);
        Ok(())
    }

    async fn release(&self, job_id: Uuid) -> Result<()> {
        self.inner.write().await.leases.remove(&job_id);
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<ExtractionJob>> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<_> = inner
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.created_at, job.id));
        Ok(jobs)
    }
}
