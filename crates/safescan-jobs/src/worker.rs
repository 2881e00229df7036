//! Job worker: leases extraction jobs and runs them concurrently.
//!
//! Delivery is at-least-once. A job is acknowledged only after its handler
//! has persisted state; `Retry` results and crashed deliveries leave the job
//! to be redelivered once the lease is gone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use safescan_core::defaults::{JOB_LEASE_SECS, JOB_MAX_CONCURRENT, JOB_POLL_INTERVAL_MS};
use safescan_core::{Error, ExtractionJob, Result};
use safescan_store::Store;

use crate::handler::{JobContext, JobHandler, JobResult};

const EVENT_BUS_CAPACITY: usize = 256;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// How long a delivery holds its job before it may be redelivered.
    pub lease: Duration,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: JOB_MAX_CONCURRENT,
            lease: Duration::from_secs(JOB_LEASE_SECS),
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_LEASE_SECS` | `300` | Delivery lease before redelivery |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(JOB_POLL_INTERVAL_MS);

        let lease = std::env::var("JOB_LEASE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(JOB_LEASE_SECS));

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            lease,
            enabled,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(Error::Config("max_concurrent_jobs must be at least 1".into()));
        }
        if self.lease.is_zero() {
            return Err(Error::Config("lease must be positive".into()));
        }
        Ok(())
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    JobStarted { job_id: Uuid, delivery_attempt: u32 },
    JobProgress {
        job_id: Uuid,
        percent: i32,
        message: Option<String>,
    },
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, error: String },
    /// Lease released; the job will be redelivered.
    JobRetrying { job_id: Uuid, reason: String },
    WorkerStarted,
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that processes jobs from the repository.
pub struct JobWorker {
    store: Store,
    config: WorkerConfig,
    handler: Arc<dyn JobHandler>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    pub fn new(store: Store, config: WorkerConfig, handler: Arc<dyn JobHandler>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            store,
            config,
            handler,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when nothing is deliverable.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            handler = self.handler.name(),
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            lease_secs = self.config.lease.as_secs(),
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs.max(1);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let worker = self.clone_refs();
                        tasks.spawn(async move {
                            worker.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    async fn claim_job(&self) -> Option<ExtractionJob> {
        match self.store.jobs.claim_next(self.config.lease).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = ?e, "Failed to claim job");
                None
            }
        }
    }

    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            store: self.store.clone(),
            handler: self.handler.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Run at most one delivery inline. Returns `false` when nothing was
    /// deliverable.
    pub async fn run_once(&self) -> bool {
        match self.claim_job().await {
            Some(job) => {
                self.clone_refs().execute_job(job).await;
                true
            }
            None => false,
        }
    }
}

/// Reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    store: Store,
    handler: Arc<dyn JobHandler>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorkerRef {
    async fn execute_job(self, job: ExtractionJob) {
        let start = Instant::now();
        let job_id = job.id;
        let delivery_attempt = job.delivery_attempts;

        info!(%job_id, delivery_attempt, "Processing job");
        let _ = self.event_tx.send(WorkerEvent::JobStarted {
            job_id,
            delivery_attempt,
        });

        let event_tx = self.event_tx.clone();
        let ctx = JobContext::new(job).with_progress_callback(move |percent, message| {
            let _ = event_tx.send(WorkerEvent::JobProgress {
                job_id,
                percent,
                message: message.map(String::from),
            });
        });

        match self.handler.execute(ctx).await {
            JobResult::Success(_) => {
                if let Err(e) = self.store.jobs.ack(job_id).await {
                    error!(error = ?e, %job_id, "Failed to acknowledge job");
                } else {
                    info!(
                        %job_id,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job delivery acknowledged"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobCompleted { job_id });
                }
            }
            JobResult::Failed(error) => {
                if let Err(e) = self.store.jobs.ack(job_id).await {
                    error!(error = ?e, %job_id, "Failed to acknowledge failed job");
                } else {
                    warn!(
                        %job_id,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed { job_id, error });
                }
            }
            JobResult::Retry(reason) => {
                if let Err(e) = self.store.jobs.release(job_id).await {
                    error!(error = ?e, %job_id, "Failed to release job lease");
                } else {
                    warn!(%job_id, %reason, "Job released for redelivery");
                    let _ = self.event_tx.send(WorkerEvent::JobRetrying { job_id, reason });
                }
            }
        }
    }
}
