//! Extraction pipeline: the step sequence run inside PROCESSING.
//!
//! Steps run strictly in [`PipelineStep::ORDER`]. After each step its output
//! (in the job checkpoint) and its flag are written in one job update, so a
//! redelivered job resumes at the first pending step. Only an integrity
//! failure aborts the job; later step failures become warnings and lower
//! the confidence score. The soft budget covers the processing time of all
//! deliveries together, carried in the checkpoint.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use safescan_core::{
    check_integrity, CanonicalIdentifier, Error, ExtractionJob, ExtractionResult, JobEvent,
    JobStatus, LabelBackend, OcrBackend, PipelineConfig, PipelineStep, Result, ScoringConfig,
    SymbolReader, Symbology,
};
use safescan_decode::{completeness, decode_str, decode_text, label_attributes, score_with};
use safescan_review::ReviewQueue;
use safescan_store::Store;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::normalize::{normalize_image, sha256_hex, NORMALIZED_CONTENT_TYPE};
use crate::providers::NoSymbolReader;

/// Outcome of one step.
enum Flow {
    Continue,
    Retry(String),
    Timeout(String),
    Fail(String),
}

/// Outcome of a provider call under soft/hard deadlines.
enum Deadline<T> {
    Met(Result<T>),
    /// Finished after the soft deadline but before the hard one.
    Late(Result<T>),
    Missed,
}

/// Runs extraction jobs against the configured boundaries.
pub struct ExtractionPipeline {
    store: Store,
    review: ReviewQueue,
    ocr: Arc<dyn OcrBackend>,
    labels: Arc<dyn LabelBackend>,
    symbols: Arc<dyn SymbolReader>,
    config: PipelineConfig,
    scoring: ScoringConfig,
}

impl ExtractionPipeline {
    pub fn new(store: Store, ocr: Arc<dyn OcrBackend>, labels: Arc<dyn LabelBackend>) -> Self {
        Self {
            review: ReviewQueue::new(store.clone()),
            store,
            ocr,
            labels,
            symbols: Arc::new(NoSymbolReader),
            config: PipelineConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }

    pub fn with_symbol_reader(mut self, symbols: Arc<dyn SymbolReader>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn run(&self, ctx: &JobContext) -> Result<JobResult> {
        let mut job = ctx.job.clone();
        match job.status {
            JobStatus::Queued => {
                job.apply(JobEvent::Start, Utc::now())?;
                self.store.jobs.update(&job).await?;
                info!(owner = %job.owner, "Job started");
            }
            JobStatus::Processing => {
                info!(
                    delivery_attempt = job.delivery_attempts,
                    next_step = job.step_flags.next_pending().map(|s| s.as_str()),
                    "Resuming job"
                );
            }
            JobStatus::Completed => {
                // Redelivered after completion but before acknowledgement.
                return Ok(JobResult::Success(Some(summary(&job))));
            }
            JobStatus::Failed | JobStatus::Timeout => {
                return Ok(JobResult::Failed(job.error.clone().unwrap_or_default()));
            }
        }

        let clock = Spent::resume(&job);
        let source = match self.store.objects.get(&job.image_ref).await {
            Ok(bytes) => bytes,
            Err(Error::NotFound(msg)) => {
                return self.terminate(job, JobEvent::Fail, format!("source image missing: {}", msg)).await
            }
            Err(e) => return Err(e),
        };
        let mut working: Option<Vec<u8>> = None;

        while let Some(step) = job.step_flags.next_pending() {
            let remaining = self.config.job_soft_budget.saturating_sub(clock.total());
            if remaining.is_zero() {
                clock.record(&mut job);
                return self
                    .terminate(job, JobEvent::TimeOut, "soft time budget exceeded".into())
                    .await;
            }
            ctx.report_progress(progress_percent(step), Some(step.as_str()));

            let step_started = Instant::now();
            let flow = match timeout(remaining, self.run_step(step, &mut job, &source, &mut working)).await {
                Ok(flow) => flow?,
                Err(_) => Flow::Timeout(format!("soft time budget exceeded during {}", step.as_str())),
            };
            clock.record(&mut job);

            match flow {
                Flow::Continue => {
                    job.step_flags.mark_done(step);
                    self.store.jobs.update(&job).await?;
                    debug!(
                        step = step.as_str(),
                        duration_ms = step_started.elapsed().as_millis() as u64,
                        "Step complete"
                    );
                }
                Flow::Retry(reason) => {
                    self.store.jobs.update(&job).await?;
                    warn!(step = step.as_str(), %reason, "Step deferred to redelivery");
                    return Ok(JobResult::Retry(reason));
                }
                Flow::Timeout(reason) => return self.terminate(job, JobEvent::TimeOut, reason).await,
                Flow::Fail(reason) => return self.terminate(job, JobEvent::Fail, reason).await,
            }
        }

        ctx.report_progress(100, Some("scoring"));
        clock.record(&mut job);
        self.finish(job).await
    }

    async fn run_step(
        &self,
        step: PipelineStep,
        job: &mut ExtractionJob,
        source: &[u8],
        working: &mut Option<Vec<u8>>,
    ) -> Result<Flow> {
        match step {
            PipelineStep::IntegrityCheck => {
                let report = check_integrity(source, self.config.max_image_bytes);
                if !report.allowed {
                    return Ok(Flow::Fail(format!(
                        "integrity check failed: {}",
                        report.block_reason.unwrap_or_default()
                    )));
                }
                job.checkpoint.source_sha256 = Some(sha256_hex(source));
                Ok(Flow::Continue)
            }
            PipelineStep::Normalize => {
                match normalize_image(source, self.config.max_image_dimension) {
                    Ok(normalized) => {
                        let key = format!("{}/{}.png", self.config.normalized_key_prefix, job.id);
                        self.store
                            .objects
                            .put(&key, normalized.png.clone(), NORMALIZED_CONTENT_TYPE)
                            .await?;
                        job.checkpoint.normalized_key = Some(key);
                        *working = Some(normalized.png);
                    }
                    Err(e) => {
                        warn!(error = %e, "Normalization failed; continuing with the source image");
                        job.checkpoint.warnings.push(format!("normalization skipped: {}", e));
                    }
                }
                Ok(Flow::Continue)
            }
            PipelineStep::DecodeBarcodes => {
                self.load_working(job, working).await?;
                let image = working.as_deref().unwrap_or(source);
                match self.symbols.read_symbols(image).await {
                    Ok(symbols) => {
                        job.checkpoint.decodes = symbols
                            .iter()
                            .map(|s| decode_str(&s.payload, s.symbology.as_deref()))
                            .collect();
                        debug!(symbols = symbols.len(), "Decoded symbols");
                    }
                    Err(e) => {
                        warn!(error = %e, "Symbol reading failed");
                        job.checkpoint.warnings.push(format!("barcode reading unavailable: {}", e));
                    }
                }
                Ok(Flow::Continue)
            }
            PipelineStep::ExtractText => {
                self.load_working(job, working).await?;
                let image = working.as_deref().unwrap_or(source);
                let provider = self.ocr.name().to_string();
                match self.within_deadlines(&provider, self.ocr.extract_text(image)).await {
                    Deadline::Met(Ok(output)) => {
                        job.checkpoint.ocr = Some(output);
                        Ok(Flow::Continue)
                    }
                    Deadline::Late(Ok(output)) => {
                        job.checkpoint
                            .warnings
                            .push(format!("{} exceeded its soft deadline", provider));
                        job.checkpoint.ocr = Some(output);
                        Ok(Flow::Continue)
                    }
                    Deadline::Met(Err(e)) | Deadline::Late(Err(e)) => Ok(self.degrade_or_retry(job, "OCR", e)),
                    Deadline::Missed => Ok(Flow::Timeout(format!(
                        "{} exceeded the provider hard deadline",
                        provider
                    ))),
                }
            }
            PipelineStep::ExtractLabels => {
                self.load_working(job, working).await?;
                let image = working.as_deref().unwrap_or(source);
                let provider = self.labels.name().to_string();
                match self.within_deadlines(&provider, self.labels.extract_labels(image)).await {
                    Deadline::Met(Ok(output)) => {
                        job.checkpoint.labels = Some(output);
                        Ok(Flow::Continue)
                    }
                    Deadline::Late(Ok(output)) => {
                        job.checkpoint
                            .warnings
                            .push(format!("{} exceeded its soft deadline", provider));
                        job.checkpoint.labels = Some(output);
                        Ok(Flow::Continue)
                    }
                    Deadline::Met(Err(e)) | Deadline::Late(Err(e)) => {
                        Ok(self.degrade_or_retry(job, "label detection", e))
                    }
                    Deadline::Missed => Ok(Flow::Timeout(format!(
                        "{} exceeded the provider hard deadline",
                        provider
                    ))),
                }
            }
        }
    }

    /// Load the normalized copy persisted by an earlier delivery.
    async fn load_working(&self, job: &ExtractionJob, working: &mut Option<Vec<u8>>) -> Result<()> {
        if working.is_some() {
            return Ok(());
        }
        if let Some(ref key) = job.checkpoint.normalized_key {
            match self.store.objects.get(key).await {
                Ok(bytes) => *working = Some(bytes),
                Err(Error::NotFound(_)) => {
                    warn!(key = %key, "Normalized copy missing; using the source image");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn within_deadlines<T, F>(&self, provider: &str, call: F) -> Deadline<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::pin!(call);
        let soft = self.config.provider_soft_deadline;
        if let Ok(result) = timeout(soft, &mut call).await {
            return Deadline::Met(result);
        }
        warn!(provider, soft_secs = soft.as_secs(), "Provider exceeded soft deadline");
        let grace = self.config.provider_hard_deadline.saturating_sub(soft);
        match timeout(grace, &mut call).await {
            Ok(result) => Deadline::Late(result),
            Err(_) => Deadline::Missed,
        }
    }

    /// Redeliver while deliveries remain; afterwards record a warning and
    /// continue without the step's output.
    fn degrade_or_retry(&self, job: &mut ExtractionJob, what: &str, e: Error) -> Flow {
        if e.is_retryable() && job.delivery_attempts < self.config.max_deliveries {
            return Flow::Retry(format!(
                "{} unavailable on delivery {}: {}",
                what, job.delivery_attempts, e
            ));
        }
        warn!(error = %e, "{} failed; degrading confidence", what);
        job.checkpoint.warnings.push(format!("{} unavailable: {}", what, e));
        Flow::Continue
    }

    /// Score, persist the result, then queue review before completing, so a
    /// failed enqueue leaves the job deliverable.
    async fn finish(&self, mut job: ExtractionJob) -> Result<JobResult> {
        let result = build_result(&job);
        let decode_conf = job
            .checkpoint
            .decodes
            .iter()
            .map(|d| {
                if d.success {
                    d.confidence
                } else {
                    d.confidence.min(self.scoring.partial_decode_cap)
                }
            })
            .filter(|c| *c > 0.0)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let ocr_conf = job.checkpoint.ocr.as_ref().map(|o| o.confidence);
        let (present, total) = completeness(&result.identifier);
        let (score, level) = score_with(&self.scoring, decode_conf, ocr_conf, present, total);

        job.confidence_score = score;
        job.confidence_level = Some(level);
        job.needs_review = level.needs_review();

        self.store.results.upsert(&result).await?;
        self.store.jobs.update(&job).await?;
        self.ensure_review(&job).await?;
        job.apply(JobEvent::Complete, Utc::now())?;
        self.store.jobs.update(&job).await?;

        info!(
            confidence = score,
            confidence_level = level.as_str(),
            needs_review = job.needs_review,
            identified = result.identifier.is_identified(),
            "Job completed"
        );
        Ok(JobResult::Success(Some(summary(&job))))
    }

    async fn ensure_review(&self, job: &ExtractionJob) -> Result<()> {
        if !job.needs_review {
            return Ok(());
        }
        if let Some(level) = job.confidence_level {
            let reason = format!("{} confidence ({:.2})", level.as_str(), job.confidence_score);
            self.review.enqueue(job, &reason).await?;
        }
        Ok(())
    }

    /// Move to FAILED or TIMEOUT, keeping whatever the checkpoint holds.
    async fn terminate(&self, mut job: ExtractionJob, event: JobEvent, reason: String) -> Result<JobResult> {
        job.error = Some(reason.clone());
        job.apply(event, Utc::now())?;
        self.store.results.upsert(&build_result(&job)).await?;
        self.store.jobs.update(&job).await?;
        warn!(status = job.status.as_str(), %reason, "Job terminated");
        Ok(JobResult::Failed(reason))
    }

    /// Best-effort FAILED transition after an unexpected error.
    async fn abandon(&self, job_id: Uuid, cause: &Error) {
        let mut job = match self.store.jobs.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Failed to load job after error");
                return;
            }
        };
        job.error = Some(cause.to_string());
        if let Err(e) = job.apply(JobEvent::Fail, Utc::now()) {
            error!(error = %e, "Could not mark job failed");
            return;
        }
        if let Err(e) = self.store.jobs.update(&job).await {
            error!(error = %e, "Failed to persist failed job");
        }
    }
}

#[async_trait]
impl JobHandler for ExtractionPipeline {
    fn name(&self) -> &str {
        "extraction"
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", op = "extract", job_id = %ctx.job_id()))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let job_id = ctx.job_id();
        match self.run(&ctx).await {
            Ok(result) => result,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Job delivery failed; will be redelivered");
                JobResult::Retry(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "Job failed unexpectedly");
                self.abandon(job_id, &e).await;
                JobResult::Failed(e.to_string())
            }
        }
    }
}

/// Processing time of the current delivery on top of what earlier
/// deliveries recorded.
struct Spent {
    before: Duration,
    started: Instant,
}

impl Spent {
    fn resume(job: &ExtractionJob) -> Self {
        Self {
            before: Duration::from_millis(job.checkpoint.elapsed_ms),
            started: Instant::now(),
        }
    }

    fn total(&self) -> Duration {
        self.before + self.started.elapsed()
    }

    fn record(&self, job: &mut ExtractionJob) {
        job.checkpoint.elapsed_ms = self.total().as_millis() as u64;
    }
}

/// Merge the checkpoint into an extraction result.
///
/// Symbol decodes are merged highest confidence first, each only filling
/// fields still missing; OCR-derived fields fill what the symbols left.
pub fn build_result(job: &ExtractionJob) -> ExtractionResult {
    let checkpoint = &job.checkpoint;
    let mut decodes: Vec<_> = checkpoint.decodes.iter().collect();
    decodes.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
    let text_decode = checkpoint.ocr.as_ref().map(|o| decode_text(&o.text));

    let mut identifier = decodes
        .first()
        .map(|d| d.identifier.clone())
        .or_else(|| text_decode.as_ref().map(|d| d.identifier.clone()))
        .unwrap_or_else(|| CanonicalIdentifier::new("", Symbology::Unknown));
    for decode in decodes.iter().skip(1) {
        identifier.fill_missing_from(&decode.identifier);
    }
    if !decodes.is_empty() {
        if let Some(ref text) = text_decode {
            identifier.fill_missing_from(&text.identifier);
        }
    }

    let mut result = ExtractionResult::new(job.id, identifier);
    if let Some(ref ocr) = checkpoint.ocr {
        let attrs = label_attributes(&ocr.text);
        let model = attrs
            .model
            .or_else(|| result.identifier.extra_fields.get("model").cloned());
        result.ocr_text = Some(ocr.text.clone());
        result.ocr_confidence = Some(ocr.confidence);
        result.ocr_provider = Some(ocr.provider.clone());
        result.brand = attrs.brand;
        result.model = model;
        result.age_recommendation = attrs.age_recommendation;
        result.hazard_warnings = attrs.hazard_warnings;
    }
    if let Some(ref labels) = checkpoint.labels {
        result.labels = labels.labels.clone();
        result.categories = labels.categories.clone();
    }
    result.warnings = checkpoint.warnings.clone();
    result.source_sha256 = checkpoint.source_sha256.clone();
    result.normalized_key = checkpoint.normalized_key.clone();
    result
}

fn progress_percent(step: PipelineStep) -> i32 {
    let index = PipelineStep::ORDER
        .iter()
        .position(|s| *s == step)
        .unwrap_or(0);
    (index as i32) * 100 / PipelineStep::ORDER.len() as i32
}

fn summary(job: &ExtractionJob) -> serde_json::Value {
    json!({
        "job_id": job.id,
        "status": job.status,
        "confidence_score": job.confidence_score,
        "confidence_level": job.confidence_level,
        "needs_review": job.needs_review,
    })
}
