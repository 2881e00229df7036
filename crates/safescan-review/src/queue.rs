//! Review queue: QUEUED → CLAIMED → {APPROVED, REJECTED}, with
//! "needs more info" returning a claimed item to QUEUED.

use chrono::{DateTime, Utc};
use safescan_core::defaults::SCORE_HIGH_THRESHOLD;
use safescan_core::{
    AuditAction, ConfidenceLevel, Error, ExtractionJob, FieldCorrections, JobEvent, Result,
    ReviewAction, ReviewFilter, ReviewItem, ReviewStatus,
};
use safescan_decode::gtin;
use safescan_store::Store;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Actor recorded for entries written by the pipeline.
pub const PIPELINE_ACTOR: &str = "pipeline";

/// Attempts at a compare-and-set before giving up on an uncontended update.
const CAS_ATTEMPTS: usize = 3;

/// Human review work queue.
#[derive(Clone)]
pub struct ReviewQueue {
    store: Store,
}

impl ReviewQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create the review item for a scored job, or return its open item.
    ///
    /// Only MEDIUM and LOW jobs are reviewable.
    #[instrument(skip(self, job, reason), fields(subsystem = "review", op = "enqueue", job_id = %job.id))]
    pub async fn enqueue(&self, job: &ExtractionJob, reason: &str) -> Result<ReviewItem> {
        let level = job
            .confidence_level
            .ok_or_else(|| Error::InvalidInput(format!("job {} has not been scored", job.id)))?;
        let priority = level.review_priority().ok_or_else(|| {
            Error::InvalidInput(format!("job {} is HIGH confidence; no review needed", job.id))
        })?;

        if let Some(existing) = self.store.reviews.find_open_for_job(job.id).await? {
            debug!(review_item_id = %existing.id, "Open review item already exists");
            return Ok(existing);
        }

        let mut item = ReviewItem::new(job.id, level, job.confidence_score, priority, reason);
        item.record(AuditAction::Created, PIPELINE_ACTOR, Some(reason.to_string()), item.created_at);
        self.store.reviews.insert(&item).await?;
        info!(
            review_item_id = %item.id,
            confidence_level = level.as_str(),
            priority,
            "Review item created"
        );
        Ok(item)
    }

    /// Items matching `filter`, by priority (lower first) then age.
    pub async fn list_queue(&self, filter: &ReviewFilter) -> Result<Vec<ReviewItem>> {
        self.store.reviews.list(filter).await
    }

    pub async fn get(&self, item_id: Uuid) -> Result<ReviewItem> {
        self.store
            .reviews
            .get(item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("review item {}", item_id)))
    }

    /// Claim a QUEUED item exclusively for `reviewer`.
    ///
    /// A second claim fails with `AlreadyClaimed`; the caller should re-list.
    #[instrument(skip(self), fields(subsystem = "review", op = "claim"))]
    pub async fn claim(&self, item_id: Uuid, reviewer: &str) -> Result<ReviewItem> {
        if reviewer.trim().is_empty() {
            return Err(Error::InvalidInput("reviewer is required".into()));
        }
        let mut item = self.get(item_id).await?;
        match item.status {
            ReviewStatus::Queued => {}
            ReviewStatus::Claimed => {
                return Err(Error::AlreadyClaimed(
                    item.claimed_by.unwrap_or_else(|| "another reviewer".into()),
                ))
            }
            status => {
                return Err(Error::InvalidTransition(format!(
                    "review item {} is {:?}; only queued items can be claimed",
                    item_id, status
                )))
            }
        }

        let now = Utc::now();
        let expected = item.version;
        item.status = ReviewStatus::Claimed;
        item.claimed_by = Some(reviewer.to_string());
        item.claimed_at = Some(now);
        item.record(AuditAction::Claimed, reviewer, None, now);

        if !self.store.reviews.compare_and_swap(&item, expected).await? {
            let current = self.get(item_id).await?;
            return Err(Error::AlreadyClaimed(
                current
                    .claimed_by
                    .unwrap_or_else(|| "another reviewer".into()),
            ));
        }
        item.version = expected + 1;
        info!(review_item_id = %item.id, reviewer, "Review item claimed");
        Ok(item)
    }

    /// Claim the highest-priority QUEUED item, skipping items lost to other
    /// reviewers in the meantime.
    pub async fn claim_next(&self, reviewer: &str) -> Result<Option<ReviewItem>> {
        let filter = ReviewFilter {
            status: Some(ReviewStatus::Queued),
            ..Default::default()
        };
        for candidate in self.list_queue(&filter).await? {
            match self.claim(candidate.id, reviewer).await {
                Ok(item) => return Ok(Some(item)),
                Err(Error::AlreadyClaimed(_)) | Err(Error::InvalidTransition(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Resolve a CLAIMED item.
    ///
    /// Only the claimant may resolve. Corrections are accepted with `Approve`
    /// only; they overwrite the extraction result and raise the job to HIGH.
    /// `Reject` requeues the job. `NeedsMoreInfo` releases the claim.
    #[instrument(skip(self, corrections), fields(subsystem = "review", op = "resolve"))]
    pub async fn resolve(
        &self,
        item_id: Uuid,
        reviewer: &str,
        action: ReviewAction,
        corrections: Option<FieldCorrections>,
    ) -> Result<ReviewItem> {
        let mut item = self.get(item_id).await?;
        if item.status != ReviewStatus::Claimed {
            return Err(Error::InvalidTransition(format!(
                "review item {} is {:?}; resolution requires a claim",
                item_id, item.status
            )));
        }
        if item.claimed_by.as_deref() != Some(reviewer) {
            return Err(Error::Forbidden(format!(
                "review item {} is claimed by {}",
                item_id,
                item.claimed_by.as_deref().unwrap_or("nobody")
            )));
        }

        let corrections = corrections
            .filter(|c| !c.is_empty())
            .map(normalize_corrections)
            .transpose()?;
        if corrections.is_some() && action != ReviewAction::Approve {
            return Err(Error::InvalidInput(
                "corrections are only accepted when approving".into(),
            ));
        }

        // Validate the job-side effect before committing the item.
        let requeued_job = if action == ReviewAction::Reject {
            let mut job = self.load_job(item.job_id).await?;
            job.apply(JobEvent::Requeue, Utc::now())?;
            Some(job)
        } else {
            None
        };

        let now = Utc::now();
        let expected = item.version;
        match action {
            ReviewAction::Approve => {
                let detail = corrections
                    .as_ref()
                    .map(|c| format!("corrected: {}", c.corrected_fields().join(", ")));
                item.status = ReviewStatus::Approved;
                item.resolved_at = Some(now);
                item.corrections.clone_from(&corrections);
                item.record(AuditAction::Approved, reviewer, detail, now);
            }
            ReviewAction::Reject => {
                item.status = ReviewStatus::Rejected;
                item.resolved_at = Some(now);
                item.record(AuditAction::Rejected, reviewer, None, now);
            }
            ReviewAction::NeedsMoreInfo => {
                item.status = ReviewStatus::Queued;
                item.claimed_by = None;
                item.claimed_at = None;
                item.record(AuditAction::NeedsMoreInfo, reviewer, None, now);
            }
        }

        if !self.store.reviews.compare_and_swap(&item, expected).await? {
            return Err(Error::AlreadyClaimed(format!(
                "review item {} changed concurrently",
                item_id
            )));
        }
        item.version = expected + 1;

        match action {
            ReviewAction::Approve => self.apply_approval(&item, corrections.as_ref(), now).await?,
            ReviewAction::Reject => {
                if let Some(job) = requeued_job {
                    self.store.jobs.update(&job).await?;
                    info!(job_id = %job.id, retry_count = job.retry_count, "Job requeued after rejection");
                }
            }
            ReviewAction::NeedsMoreInfo => {}
        }

        info!(review_item_id = %item.id, reviewer, action = ?action, "Review item resolved");
        Ok(item)
    }

    /// Record a verification session outcome on the job's open item.
    ///
    /// A passed session self-resolves a QUEUED item when `level` allows it;
    /// otherwise the item is annotated and stays in the queue.
    pub async fn record_verification(
        &self,
        job_id: Uuid,
        owner: &str,
        level: ConfidenceLevel,
        passed: bool,
        detail: String,
    ) -> Result<Option<ReviewItem>> {
        for _ in 0..CAS_ATTEMPTS {
            let Some(mut item) = self.store.reviews.find_open_for_job(job_id).await? else {
                return Ok(None);
            };
            let now = Utc::now();
            let expected = item.version;
            let self_resolve =
                passed && level.allows_self_resolution() && item.status == ReviewStatus::Queued;

            if self_resolve {
                item.status = ReviewStatus::Approved;
                item.resolved_at = Some(now);
                item.record(AuditAction::SelfResolved, owner, Some(detail.clone()), now);
            } else if passed {
                item.record(AuditAction::SubmitterVerified, owner, Some(detail.clone()), now);
            } else {
                item.record(AuditAction::SubmitterCorrected, owner, Some(detail.clone()), now);
            }

            if self.store.reviews.compare_and_swap(&item, expected).await? {
                item.version = expected + 1;
                if self_resolve {
                    let mut job = self.load_job(job_id).await?;
                    job.needs_review = false;
                    self.store.jobs.update(&job).await?;
                    info!(review_item_id = %item.id, job_id = %job_id, "Review item self-resolved");
                }
                return Ok(Some(item));
            }
            debug!(job_id = %job_id, "Review item changed during verification update; retrying");
        }
        warn!(job_id = %job_id, "Gave up recording verification on contended review item");
        Err(Error::AlreadyClaimed(format!(
            "review item for job {} is contended",
            job_id
        )))
    }

    async fn load_job(&self, job_id: Uuid) -> Result<ExtractionJob> {
        self.store
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    async fn apply_approval(
        &self,
        item: &ReviewItem,
        corrections: Option<&FieldCorrections>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut result = self
            .store
            .results
            .get(item.job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("result for job {}", item.job_id)))?;
        let mut job = self.load_job(item.job_id).await?;

        if let Some(corrections) = corrections {
            corrections.apply_to(&mut result);
            job.confidence_level = Some(ConfidenceLevel::High);
            job.confidence_score = job.confidence_score.max(SCORE_HIGH_THRESHOLD);
        }
        result.human_verified = true;
        result.updated_at = now;
        job.needs_review = false;

        self.store.results.upsert(&result).await?;
        self.store.jobs.update(&job).await
    }
}

/// Reject malformed product codes and store GTINs in 14-digit form.
fn normalize_corrections(mut corrections: FieldCorrections) -> Result<FieldCorrections> {
    if let Some(code) = corrections.gtin.take() {
        let normalized = gtin::normalize(&code)
            .ok_or_else(|| Error::InvalidInput(format!("invalid product code: {}", code)))?;
        corrections.gtin = Some(normalized);
    }
    Ok(corrections)
}
