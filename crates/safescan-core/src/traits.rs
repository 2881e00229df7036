//! Core traits for safescan abstractions.
//!
//! External collaborators (object storage, OCR, label detection, symbol
//! reading, the safety registry) and persistence are expressed as traits so
//! that concrete implementations are injected rather than discovered.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// EXTERNAL BOUNDARY TRAITS
// =============================================================================

/// Object storage for source images and normalized copies.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. Missing keys are `Error::NotFound`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object, replacing any existing value.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}

/// OCR capability boundary.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Extract text from an image.
    ///
    /// Unreachable or failing services report `Error::ServiceUnavailable`.
    async fn extract_text(&self, image: &[u8]) -> Result<OcrOutput>;

    /// Provider name for logs and results.
    fn name(&self) -> &str;
}

/// Label/classification capability boundary.
#[async_trait]
pub trait LabelBackend: Send + Sync {
    async fn extract_labels(&self, image: &[u8]) -> Result<LabelOutput>;

    fn name(&self) -> &str;
}

/// Locates barcode/QR symbols in an image and returns their raw payloads.
#[async_trait]
pub trait SymbolReader: Send + Sync {
    async fn read_symbols(&self, image: &[u8]) -> Result<Vec<SymbolPayload>>;
}

/// Read-only safety registry lookup.
///
/// Synchronous so matching stays a pure call usable outside the runtime.
/// Every populated query field must match; absent fields do not constrain.
pub trait RegistryLookup: Send + Sync {
    fn find_by(&self, query: &RegistryQuery) -> Vec<RegistryRecord>;
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for extraction jobs and their delivery leases.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job.
    async fn insert(&self, job: &ExtractionJob) -> Result<()>;

    /// Get job by ID.
    async fn get(&self, job_id: Uuid) -> Result<Option<ExtractionJob>>;

    /// Replace a job's persisted state (flags, checkpoint, status) as one write.
    async fn update(&self, job: &ExtractionJob) -> Result<()>;

    /// Lease the oldest deliverable job for `lease`.
    ///
    /// Deliverable means QUEUED, or PROCESSING with no live lease (a worker
    /// crashed before acknowledging). The returned job has its
    /// `delivery_attempts` incremented.
    async fn claim_next(&self, lease: Duration) -> Result<Option<ExtractionJob>>;

    /// Lease one specific job for `lease`.
    ///
    /// Fails with `AlreadyClaimed` while another delivery holds a live lease
    /// and `InvalidTransition` once the job is terminal. Counts a delivery
    /// like [`claim_next`](Self::claim_next).
    async fn claim(&self, job_id: Uuid, lease: Duration) -> Result<ExtractionJob>;

    /// Acknowledge a delivery; the job is no longer redeliverable.
    async fn ack(&self, job_id: Uuid) -> Result<()>;

    /// Drop the lease so the job is redelivered on the next claim.
    async fn release(&self, job_id: Uuid) -> Result<()>;

    /// Jobs currently in `status`.
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<ExtractionJob>>;
}

/// Repository for extraction results (1:1 with jobs).
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn upsert(&self, result: &ExtractionResult) -> Result<()>;

    async fn get(&self, job_id: Uuid) -> Result<Option<ExtractionResult>>;
}

/// Repository for review items.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, item: &ReviewItem) -> Result<()>;

    async fn get(&self, item_id: Uuid) -> Result<Option<ReviewItem>>;

    /// The open (non-terminal) item for a job, if any.
    async fn find_open_for_job(&self, job_id: Uuid) -> Result<Option<ReviewItem>>;

    /// Items matching `filter`, ordered by priority then creation time.
    async fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewItem>>;

    /// Store `item` only if the persisted version equals `expected_version`.
    ///
    /// On success the stored version becomes `expected_version + 1`.
    /// Returns `false` when another writer got there first.
    async fn compare_and_swap(&self, item: &ReviewItem, expected_version: u64) -> Result<bool>;
}

/// Repository for verification sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: &VerificationSession) -> Result<()>;

    async fn get(&self, session_id: Uuid) -> Result<Option<VerificationSession>>;

    /// Same contract as [`ReviewRepository::compare_and_swap`].
    async fn compare_and_swap(
        &self,
        session: &VerificationSession,
        expected_version: u64,
    ) -> Result<bool>;
}
