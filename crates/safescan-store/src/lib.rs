//! # safescan-store
//!
//! In-memory implementations of the safescan repository traits and of
//! object storage, for single-process deployments and tests.
//!
//! [`Store`] bundles one implementation of each trait behind `Arc<dyn _>` so
//! services can be wired against any backend.

use std::sync::Arc;

use safescan_core::{JobRepository, ObjectStore, ResultRepository, ReviewRepository, SessionRepository};

pub mod jobs;
pub mod objects;
pub mod results;
pub mod reviews;
pub mod sessions;

pub use jobs::MemoryJobRepository;
pub use objects::MemoryObjectStore;
pub use results::MemoryResultRepository;
pub use reviews::MemoryReviewRepository;
pub use sessions::MemorySessionRepository;

/// Repository bundle shared by the pipeline, review queue, and verification.
#[derive(Clone)]
pub struct Store {
    /// Extraction jobs and delivery leases.
    pub jobs: Arc<dyn JobRepository>,
    /// Extraction results (1:1 with jobs).
    pub results: Arc<dyn ResultRepository>,
    /// Review queue items.
    pub reviews: Arc<dyn ReviewRepository>,
    /// Verification sessions.
    pub sessions: Arc<dyn SessionRepository>,
    /// Source images and normalized copies.
    pub objects: Arc<dyn ObjectStore>,
}

impl Store {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
        reviews: Arc<dyn ReviewRepository>,
        sessions: Arc<dyn SessionRepository>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            jobs,
            results,
            reviews,
            sessions,
            objects,
        }
    }

    /// A store backed entirely by in-memory repositories.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryJobRepository::new()),
            Arc::new(MemoryResultRepository::new()),
            Arc::new(MemoryReviewRepository::new()),
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemoryObjectStore::new()),
        )
    }

    /// In-memory store whose object storage is `objects`.
    pub fn in_memory_with_objects(objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            objects,
            ..Self::in_memory()
        }
    }
}
