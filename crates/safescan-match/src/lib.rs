//! # safescan-match
//!
//! Safety-registry matching for decoded product identifiers.
//!
//! Matching is synchronous and side-effect free so it can run straight from
//! a request handler for text-only scans, without going through the job
//! pipeline.

pub mod engine;
pub mod registry;
pub mod severity;

pub use engine::{match_identifier, NO_MATCH_MESSAGE};
pub use registry::MemoryRegistry;
pub use severity::{classify_hazard, max_severity, record_severity};
