//! # safescan-review
//!
//! Human-in-the-loop handling of MEDIUM and LOW confidence extractions.
//!
//! - [`ReviewQueue`]: priority-ordered work queue with exclusive claims,
//!   reviewer resolution, and an append-only audit log per item.
//! - [`VerificationService`]: single-shot submitter confirmation sessions
//!   that compare claimed fields against the extraction.

pub mod queue;
pub mod verification;

pub use queue::ReviewQueue;
pub use verification::{tolerant_match, VerificationService};
