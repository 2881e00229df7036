//! # safescan-core
//!
//! Core types, traits, and abstractions for the safescan product-identification
//! and recall-matching system.
//!
//! This crate provides the foundational data structures, the error taxonomy,
//! and the trait definitions (external boundaries and repositories) that the
//! other safescan crates depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{PipelineConfig, ScoringConfig, VerificationConfig};
pub use error::{Error, ErrorKind, Result};
pub use file_safety::{check_integrity, detect_image_type, IntegrityReport};
pub use models::*;
pub use traits::*;
