//! # safescan-jobs
//!
//! Extraction job pipeline for safescan.
//!
//! A submitted image becomes an [`ExtractionJob`](safescan_core::ExtractionJob)
//! that moves QUEUED → PROCESSING → {COMPLETED, FAILED, TIMEOUT}. Inside
//! PROCESSING the [`ExtractionPipeline`] runs the integrity check,
//! normalization, barcode decoding, OCR, and label detection, checkpointing
//! after each step, then scores the result and queues MEDIUM/LOW jobs for
//! review. The [`JobWorker`] leases jobs from the repository and runs them
//! concurrently with at-least-once delivery.

pub mod adapters;
pub mod handler;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod service;
pub mod worker;

pub use adapters::{HttpLabelBackend, HttpOcrBackend, HttpServiceConfig, HttpSymbolReader};
pub use handler::{JobContext, JobHandler, JobResult};
pub use pipeline::{build_result, ExtractionPipeline};
pub use providers::{LabelChain, NoSymbolReader, OcrChain};
pub use service::JobService;
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};
