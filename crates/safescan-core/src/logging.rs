//! Structured logging schema and field name constants for safescan.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job abandoned, boundary misconfigured, requires operator attention |
//! | WARN  | Recoverable issue, degraded confidence or fallback provider applied |
//! | INFO  | Lifecycle events (job submitted/completed, review resolved, worker start/stop) |
//! | DEBUG | Decision points (decode format chosen, match tier, routing) |
//! | TRACE | Per-item iteration (AI tokens, registry variants, provider attempts) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "decode", "jobs", "review", "verification", "match", "store"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "pipeline", "ocr_chain", "http_ocr"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "decode", "claim", "resolve", "confirm", "match"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Extraction job UUID.
pub const JOB_ID: &str = "job_id";

/// External owner (submitter) reference.
pub const OWNER: &str = "owner";

/// Pipeline step name.
pub const STEP: &str = "step";

/// Review item UUID.
pub const REVIEW_ITEM_ID: &str = "review_item_id";

/// Reviewer reference.
pub const REVIEWER: &str = "reviewer";

/// Verification session UUID.
pub const SESSION_ID: &str = "session_id";

/// OCR/label provider name.
pub const PROVIDER: &str = "provider";

/// Symbology of a decoded payload.
pub const SYMBOLOGY: &str = "symbology";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// A confidence value in [0, 1].
pub const CONFIDENCE: &str = "confidence";

/// Confidence level (HIGH/MEDIUM/LOW).
pub const CONFIDENCE_LEVEL: &str = "confidence_level";

/// Match tier reported by the match engine.
pub const MATCH_TYPE: &str = "match_type";

/// Number of registry records matched.
pub const RECORD_COUNT: &str = "record_count";

/// Delivery attempt of a job (1 on first delivery).
pub const DELIVERY_ATTEMPT: &str = "delivery_attempt";

// ─── Error fields ──────────────────────────────────────────────────────────

/// Error message (use with ERROR/WARN levels).
pub const ERROR_MSG: &str = "error";
