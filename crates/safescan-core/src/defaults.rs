//! Centralized default constants for the safescan system.
//!
//! **This module is the single source of truth** for all shared default values.
//! Configuration structs in [`crate::config`] and the worker configuration in
//! `safescan-jobs` take their defaults from here.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section.

// =============================================================================
// DECODER
// =============================================================================

/// Confidence assigned to a direct symbology decode (barcode/QR device output).
/// Structured AI, JSON, URL, and bare-numeric parses inherit it unchanged.
pub const DECODE_CONFIDENCE_SYMBOL: f64 = 0.95;

/// Confidence assigned to a free-text pattern extraction that found any field.
pub const DECODE_CONFIDENCE_TEXT: f64 = 0.85;

/// GTIN width after normalization.
pub const GTIN_LENGTH: usize = 14;

/// Bare product code lengths recognized as numeric payloads (EAN-8, UPC-A, EAN-13, ITF-14).
pub const PRODUCT_CODE_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Two-digit years at or below this value are 20xx, above are 19xx.
pub const DATE_PIVOT_YEAR: u32 = 50;

// =============================================================================
// SCORING
// =============================================================================

/// Score at or above which a result is HIGH (auto-accept).
pub const SCORE_HIGH_THRESHOLD: f64 = 0.85;

/// Score at or above which a result is MEDIUM (submitter may self-resolve).
pub const SCORE_MEDIUM_THRESHOLD: f64 = 0.60;

/// Barcode confidence weight relative to OCR confidence (OCR weight is 1.0).
pub const SCORE_BARCODE_WEIGHT: f64 = 1.2;

/// Weight of the completeness ratio folded into the final score.
pub const SCORE_COMPLETENESS_WEIGHT: f64 = 0.05;

/// Ceiling on a symbol decode's confidence when it produced no product code.
pub const SCORE_PARTIAL_DECODE_CAP: f64 = 0.50;

/// Key identifier fields counted for completeness (gtin, lot, serial, expiry).
pub const SCORE_KEY_FIELDS: usize = 4;

// =============================================================================
// PIPELINE
// =============================================================================

/// Maximum accepted source image size in bytes (20 MiB).
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Longest side of a normalized image, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// Soft budget for a whole extraction job, in seconds.
pub const JOB_SOFT_BUDGET_SECS: u64 = 120;

/// Soft deadline for one OCR/label provider call, in seconds.
pub const PROVIDER_SOFT_DEADLINE_SECS: u64 = 30;

/// Hard deadline for one OCR/label provider call, in seconds.
pub const PROVIDER_HARD_DEADLINE_SECS: u64 = 45;

/// Deliveries of one job before a ServiceUnavailable stops being retried.
pub const JOB_MAX_DELIVERIES: u32 = 3;

/// Object-store key prefix for normalized copies.
pub const NORMALIZED_KEY_PREFIX: &str = "normalized";

// =============================================================================
// WORKER
// =============================================================================

/// Default poll interval when the queue is empty, in milliseconds.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// How long a claimed job stays invisible to other workers, in seconds.
pub const JOB_LEASE_SECS: u64 = 300;

// =============================================================================
// REVIEW / VERIFICATION
// =============================================================================

/// Review priority for LOW confidence items (claimed first).
pub const REVIEW_PRIORITY_LOW: i32 = 1;

/// Review priority for MEDIUM confidence items.
pub const REVIEW_PRIORITY_MEDIUM: i32 = 2;

/// Default page size for review queue listings.
pub const REVIEW_LIST_LIMIT: usize = 50;

/// Score required for a verification session to pass.
pub const VERIFICATION_PASS_THRESHOLD: f64 = 0.6;

/// Lifetime of an unconfirmed verification session, in seconds.
pub const VERIFICATION_SESSION_TTL_SECS: i64 = 15 * 60;

// =============================================================================
// MATCHING
// =============================================================================

/// Confidence for serial + product code matches.
pub const MATCH_CONFIDENCE_EXACT_UNIT: f64 = 0.99;

/// Confidence for lot/batch + product code matches.
pub const MATCH_CONFIDENCE_LOT: f64 = 0.95;

/// Confidence for expiry + product code matches.
pub const MATCH_CONFIDENCE_EXPIRY: f64 = 0.90;

/// Confidence for blanket (unrestricted) product recalls.
pub const MATCH_CONFIDENCE_PRODUCT: f64 = 0.85;

/// Confidence when every product hit is restricted to other lots/serials.
pub const MATCH_CONFIDENCE_DIFFERENT_LOT: f64 = 0.70;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_thresholds_ordered() {
        assert!(SCORE_MEDIUM_THRESHOLD < SCORE_HIGH_THRESHOLD);
        assert!(SCORE_HIGH_THRESHOLD <= 1.0);
        assert!(SCORE_MEDIUM_THRESHOLD > 0.0);
        assert!(SCORE_PARTIAL_DECODE_CAP < SCORE_MEDIUM_THRESHOLD);
    }

    #[test]
    fn test_provider_deadlines_ordered() {
        assert!(PROVIDER_SOFT_DEADLINE_SECS < PROVIDER_HARD_DEADLINE_SECS);
        assert!(PROVIDER_HARD_DEADLINE_SECS < JOB_SOFT_BUDGET_SECS);
    }

    #[test]
    fn test_match_confidences_descend_by_tier() {
        let tiers = [
            MATCH_CONFIDENCE_EXACT_UNIT,
            MATCH_CONFIDENCE_LOT,
            MATCH_CONFIDENCE_EXPIRY,
            MATCH_CONFIDENCE_PRODUCT,
            MATCH_CONFIDENCE_DIFFERENT_LOT,
        ];
        assert!(tiers.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_low_confidence_reviewed_first() {
        assert!(REVIEW_PRIORITY_LOW < REVIEW_PRIORITY_MEDIUM);
    }
}
