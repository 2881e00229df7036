//! Confidence scoring: combines decoder confidence, OCR confidence, and
//! field completeness into one score and level.

use safescan_core::defaults::SCORE_KEY_FIELDS;
use safescan_core::{CanonicalIdentifier, ConfidenceLevel, ScoringConfig};

/// Score with the default [`ScoringConfig`].
pub fn score(
    decode_conf: Option<f64>,
    ocr_conf: Option<f64>,
    fields_present: usize,
    fields_total: usize,
) -> (f64, ConfidenceLevel) {
    score_with(
        &ScoringConfig::default(),
        decode_conf,
        ocr_conf,
        fields_present,
        fields_total,
    )
}

/// Weighted score and level.
///
/// With both inputs the barcode confidence carries `barcode_weight` against
/// OCR's 1.0; with one input that input is used alone. The completeness ratio
/// is then folded in at `completeness_weight`.
pub fn score_with(
    config: &ScoringConfig,
    decode_conf: Option<f64>,
    ocr_conf: Option<f64>,
    fields_present: usize,
    fields_total: usize,
) -> (f64, ConfidenceLevel) {
    let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };

    let extraction = match (decode_conf.map(unit), ocr_conf.map(unit)) {
        (Some(d), Some(o)) => (config.barcode_weight * d + o) / (config.barcode_weight + 1.0),
        (Some(d), None) => d,
        (None, Some(o)) => o,
        (None, None) => 0.0,
    };

    let completeness = if fields_total == 0 {
        0.0
    } else {
        (fields_present.min(fields_total) as f64) / (fields_total as f64)
    };

    let w = config.completeness_weight;
    let score = unit((1.0 - w) * extraction + w * completeness);
    (score, level_for(config, score))
}

/// Band for a score. Lower bounds are inclusive.
pub fn level_for(config: &ScoringConfig, score: f64) -> ConfidenceLevel {
    if score >= config.high_threshold {
        ConfidenceLevel::High
    } else if score >= config.medium_threshold {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Key fields (gtin, lot, serial, expiry) present out of the total.
pub fn completeness(id: &CanonicalIdentifier) -> (usize, usize) {
    (id.key_fields_present(), SCORE_KEY_FIELDS)
}
