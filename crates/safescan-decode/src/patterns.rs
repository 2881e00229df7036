//! Labeled-field patterns for free text (OCR output, typed labels).

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use safescan_core::CanonicalIdentifier;

use crate::dates;
use crate::gtin;

const DATE: &str =
    r"(\d{4}[-/.]\d{1,2}(?:[-/.]\d{1,2})?|\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}|\d{1,2}[-/.]\d{4}|\d{6})";

static LOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:LOT|L/N)(?:\s*(?:NO\.?|NUMBER|#))?\s*[:#.]?\s*([A-Z0-9][A-Z0-9\-]{0,29})")
        .expect("valid regex")
});

static BATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bBATCH(?:\s*(?:NO\.?|NUMBER|CODE|#))?\s*[:#.]?\s*([A-Z0-9][A-Z0-9\-]{0,29})")
        .expect("valid regex")
});

static SERIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\bS/N|\bSN|\bSERIAL(?:\s*(?:NO\.?|NUMBER|#))?)\s*[:#.]?\s*([A-Z0-9][A-Z0-9\-]{2,39})",
    )
    .expect("valid regex")
});

static EXPIRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:EXP(?:IRY|IRATION|\.)?(?:\s*DATE)?|USE\s+BY|BEST\s+BEFORE|BB)\s*[:.]?\s*{}",
        DATE
    ))
    .expect("valid regex")
});

static PRODUCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:MFG|MFD|MANUFACTURED|PROD(?:UCTION|\.)?\s*DATE)\s*[:.]?\s*{}",
        DATE
    ))
    .expect("valid regex")
});

static MODEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bMODEL(?:\s*(?:NO\.?|NUMBER|#))?\s*[:#.]?\s*([A-Z0-9][A-Z0-9\-./]{1,29})")
        .expect("valid regex")
});

static LABELED_GTIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:GTIN|UPC|EAN)(?:-?(?:14|13|12|8|A))?\s*[:#]?\s*(\d[\d \-]{6,18}\d)")
        .expect("valid regex")
});

static BARE_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{8,14}\b").expect("valid regex"));

static BRAND_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)\bBRAND\s*:\s*([A-Za-z0-9][A-Za-z0-9&'\- ]{0,39}?)\s*$")
        .expect("valid regex")
});

static BRAND_MARK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Za-z0-9&'\-]{1,30})\s*[™®]").expect("valid regex")
});

static AGE_YEARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bAGES?\s*(\d{1,2})\s*(?:\+|AND\s+UP|&\s*UP|YEARS?\s*\+?)|\b(\d{1,2})\s*\+\s*(?:YEARS?|YRS?)\b")
        .expect("valid regex")
});

static AGE_MONTHS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*MONTHS?\s*\+?").expect("valid regex")
});

static WARNING_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:WARNING|CAUTION|DANGER|CHOKING\s+HAZARD)\b").expect("valid regex")
});

fn has_digit(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
}

/// Run the labeled-field patterns over `text`. Returns the number of fields found.
///
/// Identifier-like values must contain a digit so prose such as "a lot of"
/// is not read as a lot number. The bare 8–14 digit search ignores digits
/// already claimed by a labeled field and prefers a valid GS1 check digit.
pub fn extract_fields(text: &str, id: &mut CanonicalIdentifier) -> usize {
    let mut found = 0;
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut capture =
        |re: &Lazy<Regex>, require_digit: bool| first_capture(re, text, require_digit, &mut claimed);

    if let Some(lot) = capture(&LOT_RE, true) {
        id.lot_number.get_or_insert(lot);
        found += 1;
    }
    if let Some(batch) = capture(&BATCH_RE, true) {
        id.batch_code.get_or_insert(batch);
        found += 1;
    }
    if let Some(serial) = capture(&SERIAL_RE, true) {
        id.serial_number.get_or_insert(serial);
        found += 1;
    }
    if let Some(raw) = capture(&EXPIRY_RE, false) {
        match dates::parse_loose(&raw) {
            Some(date) => {
                id.expiry_date.get_or_insert(date);
            }
            None => {
                id.extra_fields
                    .entry("expiry_date_raw".to_string())
                    .or_insert(raw);
            }
        }
        found += 1;
    }
    if let Some(raw) = capture(&PRODUCTION_RE, false) {
        match dates::parse_loose(&raw) {
            Some(date) => {
                id.production_date.get_or_insert(date);
            }
            None => {
                id.extra_fields
                    .entry("production_date_raw".to_string())
                    .or_insert(raw);
            }
        }
        found += 1;
    }
    if let Some(model) = capture(&MODEL_RE, true) {
        id.extra_fields.entry("model".to_string()).or_insert(model);
        found += 1;
    }
    if let Some(raw) = capture(&LABELED_GTIN_RE, false) {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if let Some(code) = gtin::normalize(&digits) {
            id.gtin.get_or_insert(code);
            found += 1;
        }
    }

    if id.gtin.is_none() {
        let overlaps = |r: &Range<usize>| claimed.iter().any(|c| c.start < r.end && r.start < c.end);
        let candidates: Vec<&str> = BARE_DIGITS_RE
            .find_iter(text)
            .filter(|m| !overlaps(&m.range()))
            .map(|m| m.as_str())
            .collect();
        let best = candidates
            .iter()
            .find(|c| is_standard_length(c) && gtin::check_digit_valid(c))
            .or_else(|| candidates.iter().find(|c| is_standard_length(c)))
            .or_else(|| candidates.first());
        if let Some(code) = best.and_then(|c| gtin::normalize(c)) {
            id.gtin = Some(code);
            found += 1;
        }
    }

    found
}

/// First capture-group-1 value of `re`, recording its span in `claimed`.
fn first_capture(
    re: &Regex,
    text: &str,
    require_digit: bool,
    claimed: &mut Vec<Range<usize>>,
) -> Option<String> {
    re.captures_iter(text).find_map(|caps| {
        let m = caps.get(1)?;
        if require_digit && !has_digit(m.as_str()) {
            return None;
        }
        claimed.push(m.range());
        Some(m.as_str().to_string())
    })
}

fn is_standard_length(code: &str) -> bool {
    safescan_core::defaults::PRODUCT_CODE_LENGTHS.contains(&code.len())
}

/// Product attributes read from label text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelAttributes {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub age_recommendation: Option<String>,
    pub hazard_warnings: Vec<String>,
}

/// Read brand, model, age recommendation, and warning statements from text.
pub fn label_attributes(text: &str) -> LabelAttributes {
    let brand = BRAND_LABEL_RE
        .captures(text)
        .or_else(|| BRAND_MARK_RE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|b| !b.is_empty());

    let model = MODEL_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|m| has_digit(m))
        .map(str::to_string);

    let age_recommendation = AGE_YEARS_RE
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| format!("{}+ years", m.as_str()))
        .or_else(|| {
            AGE_MONTHS_RE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| format!("{}+ months", m.as_str()))
        });

    let mut hazard_warnings: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim) {
        if WARNING_LINE_RE.is_match(line) && !hazard_warnings.iter().any(|w| w == line) {
            hazard_warnings.push(line.to_string());
        }
    }

    LabelAttributes {
        brand,
        model,
        age_recommendation,
        hazard_warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use safescan_core::Symbology;

    fn extract(text: &str) -> (CanonicalIdentifier, usize) {
        let mut id = CanonicalIdentifier::new(text, Symbology::Text);
        let n = extract_fields(text, &mut id);
        (id, n)
    }

    #[test]
    fn test_labeled_fields() {
        let (id, n) = extract("LOT: A12B\nS/N: 99-XY-1\nEXP: 2026-03-31\nMFG 2024/01/15");
        assert_eq!(n, 4);
        assert_eq!(id.lot_number.as_deref(), Some("A12B"));
        assert_eq!(id.serial_number.as_deref(), Some("99-XY-1"));
        assert_eq!(id.expiry_date, NaiveDate::from_ymd_opt(2026, 3, 31));
        assert_eq!(id.production_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn test_prose_lot_ignored() {
        let (id, _) = extract("A lot of fun for everyone");
        assert!(id.lot_number.is_none());
    }

    #[test]
    fn test_batch_and_model() {
        let (id, _) = extract("Batch No. 7731\nModel #XR-200");
        assert_eq!(id.batch_code.as_deref(), Some("7731"));
        assert_eq!(id.extra_fields.get("model").unwrap(), "XR-200");
    }

    #[test]
    fn test_use_by_month_precision() {
        let (id, _) = extract("USE BY 11/2026");
        assert_eq!(id.expiry_date, NaiveDate::from_ymd_opt(2026, 11, 30));
    }

    #[test]
    fn test_labeled_gtin_with_spaces() {
        let (id, _) = extract("UPC: 0 12345 67890 5");
        assert_eq!(id.gtin.as_deref(), Some("00012345678905"));
    }

    #[test]
    fn test_bare_digits_prefer_valid_check_digit() {
        let (id, _) = extract("ref 123456789013 item 4006381333931");
        assert_eq!(id.gtin.as_deref(), Some("04006381333931"));
    }

    #[test]
    fn test_bare_digits_skip_labeled_values() {
        let (id, _) = extract("LOT 12345678");
        assert_eq!(id.lot_number.as_deref(), Some("12345678"));
        assert!(id.gtin.is_none());
    }

    #[test]
    fn test_nothing_found() {
        let (id, n) = extract("hello world");
        assert_eq!(n, 0);
        assert!(!id.is_identified());
    }

    #[test]
    fn test_label_attributes() {
        let text = "SuperBlocks™ Building Set\nModel: SB-4410\nAges 3+\nWARNING: CHOKING HAZARD - Small parts.\nCaution: keep away from fire";
        let attrs = label_attributes(text);
        assert_eq!(attrs.brand.as_deref(), Some("SuperBlocks"));
        assert_eq!(attrs.model.as_deref(), Some("SB-4410"));
        assert_eq!(attrs.age_recommendation.as_deref(), Some("3+ years"));
        assert_eq!(attrs.hazard_warnings.len(), 2);
    }

    #[test]
    fn test_brand_label_takes_precedence() {
        let attrs = label_attributes("Brand: Acme Toys\nSuperBlocks®");
        assert_eq!(attrs.brand.as_deref(), Some("Acme Toys"));
    }

    #[test]
    fn test_age_in_months() {
        let attrs = label_attributes("Suitable for 36 months+");
        assert_eq!(attrs.age_recommendation.as_deref(), Some("36+ months"));
    }

    #[test]
    fn test_age_years_suffix() {
        let attrs = label_attributes("For kids 8+ years");
        assert_eq!(attrs.age_recommendation.as_deref(), Some("8+ years"));
    }
}
