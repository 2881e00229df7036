//! Hazard severity from registry record text.

use safescan_core::{RegistryRecord, Severity};

/// Keyword stems that mark a hazard as HIGH.
const HIGH_KEYWORDS: &[&str] = &[
    "death",
    "choking",
    "choke",
    "suffocat",
    "fire",
    "electrocut",
    "poison",
];

/// Keyword stems that mark a hazard as MEDIUM.
const MEDIUM_KEYWORDS: &[&str] = &["injur", "hazard", "risk", "fall"];

/// Keyword tier of a hazard description.
pub fn classify_hazard(hazard_text: &str) -> Severity {
    let text = hazard_text.to_lowercase();
    if HIGH_KEYWORDS.iter().any(|k| text.contains(k)) {
        Severity::High
    } else if MEDIUM_KEYWORDS.iter().any(|k| text.contains(k)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Severity of one record: its keyword tier or the agency's rating, whichever is higher.
pub fn record_severity(record: &RegistryRecord) -> Severity {
    let tier = classify_hazard(&record.hazard_text);
    match record.agency_severity {
        Some(agency) => tier.max(agency),
        None => tier,
    }
}

/// Highest severity across `records`; LOW when empty.
pub fn max_severity<'a>(records: impl IntoIterator<Item = &'a RegistryRecord>) -> Severity {
    records
        .into_iter()
        .map(record_severity)
        .max()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hazard: &str, agency: Option<Severity>) -> RegistryRecord {
        RegistryRecord {
            id: "R".into(),
            product_code: "00012345678905".into(),
            product_name: None,
            hazard_text: hazard.into(),
            lot_numbers: vec![],
            serial_numbers: vec![],
            expiry_dates: vec![],
            has_lot_restriction: false,
            has_serial_restriction: false,
            source_agency: "CPSC".into(),
            recall_date: None,
            remedy: None,
            url: None,
            agency_severity: agency,
        }
    }

    #[test]
    fn test_high_keywords_win_over_medium() {
        assert_eq!(classify_hazard("Choking hazard for small children"), Severity::High);
        assert_eq!(classify_hazard("Battery may overheat and catch FIRE"), Severity::High);
        assert_eq!(classify_hazard("Risk of electrocution"), Severity::High);
    }

    #[test]
    fn test_medium_and_low_tiers() {
        assert_eq!(classify_hazard("Fall hazard"), Severity::Medium);
        assert_eq!(classify_hazard("Can cause injury"), Severity::Medium);
        assert_eq!(classify_hazard("Label missing required warnings"), Severity::Low);
        assert_eq!(classify_hazard(""), Severity::Low);
    }

    #[test]
    fn test_agency_severity_raises_but_never_lowers() {
        assert_eq!(
            record_severity(&record("Label misprint", Some(Severity::Critical))),
            Severity::Critical
        );
        assert_eq!(
            record_severity(&record("Suffocation risk", Some(Severity::Low))),
            Severity::High
        );
    }

    #[test]
    fn test_max_severity_across_records() {
        let records = [record("Label misprint", None), record("Fall hazard", None)];
        assert_eq!(max_severity(&records), Severity::Medium);
        assert_eq!(max_severity(std::iter::empty()), Severity::Low);
    }
}
