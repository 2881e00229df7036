//! Tiered matching of a canonical identifier against a safety registry.
//!
//! Tiers are tried most specific first and the first tier with any records
//! wins:
//!
//! | Tier | Requires | Confidence |
//! |------|----------|------------|
//! | `EXACT_UNIT` | serial + product code | 0.99 |
//! | `LOT_MATCH` | lot (or batch) + product code | 0.95 |
//! | `EXPIRY_MATCH` | expiry + product code | 0.90 |
//! | `PRODUCT_MATCH` | product code, unrestricted recall | 0.85 |
//! | `PRODUCT_MATCH_DIFFERENT_LOT` | product code, every recall restricted | 0.70, not found |
//! | `NO_MATCH` | | 0.0 |
//!
//! Each product-code query is repeated for every stored form of the code
//! ([`gtin::variants`]) and the results are unioned by record id.

use std::collections::HashSet;

use tracing::{debug, trace};

use safescan_core::{
    CanonicalIdentifier, MatchResult, MatchType, RegistryLookup, RegistryQuery, RegistryRecord,
    Severity,
};
use safescan_decode::gtin;

use crate::severity::max_severity;

/// Reported when nothing matched. Never phrased as an assurance of safety.
pub const NO_MATCH_MESSAGE: &str = "No recalls found in this registry.";

/// Match `identifier` against `registry`.
///
/// Pure with respect to the registry: lookups only, no writes, and no
/// errors. An identifier without a product code cannot match anything.
pub fn match_identifier(identifier: &CanonicalIdentifier, registry: &dyn RegistryLookup) -> MatchResult {
    let Some(code) = identifier.gtin.as_deref() else {
        debug!(
            subsystem = "match",
            op = "match",
            match_type = MatchType::NoMatch.as_str(),
            "No product code to match"
        );
        return no_match();
    };
    let codes = gtin::variants(code);

    let result = if let Some(records) = identifier
        .serial_number
        .as_deref()
        .and_then(|serial| non_empty(lookup(registry, &codes, |q| q.serial = Some(serial.into()))))
    {
        found(MatchType::ExactUnit, records)
    } else if let Some(records) = identifier
        .lot_or_batch()
        .and_then(|lot| non_empty(lookup(registry, &codes, |q| q.lot = Some(lot.into()))))
    {
        found(MatchType::LotMatch, records)
    } else if let Some(records) = identifier
        .expiry_date
        .and_then(|expiry| non_empty(lookup(registry, &codes, |q| q.expiry = Some(expiry))))
    {
        found(MatchType::ExpiryMatch, records)
    } else {
        let product = lookup(registry, &codes, |_| {});
        let (unrestricted, restricted): (Vec<_>, Vec<_>) =
            product.into_iter().partition(|r| !r.is_restricted());
        if !unrestricted.is_empty() {
            found(MatchType::ProductMatch, unrestricted)
        } else if !restricted.is_empty() {
            let unit_read = identifier.serial_number.is_some() || identifier.lot_or_batch().is_some();
            different_lot(restricted, unit_read)
        } else {
            no_match()
        }
    };

    debug!(
        subsystem = "match",
        op = "match",
        match_type = result.match_type.as_str(),
        confidence = result.confidence,
        record_count = result.matched_records.len(),
        "Registry match evaluated"
    );
    result
}

/// Query once per product-code form, keeping the first copy of each record.
fn lookup(
    registry: &dyn RegistryLookup,
    codes: &[String],
    constrain: impl Fn(&mut RegistryQuery),
) -> Vec<RegistryRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for code in codes {
        let mut query = RegistryQuery {
            product_code: Some(code.clone()),
            ..Default::default()
        };
        constrain(&mut query);
        let hits = registry.find_by(&query);
        trace!(subsystem = "match", variant = %code, record_count = hits.len(), "Variant lookup");
        for record in hits {
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }
    }
    records
}

fn non_empty(records: Vec<RegistryRecord>) -> Option<Vec<RegistryRecord>> {
    (!records.is_empty()).then_some(records)
}

fn found(match_type: MatchType, records: Vec<RegistryRecord>) -> MatchResult {
    let basis = match match_type {
        MatchType::ExactUnit => "serial number",
        MatchType::LotMatch => "lot number",
        MatchType::ExpiryMatch => "expiry date",
        _ => "product code",
    };
    let message = format!(
        "{} recall record(s) match this product's {}. Review the recall notice and stop using the product until you have confirmed the remedy.",
        records.len(),
        basis
    );
    MatchResult {
        found: true,
        match_type,
        confidence: match_type.confidence(),
        severity: max_severity(&records),
        matched_records: records,
        message,
    }
}

/// `unit_read` says whether a lot, batch, or serial was scanned at all.
fn different_lot(records: Vec<RegistryRecord>, unit_read: bool) -> MatchResult {
    let message = if unit_read {
        format!(
            "This product has {} recall record(s) limited to specific lots or serial numbers, and the scanned identifiers did not match them. Compare your unit against the recall notice to confirm it is unaffected.",
            records.len()
        )
    } else {
        format!(
            "This product has {} recall record(s) limited to specific lots or serial numbers, but no lot or serial number was read from this scan. Compare your unit against the recall notice to check whether it is affected.",
            records.len()
        )
    };
    MatchResult {
        found: false,
        match_type: MatchType::ProductMatchDifferentLot,
        confidence: MatchType::ProductMatchDifferentLot.confidence(),
        severity: max_severity(&records),
        matched_records: records,
        message,
    }
}

fn no_match() -> MatchResult {
    MatchResult {
        found: false,
        match_type: MatchType::NoMatch,
        confidence: MatchType::NoMatch.confidence(),
        severity: Severity::Low,
        matched_records: Vec::new(),
        message: NO_MATCH_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryRegistry;
    use chrono::NaiveDate;
    use safescan_core::Symbology;

    fn record(id: &str, code: &str, hazard: &str) -> RegistryRecord {
        RegistryRecord {
            id: id.into(),
            product_code: code.into(),
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
            agency_severity: None,
        }
    }

    fn identifier(gtin: &str) -> CanonicalIdentifier {
        let mut id = CanonicalIdentifier::new(gtin, Symbology::UpcA);
        id.gtin = Some(gtin.into());
        id
    }

    #[test]
    fn test_no_product_code_is_no_match() {
        let registry = MemoryRegistry::new(vec![record("R", "00012345678905", "Fire")]);
        let mut id = CanonicalIdentifier::new("LOT: X", Symbology::Unknown);
        id.lot_number = Some("X".into());

        let result = match_identifier(&id, &registry);
        assert_eq!(result.match_type, MatchType::NoMatch);
        assert!(!result.found);
        assert_eq!(result.message, NO_MATCH_MESSAGE);
    }

    #[test]
    fn test_lot_tier_uses_batch_code_fallback() {
        let mut rec = record("R", "00012345678905", "Fall hazard");
        rec.lot_numbers = vec!["B-77".into()];
        rec.has_lot_restriction = true;
        let registry = MemoryRegistry::new(vec![rec]);

        let mut id = identifier("00012345678905");
        id.batch_code = Some("b-77".into());
        let result = match_identifier(&id, &registry);
        assert_eq!(result.match_type, MatchType::LotMatch);
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn test_expiry_tier() {
        let mut rec = record("R", "00012345678905", "Poison risk");
        rec.expiry_dates = vec![NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()];
        rec.has_lot_restriction = true;
        let registry = MemoryRegistry::new(vec![rec]);

        let mut id = identifier("00012345678905");
        id.lot_number = Some("OTHER".into());
        id.expiry_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let result = match_identifier(&id, &registry);
        assert_eq!(result.match_type, MatchType::ExpiryMatch);
        assert!(result.found);
    }

    #[test]
    fn test_variant_lookups_are_deduplicated() {
        let registry = MemoryRegistry::new(vec![
            record("R-1", "12345678905", "Fall hazard"),
            record("R-2", "012345678905", "Fall hazard"),
        ]);
        let result = match_identifier(&identifier("00012345678905"), &registry);
        assert_eq!(result.match_type, MatchType::ProductMatch);
        let ids: Vec<_> = result.matched_records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"R-1") && ids.contains(&"R-2"));
    }

    #[test]
    fn test_unrestricted_recall_beats_restricted_at_product_tier() {
        let mut restricted = record("R-1", "00012345678905", "Fire");
        restricted.has_serial_restriction = true;
        let registry = MemoryRegistry::new(vec![
            restricted,
            record("R-2", "00012345678905", "Label misprint"),
        ]);
        let result = match_identifier(&identifier("00012345678905"), &registry);
        assert_eq!(result.match_type, MatchType::ProductMatch);
        assert_eq!(result.matched_records.len(), 1);
        assert_eq!(result.matched_records[0].id, "R-2");
        assert_eq!(result.severity, Severity::Low);
    }
}
