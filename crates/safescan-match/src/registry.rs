//! In-memory safety registry.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, trace};

use safescan_core::{RegistryLookup, RegistryQuery, RegistryRecord, Result};

/// Registry fixture document: a bare array or `{"records": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    Records(Vec<RegistryRecord>),
    Wrapped { records: Vec<RegistryRecord> },
}

/// A registry held in memory, loadable from JSON.
///
/// Lot and serial comparisons ignore case and surrounding whitespace.
/// Product codes compare exactly; callers query each stored form they need.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    records: Vec<RegistryRecord>,
}

impl MemoryRegistry {
    pub fn new(records: Vec<RegistryRecord>) -> Self {
        Self { records }
    }

    pub fn with_record(mut self, record: RegistryRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records = match serde_json::from_str::<RegistryDocument>(json)? {
            RegistryDocument::Records(records) => records,
            RegistryDocument::Wrapped { records } => records,
        };
        debug!(
            subsystem = "match",
            component = "memory_registry",
            record_count = records.len(),
            "Registry loaded"
        );
        Ok(Self::new(records))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn records(&self) -> &[RegistryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn same_token(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn satisfies(record: &RegistryRecord, query: &RegistryQuery) -> bool {
    if let Some(ref code) = query.product_code {
        if record.product_code.trim() != code.trim() {
            return false;
        }
    }
    if let Some(ref serial) = query.serial {
        if !record.serial_numbers.iter().any(|s| same_token(s, serial)) {
            return false;
        }
    }
    if let Some(ref lot) = query.lot {
        if !record.lot_numbers.iter().any(|l| same_token(l, lot)) {
            return false;
        }
    }
    if let Some(expiry) = query.expiry {
        if !record.expiry_dates.contains(&expiry) {
            return false;
        }
    }
    true
}

impl RegistryLookup for MemoryRegistry {
    fn find_by(&self, query: &RegistryQuery) -> Vec<RegistryRecord> {
        let found: Vec<RegistryRecord> = self
            .records
            .iter()
            .filter(|record| satisfies(record, query))
            .cloned()
            .collect();
        trace!(
            subsystem = "match",
            component = "memory_registry",
            ?query,
            record_count = found.len(),
            "Registry lookup"
        );
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FIXTURE: &str = r#"{
        "records": [
            {
                "id": "R-1",
                "product_code": "00012345678905",
                "hazard_text": "Choking hazard",
                "lot_numbers": ["abc123"],
                "serial_numbers": ["SN-9"],
                "expiry_dates": ["2025-01-01"],
                "has_lot_restriction": true,
                "source_agency": "CPSC"
            },
            {
                "id": "R-2",
                "product_code": "12345678905",
                "hazard_text": "Fall hazard"
            }
        ]
    }"#;

    #[test]
    fn test_from_json_accepts_wrapped_and_bare_documents() {
        let wrapped = MemoryRegistry::from_json(FIXTURE).unwrap();
        assert_eq!(wrapped.len(), 2);

        let bare = MemoryRegistry::from_json(
            r#"[{"id":"R-3","product_code":"96385074","hazard_text":"Risk of injury"}]"#,
        )
        .unwrap();
        assert_eq!(bare.records()[0].id, "R-3");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(MemoryRegistry::from_json("{\"records\": 5}").is_err());
    }

    #[test]
    fn test_every_populated_field_must_match() {
        let registry = MemoryRegistry::from_json(FIXTURE).unwrap();

        let hits = registry.find_by(&RegistryQuery {
            product_code: Some("00012345678905".into()),
            lot: Some(" ABC123 ".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "R-1");

        let misses = registry.find_by(&RegistryQuery {
            product_code: Some("00012345678905".into()),
            lot: Some("ZZZ".into()),
            ..Default::default()
        });
        assert!(misses.is_empty());

        let by_expiry = registry.find_by(&RegistryQuery {
            product_code: Some("00012345678905".into()),
            expiry: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        });
        assert_eq!(by_expiry.len(), 1);
    }

    #[test]
    fn test_product_code_compares_stored_form_exactly() {
        let registry = MemoryRegistry::from_json(FIXTURE).unwrap();
        let hits = registry.find_by(&RegistryQuery {
            product_code: Some("12345678905".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "R-2");
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let err = MemoryRegistry::from_path("/nonexistent/registry.json").unwrap_err();
        assert!(matches!(err, safescan_core::Error::Io(_)));
    }
}
