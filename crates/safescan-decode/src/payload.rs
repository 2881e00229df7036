//! JSON object and URL payloads.

use safescan_core::CanonicalIdentifier;
use serde_json::{Map, Value};

use crate::ai_table;
use crate::dates;
use crate::gs1;
use crate::gtin;

/// Canonical field a JSON key or URL parameter maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Gtin,
    Lot,
    Serial,
    Expiry,
    Production,
    Batch,
}

const URL_ALIASES: &[(&str, Target)] = &[
    ("gtin", Target::Gtin),
    ("upc", Target::Gtin),
    ("ean", Target::Gtin),
    ("product", Target::Gtin),
    ("id", Target::Gtin),
    ("lot", Target::Lot),
    ("batch", Target::Lot),
    ("serial", Target::Serial),
    ("sn", Target::Serial),
    ("exp", Target::Expiry),
    ("expiry", Target::Expiry),
];

const JSON_ALIASES: &[(&str, Target)] = &[
    ("product_code", Target::Gtin),
    ("productcode", Target::Gtin),
    ("barcode", Target::Gtin),
    ("lot_number", Target::Lot),
    ("lotnumber", Target::Lot),
    ("serial_number", Target::Serial),
    ("serialnumber", Target::Serial),
    ("expiry_date", Target::Expiry),
    ("expiration", Target::Expiry),
    ("expiration_date", Target::Expiry),
    ("best_before", Target::Expiry),
    ("production", Target::Production),
    ("production_date", Target::Production),
    ("mfg", Target::Production),
    ("manufactured", Target::Production),
    ("batch_code", Target::Batch),
];

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

fn target_for(key: &str, aliases: &[&[(&str, Target)]]) -> Option<Target> {
    aliases
        .iter()
        .flat_map(|table| table.iter())
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| *target)
}

/// Store a value for `target`. The first value for a field wins; values that
/// do not parse are kept as `<field>_raw`.
fn apply(id: &mut CanonicalIdentifier, target: Target, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let raw = |id: &mut CanonicalIdentifier, field: &str| {
        id.extra_fields
            .entry(format!("{}_raw", field))
            .or_insert_with(|| value.to_string());
    };
    match target {
        Target::Gtin => match gtin::normalize(value) {
            Some(code) => {
                id.gtin.get_or_insert(code);
            }
            None => raw(id, "gtin"),
        },
        Target::Lot => {
            id.lot_number.get_or_insert_with(|| value.to_string());
        }
        Target::Serial => {
            id.serial_number.get_or_insert_with(|| value.to_string());
        }
        Target::Batch => {
            id.batch_code.get_or_insert_with(|| value.to_string());
        }
        Target::Expiry => match dates::parse_loose(value) {
            Some(date) => {
                id.expiry_date.get_or_insert(date);
            }
            None => raw(id, "expiry_date"),
        },
        Target::Production => match dates::parse_loose(value) {
            Some(date) => {
                id.production_date.get_or_insert(date);
            }
            None => raw(id, "production_date"),
        },
    }
}

/// Parse `input` as a JSON object. `None` when it is not one.
pub fn parse_json_object(input: &str) -> Option<Map<String, Value>> {
    if !input.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Decode fields from a JSON object into `id`. Returns the number of fields found.
pub fn decode_json(map: &Map<String, Value>, id: &mut CanonicalIdentifier) -> usize {
    let mut found = 0;
    for (key, value) in map {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        let key = normalize_key(key);
        match target_for(&key, &[URL_ALIASES, JSON_ALIASES]) {
            Some(target) => {
                apply(id, target, &text);
                found += 1;
            }
            None => {
                id.extra_fields.entry(key).or_insert(text);
            }
        }
    }
    found
}

/// Whether `input` starts with a URL scheme (`https://`, `http://`, ...).
pub fn has_url_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn percent_decode(value: &str) -> String {
    let plus_as_space = value.replace('+', " ");
    urlencoding::decode(&plus_as_space)
        .map(|v| v.into_owned())
        .unwrap_or(plus_as_space)
}

/// Decode fields from a URL into `id`. Returns the number of fields found.
///
/// Understands query parameter aliases and GS1 Digital Link paths
/// (`/01/<gtin>/10/<lot>/21/<serial>`). Unrecognized parameters go to
/// `extra_fields`.
pub fn decode_url(input: &str, id: &mut CanonicalIdentifier) -> usize {
    let without_fragment = input.split('#').next().unwrap_or(input);
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };
    let path = base
        .split_once("://")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, path)| path)
        .unwrap_or("");

    let mut found = 0;

    // Digital Link: AI/value pairs anywhere in the path.
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .collect();
    let mut i = 0;
    while i + 1 < segments.len() {
        match ai_table::lookup(&segments[i]) {
            Some(spec) => {
                gs1::assign(id, spec, &segments[i + 1]);
                found += 1;
                i += 2;
            }
            None => i += 1,
        }
    }

    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = normalize_key(&percent_decode(key));
        let value = percent_decode(value);
        if value.trim().is_empty() {
            continue;
        }
        if let Some(target) = target_for(&key, &[URL_ALIASES]) {
            apply(id, target, &value);
            found += 1;
        } else if let Some(spec) = ai_table::lookup(&key) {
            gs1::assign(id, spec, &value);
            found += 1;
        } else {
            id.extra_fields.entry(key).or_insert(value);
        }
    }
    found
}
