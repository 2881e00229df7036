//! GS1 element string parsing (application-identifier format).
//!
//! Handles the human-readable parenthesized form `(01)...(17)...`, raw
//! FNC1/GS-separated data as emitted by scanners, and AIM symbology
//! identifier prefixes.

use safescan_core::{CanonicalIdentifier, Symbology};
use tracing::trace;

use crate::ai_table::{self, AiLength, AiSpec, AiValueType};
use crate::dates;
use crate::gtin;

/// AIM symbology identifiers that announce GS1 data.
const GS1_SYMBOLOGY_IDS: &[(&str, Symbology)] = &[
    ("]C1", Symbology::Gs1128),
    ("]d2", Symbology::Gs1DataMatrix),
    ("]Q3", Symbology::QrCode),
    ("]e0", Symbology::DataBar),
];

/// AIM symbology identifiers for non-GS1 symbols.
const PLAIN_SYMBOLOGY_IDS: &[(&str, Symbology)] = &[
    ("]E0", Symbology::Ean13),
    ("]E4", Symbology::Ean8),
    ("]I1", Symbology::Itf14),
    ("]C0", Symbology::Code128),
    ("]d1", Symbology::DataMatrix),
    ("]Q1", Symbology::QrCode),
];

/// A stripped symbology identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbologyPrefix {
    pub symbology: Symbology,
    /// The prefix announces GS1 element string data.
    pub gs1: bool,
}

/// Remove a leading AIM symbology identifier (`]C1`, `]d2`, ...).
pub fn strip_symbology_identifier(input: &str) -> (&str, Option<SymbologyPrefix>) {
    for (ids, gs1) in [(GS1_SYMBOLOGY_IDS, true), (PLAIN_SYMBOLOGY_IDS, false)] {
        for (prefix, symbology) in ids {
            if let Some(rest) = input.strip_prefix(prefix) {
                let symbology = *symbology;
                return (rest, Some(SymbologyPrefix { symbology, gs1 }));
            }
        }
    }
    (input, None)
}

/// Control characters (GS/FNC1) and whitespace separate fields.
pub(crate) fn is_separator(c: char) -> bool {
    c.is_control() || c.is_whitespace()
}

/// A `(\d{2,4})` token at the start of `input`: the code and chars consumed.
fn paren_ai(input: &[char]) -> Option<(String, usize)> {
    if input.first() != Some(&'(') {
        return None;
    }
    let digits: String = input[1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let close = 1 + digits.len();
    if (2..=4).contains(&digits.len()) && input.get(close) == Some(&')') {
        Some((digits, close + 1))
    } else {
        None
    }
}

/// Whether `input` is in application-identifier format.
///
/// True for a leading separator control character, a leading parenthesized
/// known AI, or a leading two-digit known AI whose value is present.
pub fn looks_structured(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    let Some(&first) = chars.first() else {
        return false;
    };
    if first.is_control() {
        return true;
    }
    if let Some((code, _)) = paren_ai(&chars) {
        return ai_table::lookup(&code).is_some();
    }
    if chars.iter().any(|c| c.is_whitespace()) || chars.len() < 3 {
        return false;
    }
    let code: String = chars[..2].iter().collect();
    match ai_table::lookup(&code).map(|spec| spec.length) {
        Some(AiLength::Fixed(n)) => {
            chars.len() >= 2 + n && !chars[2..2 + n].iter().any(|c| is_separator(*c))
        }
        Some(AiLength::Variable(_)) => !is_separator(chars[2]),
        None => false,
    }
}

/// Read a value starting at `pos`, stopping at a separator, at a
/// parenthesized AI, or after `max` characters.
fn read_value(chars: &[char], mut pos: usize, max: usize) -> (String, usize) {
    let mut value = String::new();
    while pos < chars.len() && value.chars().count() < max {
        let c = chars[pos];
        if is_separator(c) || paren_ai(&chars[pos..]).is_some() {
            break;
        }
        value.push(c);
        pos += 1;
    }
    (value, pos)
}

/// Parse an element string into `id`. Returns the number of AIs recognized.
///
/// Unknown characters are skipped one at a time. A fixed-length value cut
/// short by a separator or the end of input is kept as `<field>_raw`.
pub fn parse_element_string(input: &str, id: &mut CanonicalIdentifier) -> usize {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut recognized = 0;

    while pos < chars.len() {
        if is_separator(chars[pos]) {
            pos += 1;
            continue;
        }

        let (spec, code, after_code) = if let Some((code, used)) = paren_ai(&chars[pos..]) {
            (ai_table::lookup(&code), code, pos + used)
        } else if let Some(spec) = ai_table::match_prefix(&chars[pos..]) {
            (Some(spec), spec.code.to_string(), pos + spec.code.len())
        } else {
            pos += 1;
            continue;
        };

        let mut value_start = after_code;
        while value_start < chars.len() && chars[value_start] == ' ' {
            value_start += 1;
        }

        let Some(spec) = spec else {
            // Parenthesized but unknown: keep it rather than lose data.
            let (value, next) = read_value(&chars, value_start, 90);
            if !value.is_empty() {
                id.extra_fields
                    .entry(format!("ai_{}", code))
                    .or_insert(value);
            }
            pos = next.max(after_code);
            continue;
        };

        let (value, next) = match spec.length {
            AiLength::Fixed(n) | AiLength::Variable(n) => read_value(&chars, value_start, n),
        };
        trace!(subsystem = "decode", ai = spec.code, value = %value, "AI element");

        let complete = match spec.length {
            AiLength::Fixed(n) => value.chars().count() == n,
            AiLength::Variable(_) => !value.is_empty(),
        };
        if complete {
            assign(id, spec, &value);
            recognized += 1;
        } else if !value.is_empty() {
            id.extra_fields
                .entry(format!("{}_raw", spec.field))
                .or_insert(value);
        }
        pos = next.max(after_code);
    }

    recognized
}

/// Store one AI value on the identifier. The first occurrence of a field wins.
pub(crate) fn assign(id: &mut CanonicalIdentifier, spec: &AiSpec, value: &str) {
    let value = value.trim();
    let raw_key = || format!("{}_raw", spec.field);
    match spec.code {
        "01" => match gtin::normalize(value) {
            Some(code) if id.gtin.is_none() => id.gtin = Some(code),
            Some(_) => {}
            None => {
                id.extra_fields.entry(raw_key()).or_insert(value.to_string());
            }
        },
        "10" => {
            id.lot_number.get_or_insert_with(|| value.to_string());
        }
        "21" => {
            id.serial_number.get_or_insert_with(|| value.to_string());
        }
        "17" | "11" => {
            let slot = if spec.code == "17" {
                &mut id.expiry_date
            } else {
                &mut id.production_date
            };
            match dates::parse_yymmdd(value) {
                Some(date) => {
                    slot.get_or_insert(date);
                }
                None => {
                    id.extra_fields.entry(raw_key()).or_insert(value.to_string());
                }
            }
        }
        _ => {
            let parsed = match spec.value_type {
                AiValueType::Date => {
                    dates::parse_yymmdd(value).map(|d| d.format("%Y-%m-%d").to_string())
                }
                AiValueType::Decimal(places) => format_decimal(value, places),
                AiValueType::Numeric => value
                    .bytes()
                    .all(|b| b.is_ascii_digit())
                    .then(|| value.to_string()),
                AiValueType::Alphanumeric => Some(value.to_string()),
            };
            let (key, stored) = match parsed {
                Some(v) => (spec.field.to_string(), v),
                None => (raw_key(), value.to_string()),
            };
            id.extra_fields.entry(key).or_insert(stored);
        }
    }
}

/// Insert the implied decimal point: `("001250", 3)` is `"1.250"`.
fn format_decimal(value: &str, places: u8) -> Option<String> {
    let places = usize::from(places);
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) || places > value.len() {
        return None;
    }
    let (int_part, frac_part) = value.split_at(value.len() - places);
    let int_part = gtin::strip_leading_zeros(if int_part.is_empty() { "0" } else { int_part });
    if frac_part.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{}.{}", int_part, frac_part))
    }
}
