//! GTIN normalization and GS1 check digits.

use safescan_core::defaults::GTIN_LENGTH;

/// Normalize a product code to a 14-digit GTIN.
///
/// Accepts 1 to 14 ASCII digits (surrounding whitespace ignored) and pads on
/// the left with zeros. Anything else is `None`. Idempotent.
pub fn normalize(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || code.len() > GTIN_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>width$}", code, width = GTIN_LENGTH))
}

/// GS1 mod-10 check digit for `body` (all digits except the check digit).
pub fn compute_check_digit(body: &str) -> Option<u32> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sum: u32 = body
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit * 3
            } else {
                digit
            }
        })
        .sum();
    Some((10 - sum % 10) % 10)
}

/// Whether the last digit of `code` is a valid GS1 check digit.
pub fn check_digit_valid(code: &str) -> bool {
    if code.len() < 2 {
        return false;
    }
    let (body, check) = code.split_at(code.len() - 1);
    match (compute_check_digit(body), check.parse::<u32>()) {
        (Some(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}

/// `code` without leading zeros (`"0"` if it is all zeros).
pub fn strip_leading_zeros(code: &str) -> &str {
    let stripped = code.trim_start_matches('0');
    if stripped.is_empty() && !code.is_empty() {
        &code[code.len() - 1..]
    } else {
        stripped
    }
}

/// Forms under which a product code may be stored by other sources.
///
/// The 14-digit GTIN, its 13/12/8-digit widths when only zeros are dropped,
/// and the zero-stripped form. Deduplicated, widest first.
pub fn variants(code: &str) -> Vec<String> {
    let Some(gtin) = normalize(code) else {
        return vec![code.trim().to_string()];
    };
    let mut out = vec![gtin.clone()];
    for width in [13, 12, 8] {
        let (dropped, kept) = gtin.split_at(GTIN_LENGTH - width);
        if dropped.bytes().all(|b| b == b'0') {
            out.push(kept.to_string());
        }
    }
    out.push(strip_leading_zeros(&gtin).to_string());
    let mut seen = std::collections::HashSet::new();
    out.retain(|v| seen.insert(v.clone()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pads_to_fourteen() {
        assert_eq!(normalize("012345678905").as_deref(), Some("00012345678905"));
        assert_eq!(normalize("96385074").as_deref(), Some("00000096385074"));
        assert_eq!(normalize(" 4006381333931 ").as_deref(), Some("04006381333931"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("12345").unwrap();
        assert_eq!(normalize(&once).unwrap(), once);
    }

    #[test]
    fn test_normalize_rejects_non_numeric_and_long() {
        assert_eq!(normalize("12AB"), None);
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("123456789012345"), None);
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(compute_check_digit("0001234567890"), Some(5));
        assert!(check_digit_valid("00012345678905"));
        assert!(check_digit_valid("4006381333931"));
        assert!(check_digit_valid("96385074"));
        assert!(!check_digit_valid("00012345678904"));
        assert!(!check_digit_valid("7"));
    }

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros("00012345678905"), "12345678905");
        assert_eq!(strip_leading_zeros("0000"), "0");
        assert_eq!(strip_leading_zeros("123"), "123");
    }

    #[test]
    fn test_variants_cover_common_widths() {
        let v = variants("012345678905");
        assert_eq!(
            v,
            vec![
                "00012345678905".to_string(),
                "0012345678905".to_string(),
                "012345678905".to_string(),
                "12345678905".to_string(),
            ]
        );
    }

    #[test]
    fn test_variants_include_ean8_width() {
        let v = variants("96385074");
        assert!(v.contains(&"96385074".to_string()));
        assert!(v.contains(&"00000096385074".to_string()));
    }

    #[test]
    fn test_variants_non_numeric_passthrough() {
        assert_eq!(variants("SKU-1"), vec!["SKU-1".to_string()]);
    }
}
