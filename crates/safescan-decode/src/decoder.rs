//! Payload format detection and dispatch.

use safescan_core::defaults::{DECODE_CONFIDENCE_SYMBOL, DECODE_CONFIDENCE_TEXT, PRODUCT_CODE_LENGTHS};
use safescan_core::{CanonicalIdentifier, DecodeResult, Symbology};
use tracing::debug;

use crate::gs1;
use crate::gtin;
use crate::patterns;
use crate::payload;

/// Which grammar recognized a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Structured,
    Json,
    Url,
    Numeric,
    FreeText,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Structured => "structured",
            PayloadFormat::Json => "json",
            PayloadFormat::Url => "url",
            PayloadFormat::Numeric => "numeric",
            PayloadFormat::FreeText => "free_text",
        }
    }
}

/// Decode a raw scan payload.
///
/// Never fails: a payload without a candidate product code yields
/// `success == false` and `error == Some(MalformedPayload)`, with whatever
/// fields were recognized kept on the identifier.
pub fn decode(payload: &[u8], symbology_hint: Option<&str>) -> DecodeResult {
    decode_str(&String::from_utf8_lossy(payload), symbology_hint)
}

/// [`decode`] for text payloads.
pub fn decode_str(payload: &str, symbology_hint: Option<&str>) -> DecodeResult {
    let hint = symbology_hint.and_then(Symbology::from_hint);
    let trimmed = payload.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let (body, prefix) = gs1::strip_symbology_identifier(trimmed);

    let format = detect(body, prefix.is_some_and(|p| p.gs1));
    let default_symbology = match format {
        PayloadFormat::Structured => Symbology::Gs1128,
        PayloadFormat::Json => Symbology::Json,
        PayloadFormat::Url => Symbology::Url,
        PayloadFormat::Numeric => Symbology::for_numeric_length(body.len()),
        PayloadFormat::FreeText => Symbology::Text,
    };
    let symbology = hint
        .or(prefix.map(|p| p.symbology))
        .unwrap_or(default_symbology);

    let mut id = CanonicalIdentifier::new(payload, symbology);
    let found = match format {
        PayloadFormat::Structured => gs1::parse_element_string(body, &mut id),
        PayloadFormat::Json => payload::parse_json_object(body)
            .map(|map| payload::decode_json(&map, &mut id))
            .unwrap_or(0),
        PayloadFormat::Url => payload::decode_url(body, &mut id),
        PayloadFormat::Numeric => {
            id.gtin = gtin::normalize(body);
            usize::from(id.gtin.is_some())
        }
        PayloadFormat::FreeText => patterns::extract_fields(body, &mut id),
    };

    let confidence = match (format, found) {
        (_, 0) => 0.0,
        (PayloadFormat::FreeText, _) => DECODE_CONFIDENCE_TEXT,
        _ => DECODE_CONFIDENCE_SYMBOL,
    };

    let result = if id.gtin.is_some() {
        DecodeResult::succeeded(id, confidence)
    } else {
        DecodeResult::malformed(id, confidence)
    };

    debug!(
        subsystem = "decode",
        op = "decode",
        format = format.as_str(),
        symbology = result.identifier.symbology.as_str(),
        fields = found,
        success = result.success,
        confidence = result.confidence,
        "Decoded payload"
    );
    result
}

/// Decode text through the free-text path only (used for OCR output).
pub fn decode_text(text: &str) -> DecodeResult {
    let mut id = CanonicalIdentifier::new(text, Symbology::Text);
    let found = patterns::extract_fields(text, &mut id);
    let confidence = if found == 0 { 0.0 } else { DECODE_CONFIDENCE_TEXT };
    if id.gtin.is_some() {
        DecodeResult::succeeded(id, confidence)
    } else {
        DecodeResult::malformed(id, confidence)
    }
}

/// Pick the grammar for `body`. First match wins, except that an all-digit
/// payload of a product-code length is always a bare product code.
pub fn detect(body: &str, gs1_prefix: bool) -> PayloadFormat {
    if is_bare_product_code(body) {
        PayloadFormat::Numeric
    } else if gs1_prefix || gs1::looks_structured(body) {
        PayloadFormat::Structured
    } else if payload::parse_json_object(body).is_some() {
        PayloadFormat::Json
    } else if payload::has_url_scheme(body) {
        PayloadFormat::Url
    } else {
        PayloadFormat::FreeText
    }
}

fn is_bare_product_code(body: &str) -> bool {
    PRODUCT_CODE_LENGTHS.contains(&body.len()) && body.bytes().all(|b| b.is_ascii_digit())
}
