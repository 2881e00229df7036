//! # safescan-decode
//!
//! Identifier decoding and confidence scoring.
//!
//! [`decode`] turns a raw scan payload (GS1 element string, JSON object, URL,
//! bare numeric code, or free text) into a [`DecodeResult`]. It is pure and
//! synchronous, so request handlers can call it directly without the job
//! pipeline. [`score`] folds decoder and OCR confidence with field
//! completeness into a [`ConfidenceLevel`].
//!
//! [`DecodeResult`]: safescan_core::DecodeResult
//! [`ConfidenceLevel`]: safescan_core::ConfidenceLevel

pub mod ai_table;
pub mod confidence;
pub mod dates;
pub mod decoder;
pub mod gs1;
pub mod gtin;
pub mod patterns;
pub mod payload;

pub use confidence::{completeness, level_for, score, score_with};
pub use decoder::{decode, decode_str, decode_text, detect, PayloadFormat};
pub use patterns::{label_attributes, LabelAttributes};
