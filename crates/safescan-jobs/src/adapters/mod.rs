//! Concrete boundary implementations.

pub mod http;

pub use http::{HttpLabelBackend, HttpOcrBackend, HttpServiceConfig, HttpSymbolReader};
