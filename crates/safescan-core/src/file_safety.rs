//! Integrity check for submitted images.
//!
//! Untrusted uploads are rejected before any decoding happens:
//! 1. Empty or oversized input
//! 2. Magic byte detection for executables and scripts
//! 3. Content sniffing via `infer`; only known image formats pass

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Magic byte signatures for executable content
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),           // MZ header
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),         // Linux ELF
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),   // macOS 32-bit
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),   // macOS 64-bit
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),  // Universal binary (also Java)
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]), // WASM
    ("Shell script", b"#!"),
];

/// Image MIME types accepted by the pipeline
static ALLOWED_IMAGE_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/bmp",
        "image/tiff",
        "image/heif",
        "image/avif",
    ]
    .into_iter()
    .collect()
});

/// Result of the integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub allowed: bool,
    pub block_reason: Option<String>,
    pub detected_type: Option<String>,
}

impl IntegrityReport {
    pub fn allowed(detected: impl Into<String>) -> Self {
        Self {
            allowed: true,
            block_reason: None,
            detected_type: Some(detected.into()),
        }
    }

    pub fn blocked(reason: impl Into<String>, detected: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
            detected_type: Some(detected.into()),
        }
    }
}

/// Validate an uploaded image.
pub fn check_integrity(data: &[u8], max_size_bytes: usize) -> IntegrityReport {
    if data.is_empty() {
        return IntegrityReport::blocked("Image is empty", "empty");
    }

    if data.len() > max_size_bytes {
        return IntegrityReport::blocked(
            format!("Image exceeds maximum size of {} bytes", max_size_bytes),
            "oversized",
        );
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if data.starts_with(magic) {
            return IntegrityReport::blocked(
                format!("Executable content detected: {}", name),
                format!("executable:{}", name.to_lowercase().replace(' ', "_")),
            );
        }
    }

    match detect_image_type(data) {
        Some(mime) => IntegrityReport::allowed(mime),
        None => {
            let detected = infer::get(data)
                .map(|kind| kind.mime_type().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            IntegrityReport::blocked(
                format!("Content is not a supported image ({})", detected),
                detected,
            )
        }
    }
}

/// Detect an accepted image MIME type from magic bytes.
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .filter(|mime| ALLOWED_IMAGE_TYPES.contains(mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_png_allowed() {
        let report = check_integrity(PNG_HEADER, 1024);
        assert!(report.allowed);
        assert_eq!(report.detected_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_jpeg_allowed() {
        let report = check_integrity(JPEG_HEADER, 1024);
        assert!(report.allowed);
        assert_eq!(report.detected_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_empty_blocked() {
        let report = check_integrity(&[], 1024);
        assert!(!report.allowed);
        assert_eq!(report.detected_type.as_deref(), Some("empty"));
    }

    #[test]
    fn test_oversized_blocked() {
        let report = check_integrity(PNG_HEADER, 4);
        assert!(!report.allowed);
        assert!(report.block_reason.unwrap().contains("maximum size"));
    }

    #[test]
    fn test_pe_executable_blocked() {
        let data = [0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00];
        let report = check_integrity(&data, 1024);
        assert!(!report.allowed);
        assert_eq!(
            report.detected_type.as_deref(),
            Some("executable:windows_pe/mz")
        );
    }

    #[test]
    fn test_elf_blocked() {
        let data = [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01];
        assert!(!check_integrity(&data, 1024).allowed);
    }

    #[test]
    fn test_shell_script_blocked() {
        let report = check_integrity(b"#!/bin/sh\nrm -rf /", 1024);
        assert!(!report.allowed);
        assert_eq!(
            report.detected_type.as_deref(),
            Some("executable:shell_script")
        );
    }

    #[test]
    fn test_non_image_blocked() {
        let report = check_integrity(b"just some plain text", 1024);
        assert!(!report.allowed);
        assert_eq!(report.detected_type.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_pdf_blocked_as_non_image() {
        let report = check_integrity(b"%PDF-1.7\n%\xE2\xE3", 1024);
        assert!(!report.allowed);
        assert_eq!(report.detected_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(PNG_HEADER), Some("image/png"));
        assert_eq!(detect_image_type(b"hello"), None);
    }
}
