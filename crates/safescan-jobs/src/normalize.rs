//! Image normalization: EXIF orientation, bounded dimensions, PNG re-encode.
//!
//! Re-encoding drops all source metadata (EXIF, GPS, comments).

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use safescan_core::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Content type of normalized copies.
pub const NORMALIZED_CONTENT_TYPE: &str = "image/png";

/// A normalized copy of a source image.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// EXIF orientation that was applied (1 = none).
    pub orientation: u32,
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Read the EXIF orientation tag. Returns 1 (normal) if absent.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation transform.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Dimensions with the longest side bounded by `max_dim`. Never upscales.
pub fn bounded_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max_dim || largest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = max_dim as f64 / largest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_dim);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_dim);
    (w, h)
}

/// Decode, orient, bound, and re-encode an image as PNG.
pub fn normalize_image(bytes: &[u8], max_dim: u32) -> Result<NormalizedImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidInput(format!("unreadable image: {}", e)))?;
    let orientation = read_exif_orientation(bytes);
    let img = apply_orientation(img, orientation);

    let (w, h) = img.dimensions();
    let (new_w, new_h) = bounded_dimensions(w, h, max_dim);
    let img = if (new_w, new_h) != (w, h) {
        debug!(
            from = format!("{w}x{h}"),
            to = format!("{new_w}x{new_h}"),
            "Downscaling oversized image"
        );
        img.resize_exact(new_w, new_h, FilterType::Triangle)
    } else {
        img
    };

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| Error::Internal(format!("PNG encoding failed: {}", e)))?;

    Ok(NormalizedImage {
        png: cursor.into_inner(),
        width: img.width(),
        height: img.height(),
        orientation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn make_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_bounded_dimensions_landscape() {
        assert_eq!(bounded_dimensions(4000, 2000, 2048), (2048, 1024));
    }

    #[test]
    fn test_bounded_dimensions_not_upscaled() {
        assert_eq!(bounded_dimensions(100, 50, 2048), (100, 50));
    }

    #[test]
    fn test_normalize_bounds_longest_side() {
        let normalized = normalize_image(&make_png(300, 150), 100).unwrap();
        assert_eq!((normalized.width, normalized.height), (100, 50));
        assert_eq!(normalized.orientation, 1);
        let decoded = image::load_from_memory(&normalized.png).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_image(b"not an image", 100).is_err());
    }

    #[test]
    fn test_apply_orientation_rotate90() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        let rotated = apply_orientation(img, 6);
        assert_eq!(rotated.dimensions(), (2, 4));
    }

    #[test]
    fn test_apply_orientation_unknown_is_identity() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        assert_eq!(apply_orientation(img, 42).dimensions(), (4, 2));
    }

    #[test]
    fn test_exif_absent_returns_identity() {
        assert_eq!(read_exif_orientation(&make_png(2, 2)), 1);
        assert_eq!(read_exif_orientation(&[]), 1);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
