//! QR code generation for box labels.
//!
//! A label encodes the absolute URL of the box page so that any phone camera
//! app can open it, not just the built-in scanner. Encoding is deterministic,
//! so images are rendered per request instead of being stored.

use std::io::Cursor;

use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

use garage_core::BoxId;

/// Pixel size of one QR module.
const MODULE_PIXELS: u32 = 10;

/// QR generation errors.
#[derive(Debug, Error)]
pub enum QrError {
    /// Box IDs start at 1.
    #[error("invalid box identifier: {0}")]
    InvalidIdentifier(BoxId),

    /// The payload could not be encoded.
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    /// PNG serialization failed.
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Canonical URL of a box page, `<base>/box/<id>`.
#[must_use]
pub fn canonical_url(base_url: &str, box_id: BoxId) -> String {
    format!("{}/box/{box_id}", base_url.trim_end_matches('/'))
}

/// Encodes box URLs below a fixed base URL.
#[derive(Debug, Clone, Copy)]
pub struct QrEncoder<'a> {
    base_url: &'a str,
}

impl<'a> QrEncoder<'a> {
    #[must_use]
    pub const fn new(base_url: &'a str) -> Self {
        Self { base_url }
    }

    /// URL encoded for `box_id`.
    #[must_use]
    pub fn url_for(&self, box_id: BoxId) -> String {
        canonical_url(self.base_url, box_id)
    }

    /// Render the label for `box_id` as PNG bytes.
    ///
    /// Low error correction, 10 px modules, standard quiet zone, black on
    /// white.
    ///
    /// # Errors
    ///
    /// Returns `QrError::InvalidIdentifier` for IDs below 1.
    pub fn encode(&self, box_id: BoxId) -> Result<Vec<u8>, QrError> {
        if !box_id.is_valid() {
            return Err(QrError::InvalidIdentifier(box_id));
        }

        let url = self.url_for(box_id);
        let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)?;
        let image = code
            .render::<Luma<u8>>()
            .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
            .quiet_zone(true)
            .dark_color(Luma([0]))
            .light_color(Luma([255]))
            .build();

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation)]
    fn decode(png: &[u8]) -> String {
        let img = image::load_from_memory(png).unwrap().to_luma8();
        let (width, height) = img.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| img.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn test_canonical_url_trims_trailing_slash() {
        assert_eq!(
            canonical_url("https://garage.example.com/", BoxId::new(42)),
            "https://garage.example.com/box/42"
        );
        assert_eq!(
            canonical_url("http://localhost:5000", BoxId::new(1)),
            "http://localhost:5000/box/1"
        );
    }

    #[test]
    fn test_encode_decodes_to_canonical_url() {
        let encoder = QrEncoder::new("http://localhost:5000");
        let png = encoder.encode(BoxId::new(42)).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        assert_eq!(decode(&png), "http://localhost:5000/box/42");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = QrEncoder::new("https://garage.example.com");
        let first = encoder.encode(BoxId::new(7)).unwrap();
        let second = encoder.encode(BoxId::new(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_module_size() {
        let png = QrEncoder::new("http://localhost:5000")
            .encode(BoxId::new(1))
            .unwrap();
        let img = image::load_from_memory(&png).unwrap();
        // Version 1 is 21 modules, plus a 4-module quiet zone on each side
        assert_eq!(img.width() % MODULE_PIXELS, 0);
        assert!(img.width() >= (21 + 8) * MODULE_PIXELS);
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn test_rejects_invalid_identifier() {
        let encoder = QrEncoder::new("http://localhost:5000");
        assert!(matches!(
            encoder.encode(BoxId::new(0)),
            Err(QrError::InvalidIdentifier(_))
        ));
        assert!(encoder.encode(BoxId::new(-5)).is_err());
    }
}
