//! Binary instance masks
//!
//! Labelbox serves each instance mask as a PNG where foreground pixels carry a
//! non-zero value in the first channel. This module turns such bytes (or a raw
//! single-band buffer) into a boolean grid the contour tracer can walk.

use crate::error::{ConvertError, Result};

/// Row-major foreground/background grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl BinaryMask {
    /// Build a mask from single-band values; any positive value is foreground
    pub fn from_values(width: usize, height: usize, values: &[u8]) -> Result<Self> {
        Self::from_bools(width, height, values.iter().map(|&v| v > 0).collect())
    }

    pub fn from_bools(width: usize, height: usize, data: Vec<bool>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::InvalidMask(format!(
                "degenerate dimensions {}x{}",
                width, height
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            ConvertError::InvalidMask(format!("dimensions {}x{} overflow", width, height))
        })?;
        if data.len() != expected {
            return Err(ConvertError::InvalidMask(format!(
                "expected {} values for a {}x{} mask, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and keep its first channel
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| ConvertError::InvalidMask(format!("failed to decode mask: {}", e)))?;

        // 16-bit conversion keeps low 16-bit values and scales 8-bit ones, so
        // "positive" survives for every source depth.
        let band = image.to_rgba16();
        let (width, height) = band.dimensions();
        let data = band.pixels().map(|p| p.0[0] > 0).collect();
        Self::from_bools(width as usize, height as usize, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Foreground test; coordinates outside the grid are background
    pub fn get(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_from_values_thresholds_positive() {
        let mask = BinaryMask::from_values(3, 1, &[0, 1, 255]).unwrap();
        assert_eq!(mask.data(), &[false, true, true]);
        assert_eq!(mask.foreground_count(), 2);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            BinaryMask::from_values(0, 4, &[]),
            Err(ConvertError::InvalidMask(_))
        ));
        assert!(matches!(
            BinaryMask::from_values(4, 0, &[]),
            Err(ConvertError::InvalidMask(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            BinaryMask::from_values(2, 2, &[1, 1, 1]),
            Err(ConvertError::InvalidMask(_))
        ));
    }

    #[test]
    fn test_get_outside_is_background() {
        let mask = BinaryMask::from_values(1, 1, &[1]).unwrap();
        assert!(mask.get(0, 0));
        assert!(!mask.get(-1, 0));
        assert!(!mask.get(0, 1));
    }

    #[test]
    fn test_decode_grayscale_png() {
        let gray = GrayImage::from_fn(4, 3, |x, y| if x == 1 && y == 2 { Luma([1]) } else { Luma([0]) });
        let mask = BinaryMask::decode(&encode_png(DynamicImage::ImageLuma8(gray))).unwrap();
        assert_eq!((mask.width(), mask.height()), (4, 3));
        assert_eq!(mask.foreground_count(), 1);
        assert!(mask.get(1, 2));
    }

    #[test]
    fn test_decode_uses_first_channel() {
        let rgba = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 255, 255, 255])
            }
        });
        let mask = BinaryMask::decode(&encode_png(DynamicImage::ImageRgba8(rgba))).unwrap();
        assert_eq!(mask.data(), &[true, false]);
    }

    #[test]
    fn test_decode_garbage_is_invalid_mask() {
        assert!(matches!(
            BinaryMask::decode(b"not an image"),
            Err(ConvertError::InvalidMask(_))
        ));
    }
}
