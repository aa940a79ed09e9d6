//! Snowflake image loading.
//!
//! The flake texture arrives asynchronously: [`SnowflakeImage::load`] runs on
//! a worker thread and its result is delivered to the event loop, which
//! uploads it and lets the render loop start drawing. When no file is given,
//! or it fails to decode, a soft procedural flake is used instead.
//!
//! # Supported Formats
//!
//! - BMP
//! - PNG (recommended)
//! - JPEG

use std::path::Path;

use crate::error::TextureError;

/// Decoded RGBA8 pixels ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowflakeImage {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SnowflakeImage {
    /// Wrap raw RGBA data.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // 1x2 white over black
    /// let img = SnowflakeImage::from_rgba(vec![255, 255, 255, 255, 0, 0, 0, 255], 1, 2)?;
    /// ```
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }
        let expected = rgba_len(width, height);
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an image file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|source| TextureError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .into_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Decode an in-memory image (format guessed from its header).
    pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)
            .map_err(|source| TextureError::Decode {
                path: "<memory>".into(),
                source,
            })?
            .into_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Check both sides against a device's `max_texture_dimension_2d`.
    pub fn fits_within(&self, max: u32) -> Result<(), TextureError> {
        if self.width > max || self.height > max {
            return Err(TextureError::TooLarge {
                width: self.width,
                height: self.height,
                max,
            });
        }
        Ok(())
    }

    /// A white flake that fades out radially, `size` x `size` pixels.
    ///
    /// With additive blending, transparent texels must also be black, so
    /// the colour channels fade together with alpha.
    pub fn soft_flake(size: u32) -> Self {
        let size = size.max(1);
        let mut data = Vec::with_capacity(rgba_len(size, size));
        let center = (size as f32 - 1.0) / 2.0;
        let radius = (size as f32 / 2.0).max(0.5);
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 - center) / radius;
                let dy = (y as f32 - center) / radius;
                let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
                let v = (falloff * falloff * 255.0).round() as u8;
                data.extend_from_slice(&[v, v, v, v]);
            }
        }
        Self {
            data,
            width: size,
            height: size,
        }
    }
}

/// Byte length of a `width` x `height` RGBA8 image, computed in `usize`.
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_size_checked() {
        let err = SnowflakeImage::from_rgba(vec![0; 12], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            TextureError::SizeMismatch {
                expected: 16,
                actual: 12,
                ..
            }
        ));
        assert!(matches!(
            SnowflakeImage::from_rgba(Vec::new(), 0, 4),
            Err(TextureError::Empty)
        ));
    }

    #[test]
    fn test_soft_flake_bright_center_dark_corner() {
        let img = SnowflakeImage::soft_flake(33);
        assert_eq!(img.data.len(), 33 * 33 * 4);
        let at = |x: u32, y: u32| img.data[((y * 33 + x) * 4) as usize];
        assert_eq!(at(16, 16), 255);
        assert_eq!(at(0, 0), 0);
    }

    #[test]
    fn test_fits_within_device_limit() {
        let wide = SnowflakeImage::from_rgba(vec![0; 9000 * 16 * 4], 9000, 16).unwrap();
        assert!(matches!(
            wide.fits_within(8192),
            Err(TextureError::TooLarge {
                width: 9000,
                height: 16,
                max: 8192
            })
        ));
        assert!(wide.fits_within(9000).is_ok());
        assert!(SnowflakeImage::soft_flake(64).fits_within(64).is_ok());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgba_len_past_u32() {
        assert_eq!(rgba_len(40_000, 40_000), 6_400_000_000);
        assert_eq!(rgba_len(3, 2), 24);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SnowflakeImage::decode(b"not an image"),
            Err(TextureError::Decode { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(SnowflakeImage::load("definitely/not/here.bmp").is_err());
    }
}
