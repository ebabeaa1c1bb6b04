/*!
Frame data structures.

A [`Frame`] is one captured color image. It is produced once per capture
tick, handed to the decode pipeline and then dropped. Image files are
read and written through the `image` crate. Pixel storage is a
[`Bytes`] buffer so frames move between the capture thread and the session
without copying.
*/

use crate::error::{CoreError, Result};
use bytes::Bytes;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Channel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 3 bytes per pixel: red, green, blue
    Rgb8,
    /// 4 bytes per pixel: red, green, blue, alpha (alpha is ignored)
    Rgba8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Captured color frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: u64,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    data: Bytes,
}

impl Frame {
    /// Create a frame, validating the buffer length against the geometry
    pub fn new(
        frame_id: u64,
        width: usize,
        height: usize,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let data = data.into();
        let expected = buffer_len(width, height, format).ok_or_else(|| {
            CoreError::invalid_frame(format!("{}x{} {:?} frame is too large", width, height, format))
        })?;
        if data.len() != expected {
            return Err(CoreError::invalid_frame(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            frame_id,
            width,
            height,
            format,
            data,
        })
    }

    /// Create an RGB frame
    pub fn from_rgb(frame_id: u64, width: usize, height: usize, data: impl Into<Bytes>) -> Result<Self> {
        Self::new(frame_id, width, height, PixelFormat::Rgb8, data)
    }

    /// Create an RGBA frame (canvas layout)
    pub fn from_rgba(frame_id: u64, width: usize, height: usize, data: impl Into<Bytes>) -> Result<Self> {
        Self::new(frame_id, width, height, PixelFormat::Rgba8, data)
    }

    /// Uniform gray RGB frame
    pub fn blank(frame_id: u64, width: usize, height: usize, level: u8) -> Self {
        Self {
            frame_id,
            width,
            height,
            format: PixelFormat::Rgb8,
            data: Bytes::from(vec![level; width * height * 3]),
        }
    }

    /// Raw pixel buffer
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Red, green and blue components of the pixel at (x, y)
    pub fn rgb(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = (y * self.width + x) * bpp;
        let px = &self.data[offset..offset + 3];
        Some((px[0], px[1], px[2]))
    }

    /// Load a frame from an image file (PNG, JPEG, PPM, ...)
    pub fn from_file<P: AsRef<Path>>(frame_id: u64, path: P) -> Result<Self> {
        let image = image::open(path.as_ref())?;
        Self::from_image(frame_id, image.to_rgb8())
    }

    /// Take ownership of a decoded RGB image
    pub fn from_image(frame_id: u64, image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::from_rgb(frame_id, width as usize, height as usize, image.into_raw())
    }

    /// Copy the frame into an RGB image, dropping alpha
    pub fn to_image(&self) -> Result<RgbImage> {
        let width = u32::try_from(self.width)
            .map_err(|_| CoreError::invalid_frame(format!("width {} is too large", self.width)))?;
        let height = u32::try_from(self.height)
            .map_err(|_| CoreError::invalid_frame(format!("height {} is too large", self.height)))?;

        let raw = match self.format {
            PixelFormat::Rgb8 => self.data.to_vec(),
            PixelFormat::Rgba8 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| px[..3].iter().copied())
                .collect(),
        };

        RgbImage::from_raw(width, height, raw)
            .ok_or_else(|| CoreError::invalid_frame("pixel buffer does not match geometry"))
    }

    /// Write the frame to an image file; the format follows the extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?.save(path.as_ref())?;
        Ok(())
    }
}

/// Buffer length for the geometry, `None` on overflow
fn buffer_len(width: usize, height: usize, format: PixelFormat) -> Option<usize> {
    width.checked_mul(height)?.checked_mul(format.bytes_per_pixel())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_length_validation() {
        assert!(Frame::from_rgb(1, 2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgba(1, 2, 2, vec![0u8; 16]).is_ok());

        let err = Frame::from_rgb(1, 2, 2, vec![0u8; 11]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame(_)));
    }

    #[test]
    fn test_pixel_access_ignores_alpha() {
        let frame = Frame::from_rgba(0, 2, 1, vec![1, 2, 3, 255, 4, 5, 6, 0]).unwrap();
        assert_eq!(frame.rgb(0, 0), Some((1, 2, 3)));
        assert_eq!(frame.rgb(1, 0), Some((4, 5, 6)));
        assert_eq!(frame.rgb(2, 0), None);
    }

    #[test]
    fn test_oversized_geometry_is_rejected() {
        let err = Frame::from_rgb(0, usize::MAX, 2, vec![0u8; 3]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame(_)));

        let err = Frame::from_rgba(0, usize::MAX / 2, 3, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame(_)));
    }

    #[test]
    fn test_malformed_ppm_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.ppm");
        std::fs::write(&path, b"P6\n18446744073709551615 2\n255\n\x00").unwrap();

        assert!(Frame::from_file(0, &path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Frame::from_file(0, "/nonexistent/frame.png").unwrap_err();
        assert!(matches!(err, CoreError::Image(_)));
    }

    #[test]
    fn test_rgba_to_image_drops_alpha() {
        let frame = Frame::from_rgba(0, 2, 1, vec![1, 2, 3, 255, 4, 5, 6, 0]).unwrap();
        let image = frame.to_image().unwrap();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.into_raw(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::from_rgb(0, 2, 1, vec![10, 20, 30, 40, 50, 60]).unwrap();

        let path = dir.path().join("frame.png");
        frame.save(&path).unwrap();

        let loaded = Frame::from_file(3, &path).unwrap();
        assert_eq!(loaded.frame_id, 3);
        assert_eq!((loaded.width, loaded.height), (2, 1));
        assert_eq!(loaded.rgb(1, 0), Some((40, 50, 60)));
    }
}
