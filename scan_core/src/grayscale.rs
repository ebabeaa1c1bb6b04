/*!
Grayscale reduction.

Intensity = arithmetic mean of the red, green and blue components,
truncated toward zero. Alpha is ignored.
*/

use crate::frame::Frame;

/// Single-channel brightness map, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityMap {
    pub width: usize,
    pub height: usize,
    values: Vec<u8>,
}

impl IntensityMap {
    /// Wrap raw intensity values; `None` if the length does not match
    pub fn from_values(width: usize, height: usize, values: Vec<u8>) -> Option<Self> {
        (values.len() == width * height).then_some(Self { width, height, values })
    }

    /// All values, row-major
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// One row of intensities
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        Some(&self.values[y * self.width..(y + 1) * self.width])
    }

    /// Check if the map has no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reduce a color frame to intensities of identical geometry
pub fn reduce(frame: &Frame) -> IntensityMap {
    let bpp = frame.format.bytes_per_pixel();
    let values = frame
        .data()
        .chunks_exact(bpp)
        .map(|px| mean_rgb(px[0], px[1], px[2]))
        .collect();

    IntensityMap {
        width: frame.width,
        height: frame.height,
        values,
    }
}

#[inline]
fn mean_rgb(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}
