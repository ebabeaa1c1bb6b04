/*!
Fixed-threshold binarization.

Samples darker than the threshold become bars (0), everything else becomes
space (1).
*/

use crate::grayscale::IntensityMap;

/// Dark sample
pub const BAR: u8 = 0;

/// Light sample
pub const SPACE: u8 = 1;

/// Two-level signal, row-major, values in {0, 1}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySignal {
    pub width: usize,
    pub height: usize,
    bits: Vec<u8>,
}

impl BinarySignal {
    /// Build a signal from explicit rows; `None` on ragged rows or values outside {0, 1}
    pub fn from_rows(rows: &[Vec<u8>]) -> Option<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width || r.iter().any(|&v| v > SPACE)) {
            return None;
        }

        Some(Self {
            width,
            height: rows.len(),
            bits: rows.concat(),
        })
    }

    /// One scan line
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        Some(&self.bits[y * self.width..(y + 1) * self.width])
    }

    /// Default scan line: the vertical middle
    pub fn middle_row(&self) -> usize {
        self.height / 2
    }
}

/// Binarize an intensity map against a brightness cutoff
pub fn binarize(map: &IntensityMap, threshold: u8) -> BinarySignal {
    let bits = map
        .values()
        .iter()
        .map(|&v| if v < threshold { BAR } else { SPACE })
        .collect();

    BinarySignal {
        width: map.width,
        height: map.height,
        bits,
    }
}
