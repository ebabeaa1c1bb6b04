/*!
# Scan Core

Frame-to-code decoding pipeline shared by the scanner components.

## Core Types

- [`Frame`] - Captured color frame (RGB or RGBA)
- [`IntensityMap`] - Single-channel brightness derived from a frame
- [`BinarySignal`] - Two-level bar/space signal
- [`RunSequence`] - Run lengths along one scan line
- [`DecodePipeline`] - All four stages bundled with their settings

## Modules

- [`grayscale`] - Color to intensity reduction
- [`threshold`] - Fixed-threshold binarization
- [`runs`] - Run-length extraction
- [`decoder`] - Unit-width digit decoding
- [`pipeline`] - Per-frame decode entry point
- [`product`] - Product and history records exchanged with the remote service
- [`synth`] - Synthetic barcode rendering
- [`error`] - Common error types
*/

pub mod error;
pub mod frame;
pub mod grayscale;
pub mod threshold;
pub mod runs;
pub mod decoder;
pub mod pipeline;
pub mod product;
pub mod synth;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use frame::{Frame, PixelFormat};
pub use grayscale::IntensityMap;
pub use threshold::BinarySignal;
pub use runs::RunSequence;
pub use pipeline::{DecodePipeline, PipelineConfig};
pub use product::{BarcodeEntry, Product};

/// Version information for the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decoding constants
pub mod limits {
    /// Brightness cutoff between bar (dark) and space (light)
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Fewest runs a scan line must yield before decoding is attempted
    pub const MIN_RUNS: usize = 30;

    /// Shortest digit string accepted as a candidate code
    pub const MIN_DIGITS: usize = 8;

    /// Runs consumed per decoded digit
    pub const RUNS_PER_DIGIT: usize = 4;
}
