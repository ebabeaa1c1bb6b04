/*!
Per-frame decode pipeline.

Frame -> intensity -> binary signal -> run sequence -> candidate code.
Failures for which [`CoreError::is_no_candidate`] holds only mean "no
barcode in this frame"; callers keep capturing.
*/

use crate::decoder;
use crate::error::{CoreError, Result};
use crate::frame::Frame;
use crate::grayscale;
use crate::limits::{DEFAULT_THRESHOLD, MIN_DIGITS, MIN_RUNS};
use crate::runs::{self, RunSequence, TrailingRun};
use crate::threshold::{self, BinarySignal};
use tracing::debug;

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Brightness cutoff between bar and space
    pub threshold: u8,
    /// Scan line; `None` means the vertical middle
    pub scan_row: Option<usize>,
    /// Policy for the run still open at the end of the scan line
    pub trailing: TrailingRun,
    pub min_runs: usize,
    pub min_digits: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            scan_row: None,
            trailing: TrailingRun::Drop,
            min_runs: MIN_RUNS,
            min_digits: MIN_DIGITS,
        }
    }
}

/// Grayscale, threshold, run extraction and digit decoding in one place
#[derive(Debug, Clone, Default)]
pub struct DecodePipeline {
    config: PipelineConfig,
}

impl DecodePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Binarize a frame
    pub fn binarize(&self, frame: &Frame) -> BinarySignal {
        let intensity = grayscale::reduce(frame);
        threshold::binarize(&intensity, self.config.threshold)
    }

    /// Runs along the configured scan line
    pub fn runs(&self, signal: &BinarySignal) -> RunSequence {
        let row = self.config.scan_row.unwrap_or_else(|| signal.middle_row());
        runs::extract(signal, row, self.config.trailing)
    }

    /// Decode a binary signal
    pub fn scan_signal(&self, signal: &BinarySignal) -> Result<String> {
        decoder::decode(&self.runs(signal), self.config.min_runs, self.config.min_digits)
    }

    /// Decode one frame into a candidate code
    pub fn scan(&self, frame: &Frame) -> Result<String> {
        if frame.is_empty() {
            return Err(CoreError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        let result = self.scan_signal(&self.binarize(frame));
        match &result {
            Ok(code) => debug!("frame {} decoded to {}", frame.frame_id, code),
            Err(e) => debug!("frame {}: {}", frame.frame_id, e),
        }
        result
    }

    /// Decode one frame, folding per-frame failures into `None`
    pub fn candidate(&self, frame: &Frame) -> Option<String> {
        self.scan(frame).ok()
    }
}
