/*!
Common error types for the scanning components.
*/

use thiserror::Error;

/// Common result type used throughout the core library
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error type for frame handling and decoding
#[derive(Error, Debug)]
pub enum CoreError {
    /// Frame has no pixels
    #[error("Frame is empty ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },

    /// Frame buffer does not match its declared geometry
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),

    /// Scan line yielded too few runs to look like a barcode
    #[error("Insufficient pattern: {runs} runs on scan line")]
    InsufficientPattern { runs: usize },

    /// Decoded digit string is too short to be a candidate
    #[error("Decode rejected: only {digits} digits decoded")]
    DecodeRejected { digits: usize },

    /// Image file could not be read, decoded or written
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new invalid frame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Per-frame failures that only mean "no barcode in this frame"
    pub fn is_no_candidate(&self) -> bool {
        matches!(
            self,
            Self::EmptyFrame { .. } | Self::InsufficientPattern { .. } | Self::DecodeRejected { .. }
        )
    }
}
