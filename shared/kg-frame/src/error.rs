//! Frame Errors

use thiserror::Error;

/// Result alias for frame operations.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors produced while converting or resampling frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The allocator refused a buffer, or its size overflowed.
    #[error("Unable to allocate {bytes} byte frame buffer")]
    Alloc { bytes: u128 },

    /// Resolved output dimensions are not usable.
    #[error("Invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Buffer length does not match the declared geometry.
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Asked to produce pixels from a frame with no pixels.
    #[error("Cannot resample an empty source frame")]
    EmptySource,
}
