//! `kmsgrab` Frame Library
//!
//! Pure image math shared by the capture pipeline: raw scanline conversion to
//! canonical RGB, resampling, and output size resolution. No I/O.

pub mod convert;
pub mod error;
pub mod frame;
pub mod resample;
pub mod size;

pub use error::{FrameError, Result};
pub use frame::{CanonicalFrame, PixelEncoding, RawFrame};
pub use resample::ScaleMode;
