//! Image Encoding
//!
//! Writes canonical RGB frames as PNG or baseline JPEG via the `image` crate.
//! The output format follows the destination's file name suffix.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use kg_frame::frame::rgb_len;
use kg_frame::CanonicalFrame;
use thiserror::Error;
use tracing::debug;

/// JPEG quality, always within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Clamp any integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Container written to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// JPEG for names ending in `.jpg` or `.jpeg` (case-sensitive), PNG otherwise.
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy();
        if name.ends_with(".jpg") || name.ends_with(".jpeg") {
            Self::Jpeg
        } else {
            Self::Png
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => f.write_str("png"),
            Self::Jpeg => f.write_str("jpeg"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Unable to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Refusing to encode an empty {width}x{height} image")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Unable to write output: {0}")]
    Write(#[from] io::Error),
}

/// Encode `frame` into `path`, creating or truncating the file.
///
/// The file is closed on every exit path; a partially written file is left
/// in place on failure.
pub fn encode(
    frame: &CanonicalFrame,
    format: OutputFormat,
    quality: Quality,
    path: &Path,
) -> Result<(), EncodeError> {
    let (width, height) = frame.dimensions();
    if frame.is_empty() {
        return Err(EncodeError::EmptyFrame { width, height });
    }

    let expected = rgb_len(width, height).unwrap_or(usize::MAX);
    if frame.data.len() != expected {
        return Err(EncodeError::BufferMismatch {
            expected,
            actual: frame.data.len(),
        });
    }

    let file = File::create(path).map_err(|source| EncodeError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    debug!(
        path = %path.display(),
        %format,
        rows = height,
        row_bytes = u64::from(width) * 3,
        "Writing image"
    );

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                &frame.data,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut writer, quality.get()).write_image(
                &frame.data,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    writer.flush()?;
    Ok(())
}
