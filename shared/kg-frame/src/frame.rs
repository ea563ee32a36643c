//! Frame Types
//!
//! `RawFrame` holds packed scanlines in the display's native encoding.
//! `CanonicalFrame` is the 8-bit RGB interchange format between conversion,
//! resampling and encoding.

use crate::error::{FrameError, Result};

/// Bytes per pixel of a canonical frame.
pub const RGB_BYTES: usize = 3;

/// Native pixel encodings the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    /// 16-bit packed 5-6-5 RGB.
    Rgb565,
    /// 32-bit packed RGB with an ignored top byte.
    Xrgb8888,
}

impl PixelEncoding {
    /// Map a framebuffer bits-per-pixel value to an encoding.
    ///
    /// Anything other than 16 or 32 is unsupported and yields `None`.
    pub const fn from_bpp(bpp: u32) -> Option<Self> {
        match bpp {
            16 => Some(Self::Rgb565),
            32 => Some(Self::Xrgb8888),
            _ => None,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 => 2,
            Self::Xrgb8888 => 4,
        }
    }
}

/// Linear, unpadded scanlines in their native encoding.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
}

impl RawFrame {
    /// Packed length of one row in bytes.
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.encoding.bytes_per_pixel()
    }
}

/// Row-major R, G, B bytes with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CanonicalFrame {
    /// Wrap an RGB buffer, checking it matches the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
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

    /// Frame of a single repeated color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let mut data = alloc_buffer(len)?;
        for px in data.chunks_exact_mut(RGB_BYTES) {
            px.copy_from_slice(&rgb);
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * RGB_BYTES;
        Some([self.data[at], self.data[at + 1], self.data[at + 2]])
    }

    /// One row of packed RGB bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * RGB_BYTES;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }
}

/// Byte length of a `width` x `height` RGB buffer.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    checked_len(width, height, RGB_BYTES)
}

/// `width * height * bytes_per_pixel`, failing on overflow.
pub fn checked_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or(FrameError::Alloc {
            bytes: (u128::from(width) * u128::from(height)).saturating_mul(bytes_per_pixel as u128),
        })
}

/// Allocate a zeroed buffer, reporting refusal instead of aborting.
pub fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| FrameError::Alloc { bytes: len as u128 })?;
    buf.resize(len, 0);
    Ok(buf)
}
