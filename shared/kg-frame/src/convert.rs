//! Pixel Conversion
//!
//! Packed 16/32-bit RGB scanlines → canonical 8-bit RGB.
//! Low bits of narrow channels are zero-filled, never rounded.

use crate::error::{FrameError, Result};
use crate::frame::{
    alloc_buffer, checked_len, rgb_len, CanonicalFrame, PixelEncoding, RawFrame, RGB_BYTES,
};

/// Unpack one 5-6-5 pixel into R, G, B.
#[inline]
pub const fn rgb565_to_rgb(px: u16) -> [u8; 3] {
    let b = ((px & 0x1f) << 3) as u8;
    let g = ((px & 0x7e0) >> 3) as u8;
    let r = ((px & 0xf800) >> 8) as u8;
    [r, g, b]
}

/// Unpack one X-8-8-8 pixel into R, G, B. The top byte is ignored.
#[inline]
pub const fn xrgb8888_to_rgb(px: u32) -> [u8; 3] {
    let b = (px & 0xff) as u8;
    let g = ((px >> 8) & 0xff) as u8;
    let r = ((px >> 16) & 0xff) as u8;
    [r, g, b]
}

/// Convert a linear raw frame into a canonical RGB frame.
///
/// `raw.data` must hold exactly `width * height` packed pixels in
/// little-endian order; the only other failure is allocation.
pub fn to_canonical(raw: &RawFrame) -> Result<CanonicalFrame> {
    let expected = checked_len(raw.width, raw.height, raw.encoding.bytes_per_pixel())?;
    if raw.data.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: raw.data.len(),
        });
    }

    let mut rgb = alloc_buffer(rgb_len(raw.width, raw.height)?)?;

    match raw.encoding {
        PixelEncoding::Rgb565 => {
            for (src, dst) in raw
                .data
                .chunks_exact(2)
                .zip(rgb.chunks_exact_mut(RGB_BYTES))
            {
                dst.copy_from_slice(&rgb565_to_rgb(u16::from_le_bytes([src[0], src[1]])));
            }
        }
        PixelEncoding::Xrgb8888 => {
            for (src, dst) in raw
                .data
                .chunks_exact(4)
                .zip(rgb.chunks_exact_mut(RGB_BYTES))
            {
                let px = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
                dst.copy_from_slice(&xrgb8888_to_rgb(px));
            }
        }
    }

    CanonicalFrame::from_rgb(rgb, raw.width, raw.height)
}
