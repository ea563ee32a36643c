//! Resampling
//!
//! Rescales canonical RGB frames with nearest-neighbor or 16.16 fixed-point
//! bilinear interpolation. Integer arithmetic only.

use std::str::FromStr;

use crate::error::{FrameError, Result};
use crate::frame::{alloc_buffer, rgb_len, CanonicalFrame, RGB_BYTES};

/// Fixed-point one (16 fractional bits).
const FP_ONE: u64 = 1 << 16;

/// Rounding bias for the 32 fractional bits of a product of two weights.
const FP_ROUND: u64 = 1 << 31;

/// Interpolation used when output and source sizes differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleMode {
    #[default]
    Nearest,
    Bilinear,
}

impl FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(format!("unknown scale mode: {other}")),
        }
    }
}

/// Resize `src` to `dst_w` x `dst_h`.
///
/// A zero destination dimension yields an empty frame without touching the
/// source pixels.
pub fn resize(
    src: &CanonicalFrame,
    dst_w: u32,
    dst_h: u32,
    mode: ScaleMode,
) -> Result<CanonicalFrame> {
    if dst_w == 0 || dst_h == 0 {
        return CanonicalFrame::from_rgb(Vec::new(), dst_w, dst_h);
    }
    if src.is_empty() {
        return Err(FrameError::EmptySource);
    }

    let mut dst = alloc_buffer(rgb_len(dst_w, dst_h)?)?;
    match mode {
        ScaleMode::Nearest => scale_nearest(src, &mut dst, dst_w, dst_h),
        ScaleMode::Bilinear => scale_bilinear(src, &mut dst, dst_w, dst_h),
    }

    CanonicalFrame::from_rgb(dst, dst_w, dst_h)
}

fn scale_nearest(src: &CanonicalFrame, dst: &mut [u8], dst_w: u32, dst_h: u32) {
    let src_w = src.width as usize;

    // Source column for each destination column; identical for every row.
    let columns: Vec<usize> = (0..u64::from(dst_w))
        .map(|x| (x * u64::from(src.width) / u64::from(dst_w)) as usize)
        .collect();

    for (y, row) in dst
        .chunks_exact_mut(dst_w as usize * RGB_BYTES)
        .enumerate()
    {
        let sy = (y as u64 * u64::from(src.height) / u64::from(dst_h)) as usize;
        let src_row = &src.data[sy * src_w * RGB_BYTES..(sy + 1) * src_w * RGB_BYTES];

        for (dp, &sx) in row.chunks_exact_mut(RGB_BYTES).zip(&columns) {
            dp.copy_from_slice(&src_row[sx * RGB_BYTES..(sx + 1) * RGB_BYTES]);
        }
    }
}

/// Sample position along one axis: lower index, upper index, 16-bit fraction.
#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: u64,
}

impl Tap {
    fn new(i: u32, src_len: u32, dst_len: u32) -> Self {
        let pos = if dst_len == 1 {
            0
        } else {
            ((u64::from(i) * u64::from(src_len - 1)) << 16) / u64::from(dst_len - 1)
        };
        let lo = (pos >> 16) as u32;
        let hi = if lo + 1 < src_len { lo + 1 } else { lo };
        Self {
            lo: lo as usize,
            hi: hi as usize,
            frac: pos & 0xffff,
        }
    }
}

fn scale_bilinear(src: &CanonicalFrame, dst: &mut [u8], dst_w: u32, dst_h: u32) {
    let stride = src.width as usize * RGB_BYTES;
    let columns: Vec<Tap> = (0..dst_w)
        .map(|x| Tap::new(x, src.width, dst_w))
        .collect();

    for (y, row) in dst
        .chunks_exact_mut(dst_w as usize * RGB_BYTES)
        .enumerate()
    {
        let ty = Tap::new(y as u32, src.height, dst_h);
        let top = &src.data[ty.lo * stride..(ty.lo + 1) * stride];
        let bottom = &src.data[ty.hi * stride..(ty.hi + 1) * stride];

        for (dp, tx) in row.chunks_exact_mut(RGB_BYTES).zip(&columns) {
            let w00 = (FP_ONE - tx.frac) * (FP_ONE - ty.frac);
            let w10 = tx.frac * (FP_ONE - ty.frac);
            let w01 = (FP_ONE - tx.frac) * ty.frac;
            let w11 = tx.frac * ty.frac;

            let p00 = &top[tx.lo * RGB_BYTES..];
            let p10 = &top[tx.hi * RGB_BYTES..];
            let p01 = &bottom[tx.lo * RGB_BYTES..];
            let p11 = &bottom[tx.hi * RGB_BYTES..];

            for c in 0..RGB_BYTES {
                let sum = u64::from(p00[c]) * w00
                    + u64::from(p10[c]) * w10
                    + u64::from(p01[c]) * w01
                    + u64::from(p11[c]) * w11;
                dp[c] = ((sum + FP_ROUND) >> 32) as u8;
            }
        }
    }
}
