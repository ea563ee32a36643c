//! Output Size Resolution
//!
//! Turns a requested output size (zero meaning "infer") into concrete
//! dimensions for a given source frame.

use crate::error::{FrameError, Result};

/// `round(a * b / c)` in 64-bit arithmetic, half rounding up. Zero when `c` is zero.
fn scale_rounded(a: u32, b: u32, c: u32) -> u32 {
    if c == 0 {
        return 0;
    }
    let c = u64::from(c);
    let value = (u64::from(a) * u64::from(b) + c / 2) / c;
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Resolve the output dimensions for a `source` sized frame.
///
/// - both requested zero: the source size
/// - one requested zero: inferred from the other, keeping the aspect ratio
/// - both non-zero: as given
///
/// Fails with `InvalidSize` when either resolved dimension is zero.
pub fn resolve_output_size(requested: (u32, u32), source: (u32, u32)) -> Result<(u32, u32)> {
    let (req_w, req_h) = requested;
    let (src_w, src_h) = source;

    let (width, height) = match (req_w, req_h) {
        (0, 0) => (src_w, src_h),
        (w, 0) => (w, scale_rounded(w, src_h, src_w)),
        (0, h) => (scale_rounded(h, src_w, src_h), h),
        (w, h) => (w, h),
    };

    if width == 0 || height == 0 {
        return Err(FrameError::InvalidSize { width, height });
    }
    Ok((width, height))
}
