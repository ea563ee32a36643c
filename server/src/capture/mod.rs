//! Capture Module
//!
//! Locates the framebuffer currently scanned out by the display hardware,
//! exports and maps its memory, and copies it into a linear `RawFrame`.

pub mod backend;
pub mod kms;
pub mod error;
pub mod source;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::{DisplayBackend, DisplayDevice, ExportedBuffer};
pub use error::CaptureError;
pub use source::FrameSource;

use kg_frame::PixelEncoding;

/// A display plane and what it is attached to. Ids of 0 mean "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPlane {
    pub id: u32,
    pub framebuffer_id: u32,
    pub crtc_id: u32,
}

impl DisplayPlane {
    /// A plane is live when it has both a framebuffer and a CRTC.
    pub const fn is_active(&self) -> bool {
        self.framebuffer_id != 0 && self.crtc_id != 0
    }
}

/// Result of the legacy single-buffer framebuffer query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicMetadata {
    pub framebuffer_id: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub depth: u32,
    pub handle: Option<u32>,
}

/// Result of the multi-planar framebuffer query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedMetadata {
    pub width: u32,
    pub height: u32,
    /// DRM fourcc code.
    pub pixel_format: u32,
    pub modifier: Option<u64>,
    pub handles: [Option<u32>; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
}

/// Linear layout modifier (`DRM_FORMAT_MOD_LINEAR`).
pub const MODIFIER_LINEAR: u64 = 0;

pub const FOURCC_RGB565: u32 = u32::from_le_bytes(*b"RG16");
pub const FOURCC_XRGB8888: u32 = u32::from_le_bytes(*b"XR24");
pub const FOURCC_ARGB8888: u32 = u32::from_le_bytes(*b"AR24");

/// Printable form of a DRM fourcc code.
pub fn fourcc_name(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

/// Whether `fourcc` lays pixels out the way `encoding` reads them.
const fn fourcc_matches(encoding: PixelEncoding, fourcc: u32) -> bool {
    match encoding {
        PixelEncoding::Rgb565 => fourcc == FOURCC_RGB565,
        PixelEncoding::Xrgb8888 => fourcc == FOURCC_XRGB8888 || fourcc == FOURCC_ARGB8888,
    }
}

/// Framebuffer metadata as obtained from the device.
///
/// The extended form carries per-plane layout; only plane 0 is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferMetadata {
    Basic(BasicMetadata),
    Extended(BasicMetadata, ExtendedMetadata),
}

impl FramebufferMetadata {
    pub const fn basic(&self) -> &BasicMetadata {
        match self {
            Self::Basic(basic) | Self::Extended(basic, _) => basic,
        }
    }

    /// Memory handle backing plane 0.
    pub const fn primary_handle(&self) -> Option<u32> {
        match self {
            Self::Basic(basic) => basic.handle,
            Self::Extended(_, ext) => ext.handles[0],
        }
    }

    /// Row stride of plane 0 in bytes.
    ///
    /// The basic query has no pitch, so rows are assumed tightly packed.
    pub const fn primary_pitch(&self) -> u32 {
        match self {
            Self::Basic(basic) => basic.width.saturating_mul(basic.bpp / 8),
            Self::Extended(_, ext) => ext.pitches[0],
        }
    }
}

/// Everything needed to read the scanout buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferDescriptor {
    pub framebuffer_id: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub depth: u32,
    pub encoding: PixelEncoding,
    pub handle: u32,
    pub pitch: u32,
}

impl FramebufferDescriptor {
    /// Validate metadata and resolve it to a single readable buffer.
    pub fn resolve(metadata: &FramebufferMetadata) -> Result<Self, CaptureError> {
        let basic = metadata.basic();
        let framebuffer_id = basic.framebuffer_id;

        let encoding = PixelEncoding::from_bpp(basic.bpp)
            .ok_or(CaptureError::UnsupportedFormat { bpp: basic.bpp })?;

        // The basic query has no fourcc; its bpp is all there is to go on.
        if let FramebufferMetadata::Extended(_, ext) = metadata {
            if !fourcc_matches(encoding, ext.pixel_format) {
                return Err(CaptureError::UnsupportedPixelFormat {
                    fourcc: fourcc_name(ext.pixel_format),
                    bpp: basic.bpp,
                });
            }
        }

        let handle = metadata
            .primary_handle()
            .ok_or_else(|| CaptureError::Metadata {
                framebuffer_id,
                reason: "no buffer handle (missing privileges?)".into(),
            })?;

        let pitch = metadata.primary_pitch();
        let row_bytes = u64::from(basic.width) * encoding.bytes_per_pixel() as u64;
        if u64::from(pitch) < row_bytes {
            return Err(CaptureError::Metadata {
                framebuffer_id,
                reason: format!("pitch {pitch} shorter than a {row_bytes} byte row"),
            });
        }

        Ok(Self {
            framebuffer_id,
            width: basic.width,
            height: basic.height,
            bpp: basic.bpp,
            depth: basic.depth,
            encoding,
            handle,
            pitch,
        })
    }

    /// Packed bytes per row, without padding.
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.encoding.bytes_per_pixel()
    }

    /// Length of the mapping covering every row.
    pub fn mapping_len(&self) -> Option<usize> {
        (self.pitch as usize).checked_mul(self.height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(bpp: u32) -> BasicMetadata {
        BasicMetadata {
            framebuffer_id: 42,
            width: 640,
            height: 480,
            bpp,
            depth: 24,
            handle: Some(7),
        }
    }

    fn extended(pixel_format: u32, pitch: u32, handle: Option<u32>) -> ExtendedMetadata {
        ExtendedMetadata {
            width: 640,
            height: 480,
            pixel_format,
            modifier: Some(MODIFIER_LINEAR),
            handles: [handle, None, None, None],
            pitches: [pitch, 0, 0, 0],
            offsets: [0; 4],
        }
    }

    #[test]
    fn test_plane_activity() {
        let plane = DisplayPlane {
            id: 31,
            framebuffer_id: 90,
            crtc_id: 41,
        };
        assert!(plane.is_active());
        assert!(!DisplayPlane { crtc_id: 0, ..plane }.is_active());
        assert!(!DisplayPlane {
            framebuffer_id: 0,
            ..plane
        }
        .is_active());
    }

    #[test]
    fn test_basic_metadata_assumes_packed_rows() {
        let desc = FramebufferDescriptor::resolve(&FramebufferMetadata::Basic(basic(32))).unwrap();
        assert_eq!(desc.pitch, 640 * 4);
        assert_eq!(desc.handle, 7);
        assert_eq!(desc.encoding, PixelEncoding::Xrgb8888);
    }

    #[test]
    fn test_extended_metadata_takes_plane_zero() {
        let meta = FramebufferMetadata::Extended(basic(16), extended(FOURCC_RGB565, 1536, Some(9)));
        let desc = FramebufferDescriptor::resolve(&meta).unwrap();
        assert_eq!(desc.pitch, 1536);
        assert_eq!(desc.handle, 9);
        assert_eq!(desc.encoding, PixelEncoding::Rgb565);
        assert_eq!(desc.mapping_len(), Some(1536 * 480));
    }

    #[test]
    fn test_unsupported_bpp_rejected() {
        let err = FramebufferDescriptor::resolve(&FramebufferMetadata::Basic(basic(24))).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat { bpp: 24 }));
    }

    #[test]
    fn test_alpha_variant_reads_as_xrgb() {
        let meta =
            FramebufferMetadata::Extended(basic(32), extended(FOURCC_ARGB8888, 2560, Some(9)));
        let desc = FramebufferDescriptor::resolve(&meta).unwrap();
        assert_eq!(desc.encoding, PixelEncoding::Xrgb8888);
    }

    #[test]
    fn test_foreign_pixel_format_rejected() {
        let cases = [
            (32, *b"XB24"),
            (32, *b"XR30"),
            (32, *b"RG16"),
            (16, *b"XR24"),
            (16, *b"BG16"),
        ];
        for (bpp, code) in cases {
            let meta = FramebufferMetadata::Extended(
                basic(bpp),
                extended(u32::from_le_bytes(code), 2560, Some(9)),
            );
            let err = FramebufferDescriptor::resolve(&meta).unwrap_err();
            assert!(
                matches!(
                    &err,
                    CaptureError::UnsupportedPixelFormat { fourcc, bpp: b }
                        if fourcc.as_bytes() == code && *b == bpp
                ),
                "{bpp} bpp {code:?}: {err}"
            );
        }
    }

    #[test]
    fn test_fourcc_name() {
        assert_eq!(fourcc_name(FOURCC_XRGB8888), "XR24");
        assert_eq!(fourcc_name(0), "????");
    }

    #[test]
    fn test_short_pitch_rejected() {
        let meta = FramebufferMetadata::Extended(basic(32), extended(FOURCC_XRGB8888, 640, Some(9)));
        let err = FramebufferDescriptor::resolve(&meta).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Metadata {
                framebuffer_id: 42,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_handle_rejected() {
        let meta = FramebufferMetadata::Extended(basic(32), extended(FOURCC_XRGB8888, 2560, None));
        assert!(matches!(
            FramebufferDescriptor::resolve(&meta),
            Err(CaptureError::Metadata { .. })
        ));
    }
}
