//! Capture Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating, exporting or reading the scanout buffer.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No display device offers dumb buffers, or none could be opened.
    #[error("No usable KMS/DRM device found")]
    NoDevice,

    /// Listing candidate device nodes failed.
    #[error("Unable to enumerate display devices: {0}")]
    Enumerate(#[source] io::Error),

    /// A required client capability could not be enabled.
    #[error("Unable to set {capability} capability on {device}: {source}")]
    Capability {
        capability: &'static str,
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No plane is currently scanning out a framebuffer.
    #[error("No active plane found")]
    NoActivePlane,

    /// Plane resources could not be listed.
    #[error("Unable to get plane resources: {0}")]
    PlaneResources(#[source] io::Error),

    /// Framebuffer metadata could not be read or is inconsistent.
    #[error("Failed to get framebuffer {framebuffer_id}: {reason}")]
    Metadata { framebuffer_id: u32, reason: String },

    /// The framebuffer uses a pixel size the converter cannot read.
    #[error("Unsupported framebuffer format: {bpp} bits per pixel")]
    UnsupportedFormat { bpp: u32 },

    /// The reported pixel layout is not one the converter reads at this depth.
    #[error("Unsupported framebuffer pixel format {fourcc} at {bpp} bits per pixel")]
    UnsupportedPixelFormat { fourcc: String, bpp: u32 },

    /// Exporting the buffer handle as a mappable descriptor failed.
    #[error("Failed to retrieve prime handle for buffer {handle}: {source}")]
    Export {
        handle: u32,
        #[source]
        source: io::Error,
    },

    /// Mapping the exported buffer failed.
    #[error("Unable to mmap prime buffer ({len} bytes): {source}")]
    Map {
        len: usize,
        #[source]
        source: io::Error,
    },

    /// The linear copy buffer could not be allocated.
    #[error("Unable to allocate capture buffer: {0}")]
    Alloc(#[from] kg_frame::FrameError),
}
