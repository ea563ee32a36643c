//! Display Backend Traits
//!
//! The seam between the capture algorithm and the kernel interface. Every
//! acquired resource is an owned value that releases itself on drop, so the
//! capture path cannot leak descriptors or mappings on any exit.

use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::{BasicMetadata, DisplayPlane, ExtendedMetadata};

/// Source of display devices.
pub trait DisplayBackend {
    type Device: DisplayDevice;

    /// Candidate device nodes, in a stable order.
    fn devices(&self) -> io::Result<Vec<PathBuf>>;

    /// Open a device node. The handle is closed when dropped.
    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}

/// An open display device.
pub trait DisplayDevice {
    type Export: ExportedBuffer;

    /// Whether the device supports simple (dumb) buffer allocation.
    fn supports_dumb_buffers(&self) -> io::Result<bool>;

    fn enable_atomic(&self) -> io::Result<()>;

    fn enable_universal_planes(&self) -> io::Result<()>;

    fn plane_ids(&self) -> io::Result<Vec<u32>>;

    fn plane(&self, id: u32) -> io::Result<DisplayPlane>;

    /// Legacy single-buffer framebuffer query.
    fn basic_framebuffer(&self, framebuffer_id: u32) -> io::Result<BasicMetadata>;

    /// Multi-planar framebuffer query; not every driver supports it.
    fn extended_framebuffer(&self, framebuffer_id: u32) -> io::Result<ExtendedMetadata>;

    /// Export a buffer handle as a read-only, process-local descriptor.
    fn export(&self, handle: u32) -> io::Result<Self::Export>;
}

/// Exported buffer memory that can be mapped for reading.
pub trait ExportedBuffer {
    /// Read-only view of the mapped bytes, unmapped when dropped.
    type Mapping: Deref<Target = [u8]>;

    fn map(&self, len: usize) -> io::Result<Self::Mapping>;
}
