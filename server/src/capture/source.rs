//! Frame Source
//!
//! Finds the active scanout framebuffer and copies it into a linear
//! `RawFrame`. Every resource is scoped to one `capture_frame` call; the
//! mapping, exported descriptor and device handle are dropped in reverse order
//! of acquisition on every path.

use std::io;
use std::path::PathBuf;

use kg_frame::frame::{alloc_buffer, checked_len};
use kg_frame::RawFrame;
use tracing::{debug, warn};

use super::backend::{DisplayBackend, DisplayDevice, ExportedBuffer};
use super::{
    fourcc_name, CaptureError, DisplayPlane, FramebufferDescriptor, FramebufferMetadata,
    MODIFIER_LINEAR,
};

/// Reads the currently displayed frame from a display backend.
#[derive(Debug, Clone)]
pub struct FrameSource<B> {
    backend: B,
}

impl<B: DisplayBackend> FrameSource<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Capture the active plane's framebuffer.
    pub fn capture_frame(&self) -> Result<(FramebufferDescriptor, RawFrame), CaptureError> {
        let (path, device) = self.open_device()?;

        device
            .enable_atomic()
            .map_err(|source| CaptureError::Capability {
                capability: "atomic",
                device: path.clone(),
                source,
            })?;
        device
            .enable_universal_planes()
            .map_err(|source| CaptureError::Capability {
                capability: "universal planes",
                device: path.clone(),
                source,
            })?;

        let plane = find_active_plane(&device)?;
        debug!(
            plane_id = plane.id,
            framebuffer_id = plane.framebuffer_id,
            crtc_id = plane.crtc_id,
            "Using plane"
        );

        let metadata = query_metadata(&device, plane.framebuffer_id)?;
        let descriptor = FramebufferDescriptor::resolve(&metadata)?;
        debug!(
            framebuffer_id = descriptor.framebuffer_id,
            width = descriptor.width,
            height = descriptor.height,
            bpp = descriptor.bpp,
            depth = descriptor.depth,
            handle = descriptor.handle,
            pitch = descriptor.pitch,
            "Resolved framebuffer"
        );

        let raw = read_linear(&device, &descriptor)?;
        Ok((descriptor, raw))
    }

    /// Open the first device, in backend order, that supports dumb buffers.
    fn open_device(&self) -> Result<(PathBuf, B::Device), CaptureError> {
        let candidates = self.backend.devices().map_err(CaptureError::Enumerate)?;

        for path in candidates {
            let device = match self.backend.open(&path) {
                Ok(device) => device,
                Err(e) => {
                    debug!(device = %path.display(), error = %e, "Could not open device");
                    continue;
                }
            };

            match device.supports_dumb_buffers() {
                Ok(true) => {
                    debug!(device = %path.display(), "Selected device");
                    return Ok((path, device));
                }
                Ok(false) => {
                    debug!(device = %path.display(), "Device has no dumb buffer support");
                }
                Err(e) => {
                    debug!(device = %path.display(), error = %e, "Capability query failed");
                }
            }
        }

        Err(CaptureError::NoDevice)
    }
}

/// First plane that has both a framebuffer and a CRTC attached.
fn find_active_plane<D: DisplayDevice>(device: &D) -> Result<DisplayPlane, CaptureError> {
    let ids = device.plane_ids().map_err(CaptureError::PlaneResources)?;

    for (index, id) in ids.into_iter().enumerate() {
        let plane = match device.plane(id) {
            Ok(plane) => plane,
            Err(e) => {
                debug!(index, plane_id = id, error = %e, "Plane query failed");
                continue;
            }
        };

        debug!(
            index,
            plane_id = plane.id,
            framebuffer_id = plane.framebuffer_id,
            crtc_id = plane.crtc_id,
            "Found plane"
        );

        if plane.is_active() {
            return Ok(plane);
        }
    }

    Err(CaptureError::NoActivePlane)
}

/// Basic metadata is mandatory; the extended query refines it when available.
fn query_metadata<D: DisplayDevice>(
    device: &D,
    framebuffer_id: u32,
) -> Result<FramebufferMetadata, CaptureError> {
    let basic = device
        .basic_framebuffer(framebuffer_id)
        .map_err(|e| CaptureError::Metadata {
            framebuffer_id,
            reason: e.to_string(),
        })?;

    match device.extended_framebuffer(framebuffer_id) {
        Ok(extended) => {
            debug!(
                framebuffer_id,
                pixel_format = %fourcc_name(extended.pixel_format),
                handles = ?extended.handles,
                pitches = ?extended.pitches,
                offsets = ?extended.offsets,
                "Extended framebuffer metadata"
            );
            if let Some(modifier) = extended.modifier.filter(|&m| m != MODIFIER_LINEAR) {
                warn!(
                    framebuffer_id,
                    modifier = format_args!("{modifier:#x}"),
                    "Framebuffer is not linear, image may be scrambled"
                );
            }
            Ok(FramebufferMetadata::Extended(basic, extended))
        }
        Err(e) => {
            debug!(framebuffer_id, error = %e, "Extended framebuffer query failed, using basic metadata");
            Ok(FramebufferMetadata::Basic(basic))
        }
    }
}

/// Export, map and copy the framebuffer, dropping row padding.
fn read_linear<D: DisplayDevice>(
    device: &D,
    descriptor: &FramebufferDescriptor,
) -> Result<RawFrame, CaptureError> {
    if descriptor.width == 0 || descriptor.height == 0 {
        return Ok(RawFrame {
            data: Vec::new(),
            width: descriptor.width,
            height: descriptor.height,
            encoding: descriptor.encoding,
        });
    }

    let map_len = descriptor.mapping_len().ok_or_else(|| CaptureError::Map {
        len: usize::MAX,
        source: io::Error::new(io::ErrorKind::InvalidInput, "mapping length overflows"),
    })?;

    let export = device
        .export(descriptor.handle)
        .map_err(|source| CaptureError::Export {
            handle: descriptor.handle,
            source,
        })?;

    let row = descriptor.row_bytes();
    let mut linear = alloc_buffer(checked_len(
        descriptor.width,
        descriptor.height,
        descriptor.encoding.bytes_per_pixel(),
    )?)?;

    let mapping = export
        .map(map_len)
        .map_err(|source| CaptureError::Map { len: map_len, source })?;
    debug!(length = map_len, "Mapped prime buffer");

    let pitch = descriptor.pitch as usize;
    let needed = pitch * (descriptor.height as usize - 1) + row;
    if mapping.len() < needed {
        return Err(CaptureError::Map {
            len: map_len,
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("mapping holds {} bytes, need {needed}", mapping.len()),
            ),
        });
    }

    for (y, dst) in linear.chunks_exact_mut(row).enumerate() {
        let at = y * pitch;
        dst.copy_from_slice(&mapping[at..at + row]);
    }

    drop(mapping);
    drop(export);

    Ok(RawFrame {
        data: linear,
        width: descriptor.width,
        height: descriptor.height,
        encoding: descriptor.encoding,
    })
}
