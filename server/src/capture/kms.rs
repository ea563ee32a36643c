//! KMS/DRM Backend
//!
//! Real `DisplayBackend` over `/dev/dri/card*` nodes via the `drm` crate.
//! Buffers are exported as dma-buf descriptors and mapped with `memmap2`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

use drm::control::{self, framebuffer, plane, Device as ControlDevice};
use drm::{buffer, ClientCapability, Device, DriverCapability};
use memmap2::{Mmap, MmapOptions};
use tracing::trace;

use super::backend::{DisplayBackend, DisplayDevice, ExportedBuffer};
use super::{BasicMetadata, DisplayPlane, ExtendedMetadata};

/// Directory holding DRM device nodes.
pub const DEFAULT_DRI_DIR: &str = "/dev/dri";

/// Backend enumerating the primary device nodes under a DRI directory.
#[derive(Debug, Clone)]
pub struct DrmBackend {
    dri_dir: PathBuf,
}

impl DrmBackend {
    pub fn new(dri_dir: impl Into<PathBuf>) -> Self {
        Self {
            dri_dir: dri_dir.into(),
        }
    }
}

impl Default for DrmBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DRI_DIR)
    }
}

/// Index of a `cardN` node name.
fn card_index(name: &str) -> Option<u32> {
    name.strip_prefix("card")?.parse().ok()
}

impl DisplayBackend for DrmBackend {
    type Device = Card;

    fn devices(&self) -> io::Result<Vec<PathBuf>> {
        let mut cards: Vec<(u32, PathBuf)> = std::fs::read_dir(&self.dri_dir)?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let index = card_index(entry.file_name().to_str()?)?;
                Some((index, entry.path()))
            })
            .collect();

        cards.sort_by_key(|(index, _)| *index);
        Ok(cards.into_iter().map(|(_, path)| path).collect())
    }

    fn open(&self, path: &Path) -> io::Result<Card> {
        // std opens with O_CLOEXEC
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Card {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// An open DRM device node.
pub struct Card {
    file: File,
    path: PathBuf,
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl Device for Card {}
impl ControlDevice for Card {}

impl Drop for Card {
    fn drop(&mut self) {
        trace!(device = %self.path.display(), "Closing DRM device");
    }
}

fn invalid_id(kind: &str, id: u32) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid {kind} id {id}"))
}

fn handle_from<T: From<control::RawResourceHandle>>(kind: &str, id: u32) -> io::Result<T> {
    control::from_u32(id).ok_or_else(|| invalid_id(kind, id))
}

impl DisplayDevice for Card {
    type Export = PrimeBuffer;

    fn supports_dumb_buffers(&self) -> io::Result<bool> {
        Ok(self.get_driver_capability(DriverCapability::DumbBuffer)? != 0)
    }

    fn enable_atomic(&self) -> io::Result<()> {
        self.set_client_capability(ClientCapability::Atomic, true)
    }

    fn enable_universal_planes(&self) -> io::Result<()> {
        self.set_client_capability(ClientCapability::UniversalPlanes, true)
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        Ok(self
            .plane_handles()?
            .into_iter()
            .map(u32::from)
            .collect())
    }

    fn plane(&self, id: u32) -> io::Result<DisplayPlane> {
        let handle: plane::Handle = handle_from("plane", id)?;
        let info = self.get_plane(handle)?;

        Ok(DisplayPlane {
            id,
            framebuffer_id: info.framebuffer().map_or(0, u32::from),
            crtc_id: info.crtc().map_or(0, u32::from),
        })
    }

    fn basic_framebuffer(&self, framebuffer_id: u32) -> io::Result<BasicMetadata> {
        let handle: framebuffer::Handle = handle_from("framebuffer", framebuffer_id)?;
        let info = self.get_framebuffer(handle)?;
        let (width, height) = info.size();

        Ok(BasicMetadata {
            framebuffer_id,
            width,
            height,
            bpp: info.bpp(),
            depth: info.depth(),
            handle: info.buffer().map(u32::from),
        })
    }

    fn extended_framebuffer(&self, framebuffer_id: u32) -> io::Result<ExtendedMetadata> {
        let handle: framebuffer::Handle = handle_from("framebuffer", framebuffer_id)?;
        let info = self
            .get_planar_framebuffer(handle)
            .map_err(io::Error::other)?;
        let (width, height) = info.size();

        Ok(ExtendedMetadata {
            width,
            height,
            pixel_format: info.pixel_format() as u32,
            modifier: info.modifier().map(u64::from),
            handles: info.buffers().map(|b| b.map(u32::from)),
            pitches: info.pitches(),
            offsets: info.offsets(),
        })
    }

    fn export(&self, handle: u32) -> io::Result<PrimeBuffer> {
        let buffer: buffer::Handle = handle_from("buffer", handle)?;
        let flags = (libc::O_RDONLY | libc::O_CLOEXEC) as u32;
        let fd = self.buffer_to_prime_fd(buffer, flags)?;

        Ok(PrimeBuffer { fd, handle })
    }
}

/// A dma-buf descriptor for an exported framebuffer. Closed on drop.
pub struct PrimeBuffer {
    fd: OwnedFd,
    handle: u32,
}

impl ExportedBuffer for PrimeBuffer {
    type Mapping = Mmap;

    #[allow(unsafe_code)]
    fn map(&self, len: usize) -> io::Result<Mmap> {
        // SAFETY: the mapping is private and read-only; the scanout buffer may
        // change underneath it, which only affects the pixels we copy out.
        unsafe { MmapOptions::new().len(len).map_copy_read_only(&self.fd) }
    }
}

impl Drop for PrimeBuffer {
    fn drop(&mut self) {
        trace!(handle = self.handle, "Closing prime descriptor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_index() {
        assert_eq!(card_index("card0"), Some(0));
        assert_eq!(card_index("card12"), Some(12));
        assert_eq!(card_index("renderD128"), None);
        assert_eq!(card_index("card"), None);
        assert_eq!(card_index("by-path"), None);
    }

    #[test]
    fn test_devices_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["card10", "card2", "renderD128", "card0", "by-path"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let backend = DrmBackend::new(dir.path());
        let devices = backend.devices().unwrap();
        let names: Vec<_> = devices
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["card0", "card2", "card10"]);
    }

    #[test]
    fn test_devices_missing_dir_is_error() {
        let backend = DrmBackend::new("/nonexistent/dri");
        assert!(backend.devices().is_err());
    }
}
