//! Recording display backend for tests.
//!
//! Every device, export and mapping registers itself in a shared `Ledger` on
//! acquisition and again when dropped, so tests can assert nothing outlives a
//! capture and that release order mirrors acquisition.

use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::backend::{DisplayBackend, DisplayDevice, ExportedBuffer};
use super::{
    BasicMetadata, DisplayPlane, ExtendedMetadata, FOURCC_RGB565, FOURCC_XRGB8888, MODIFIER_LINEAR,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire(String),
    Release(String),
}

/// Shared acquire/release log.
#[derive(Debug, Clone, Default)]
pub struct Ledger(Arc<Mutex<Vec<Event>>>);

impl Ledger {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Names of resources acquired, in order.
    pub fn acquired(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Acquire(name) => Some(name),
                Event::Release(_) => None,
            })
            .collect()
    }

    /// Resources acquired but not yet released.
    pub fn live(&self) -> Vec<String> {
        let mut live = Vec::new();
        for event in self.events() {
            match event {
                Event::Acquire(name) => live.push(name),
                Event::Release(name) => live.retain(|n| *n != name),
            }
        }
        live
    }

    /// Panics unless every resource was released, each one only after
    /// everything acquired after it.
    pub fn assert_released_in_reverse(&self) {
        let mut stack: Vec<String> = Vec::new();
        for event in self.events() {
            match event {
                Event::Acquire(name) => stack.push(name),
                Event::Release(name) => {
                    let top = stack.pop();
                    assert_eq!(top.as_deref(), Some(name.as_str()), "out-of-order release");
                }
            }
        }
        assert!(stack.is_empty(), "leaked resources: {stack:?}");
    }
}

/// Point at which a fake card reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Open,
    Capability,
    Atomic,
    UniversalPlanes,
    PlaneList,
    Plane(u32),
    BasicMetadata,
    ExtendedMetadata,
    Export,
    Map,
}

/// Scripted device state.
#[derive(Debug, Clone)]
pub struct FakeCard {
    pub dumb_buffers: bool,
    pub fail: Option<FailAt>,
    pub planes: Vec<DisplayPlane>,
    pub basic: BasicMetadata,
    pub extended: Option<ExtendedMetadata>,
    pub memory: Vec<u8>,
}

pub const FB_ID: u32 = 90;
pub const BUFFER_HANDLE: u32 = 7;

/// Filler for the padding bytes between rows.
pub const PAD_BYTE: u8 = 0xEE;

impl FakeCard {
    /// A card scanning out `pixels` (little-endian, `bpp` wide) with rows
    /// `pitch` bytes apart.
    pub fn scanout(width: u32, height: u32, bpp: u32, pitch: u32, pixels: &[u8]) -> Self {
        let row = width as usize * (bpp / 8) as usize;
        let mut memory = vec![PAD_BYTE; pitch as usize * height as usize];
        for (y, src) in pixels.chunks_exact(row.max(1)).enumerate().take(height as usize) {
            let at = y * pitch as usize;
            memory[at..at + row].copy_from_slice(src);
        }

        Self {
            dumb_buffers: true,
            fail: None,
            planes: vec![
                DisplayPlane {
                    id: 30,
                    framebuffer_id: 0,
                    crtc_id: 0,
                },
                DisplayPlane {
                    id: 31,
                    framebuffer_id: FB_ID,
                    crtc_id: 41,
                },
            ],
            basic: BasicMetadata {
                framebuffer_id: FB_ID,
                width,
                height,
                bpp,
                depth: 24,
                handle: Some(BUFFER_HANDLE),
            },
            extended: Some(ExtendedMetadata {
                width,
                height,
                pixel_format: if bpp == 16 {
                    FOURCC_RGB565
                } else {
                    FOURCC_XRGB8888
                },
                modifier: Some(MODIFIER_LINEAR),
                handles: [Some(BUFFER_HANDLE), None, None, None],
                pitches: [pitch, 0, 0, 0],
                offsets: [0; 4],
            }),
            memory,
        }
    }

    /// A 32 bpp card from packed pixel values.
    pub fn xrgb(width: u32, height: u32, pitch: u32, pixels: &[u32]) -> Self {
        let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        Self::scanout(width, height, 32, pitch, &bytes)
    }

    /// A card that exists but cannot be used for capture.
    pub fn without_dumb_buffers() -> Self {
        Self {
            dumb_buffers: false,
            ..Self::xrgb(1, 1, 4, &[0])
        }
    }

    pub fn failing(mut self, at: FailAt) -> Self {
        self.fail = Some(at);
        self
    }

    fn check(&self, at: FailAt) -> io::Result<()> {
        if self.fail == Some(at) {
            return Err(io::Error::other(format!("injected failure: {at:?}")));
        }
        Ok(())
    }
}

/// Backend over a list of scripted cards named `card0`, `card1`, ...
#[derive(Debug, Clone)]
pub struct FakeBackend {
    cards: Vec<(PathBuf, Arc<FakeCard>)>,
    pub ledger: Ledger,
}

impl FakeBackend {
    pub fn new(cards: Vec<FakeCard>) -> Self {
        Self {
            cards: cards
                .into_iter()
                .enumerate()
                .map(|(i, card)| (PathBuf::from(format!("card{i}")), Arc::new(card)))
                .collect(),
            ledger: Ledger::default(),
        }
    }

    pub fn single(card: FakeCard) -> Self {
        Self::new(vec![card])
    }
}

impl DisplayBackend for FakeBackend {
    type Device = FakeDevice;

    fn devices(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.cards.iter().map(|(path, _)| path.clone()).collect())
    }

    fn open(&self, path: &Path) -> io::Result<FakeDevice> {
        let (_, card) = self
            .cards
            .iter()
            .find(|(p, _)| p == path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        card.check(FailAt::Open)?;

        let name = format!("device {}", path.display());
        self.ledger.push(Event::Acquire(name.clone()));
        Ok(FakeDevice {
            name,
            card: Arc::clone(card),
            ledger: self.ledger.clone(),
        })
    }
}

pub struct FakeDevice {
    name: String,
    card: Arc<FakeCard>,
    ledger: Ledger,
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.ledger.push(Event::Release(self.name.clone()));
    }
}

impl DisplayDevice for FakeDevice {
    type Export = FakeExport;

    fn supports_dumb_buffers(&self) -> io::Result<bool> {
        self.card.check(FailAt::Capability)?;
        Ok(self.card.dumb_buffers)
    }

    fn enable_atomic(&self) -> io::Result<()> {
        self.card.check(FailAt::Atomic)
    }

    fn enable_universal_planes(&self) -> io::Result<()> {
        self.card.check(FailAt::UniversalPlanes)
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        self.card.check(FailAt::PlaneList)?;
        Ok(self.card.planes.iter().map(|p| p.id).collect())
    }

    fn plane(&self, id: u32) -> io::Result<DisplayPlane> {
        self.card.check(FailAt::Plane(id))?;
        self.card
            .planes
            .iter()
            .find(|p| p.id == id)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn basic_framebuffer(&self, framebuffer_id: u32) -> io::Result<BasicMetadata> {
        self.card.check(FailAt::BasicMetadata)?;
        if framebuffer_id != self.card.basic.framebuffer_id {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(self.card.basic.clone())
    }

    fn extended_framebuffer(&self, _framebuffer_id: u32) -> io::Result<ExtendedMetadata> {
        self.card.check(FailAt::ExtendedMetadata)?;
        self.card
            .extended
            .clone()
            .ok_or_else(|| io::Error::from(io::ErrorKind::Unsupported))
    }

    fn export(&self, handle: u32) -> io::Result<FakeExport> {
        self.card.check(FailAt::Export)?;

        let name = format!("export {handle}");
        self.ledger.push(Event::Acquire(name.clone()));
        Ok(FakeExport {
            name,
            card: Arc::clone(&self.card),
            ledger: self.ledger.clone(),
        })
    }
}

pub struct FakeExport {
    name: String,
    card: Arc<FakeCard>,
    ledger: Ledger,
}

impl Drop for FakeExport {
    fn drop(&mut self) {
        self.ledger.push(Event::Release(self.name.clone()));
    }
}

impl ExportedBuffer for FakeExport {
    type Mapping = FakeMapping;

    fn map(&self, len: usize) -> io::Result<FakeMapping> {
        self.card.check(FailAt::Map)?;

        let len = len.min(self.card.memory.len());
        let name = format!("mapping of {}", self.name);
        self.ledger.push(Event::Acquire(name.clone()));
        Ok(FakeMapping {
            name,
            bytes: self.card.memory[..len].to_vec(),
            ledger: self.ledger.clone(),
        })
    }
}

pub struct FakeMapping {
    name: String,
    bytes: Vec<u8>,
    ledger: Ledger,
}

impl Deref for FakeMapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for FakeMapping {
    fn drop(&mut self) {
        self.ledger.push(Event::Release(self.name.clone()));
    }
}
