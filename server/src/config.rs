//! Configuration
//!
//! Process-level defaults come from environment variables; command-line flags
//! override them. Per-capture settings travel explicitly as `CaptureSettings`.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use kg_frame::ScaleMode;

use crate::capture::kms::DEFAULT_DRI_DIR;
use crate::encode::Quality;

/// Default control socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/kmsgrab.sock";

/// Settings for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Output file; its suffix selects the format.
    pub destination: PathBuf,
    /// Requested output width, 0 to infer.
    pub width: u32,
    /// Requested output height, 0 to infer.
    pub height: u32,
    /// JPEG quality.
    pub quality: Quality,
    /// Interpolation used when resizing.
    pub scale_mode: ScaleMode,
}

impl CaptureSettings {
    /// Native size, default quality, nearest-neighbor scaling.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            width: 0,
            height: 0,
            quality: Quality::default(),
            scale_mode: ScaleMode::default(),
        }
    }
}

/// Environment-derived configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Control socket for service mode
    pub socket_path: PathBuf,

    /// Default JPEG quality (default: 90)
    pub quality: Quality,

    /// Default scaling mode (default: nearest)
    pub scale_mode: ScaleMode,

    /// Directory scanned for `cardN` nodes (default: /dev/dri)
    pub dri_dir: PathBuf,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: DEFAULT_SOCKET_PATH.into(),
            quality: Quality::default(),
            scale_mode: ScaleMode::default(),
            dri_dir: DEFAULT_DRI_DIR.into(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let quality = match env::var("KMSGRAB_QUALITY") {
            Ok(v) => Quality::clamped(
                v.trim()
                    .parse()
                    .with_context(|| format!("KMSGRAB_QUALITY is not a number: {v}"))?,
            ),
            Err(_) => defaults.quality,
        };

        let scale_mode = match env::var("KMSGRAB_SCALE") {
            Ok(v) => v
                .parse()
                .map_err(anyhow::Error::msg)
                .context("KMSGRAB_SCALE must be 'nearest' or 'bilinear'")?,
            Err(_) => defaults.scale_mode,
        };

        Ok(Self {
            socket_path: env::var_os("KMSGRAB_SOCKET")
                .map(PathBuf::from)
                .unwrap_or(defaults.socket_path),
            quality,
            scale_mode,
            dri_dir: env::var_os("KMSGRAB_DRI_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dri_dir),
            log_json: env::var("KMSGRAB_LOG_JSON")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}
