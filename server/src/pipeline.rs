//! Capture Pipeline
//!
//! One capture end to end: frame source → pixel conversion → optional
//! resampling → image encoding. Resources of each stage are released before
//! the next stage starts, or on the way out of a failure.

use std::path::PathBuf;

use kg_frame::convert::to_canonical;
use kg_frame::resample::resize;
use kg_frame::size::resolve_output_size;
use kg_frame::FrameError;
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::{CaptureError, DisplayBackend, FrameSource};
use crate::config::CaptureSettings;
use crate::encode::{encode, EncodeError, OutputFormat};
use crate::privilege::{KeepPrivileges, PrivilegeError, PrivilegePolicy};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
}

/// What a successful capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub source: (u32, u32),
    pub output: (u32, u32),
    pub format: OutputFormat,
    pub destination: PathBuf,
}

/// Anything that can perform a fully configured capture.
pub trait CaptureHandler: Send + Sync + 'static {
    fn capture(&self) -> Result<CaptureReport, PipelineError>;
}

pub struct CapturePipeline<B> {
    source: FrameSource<B>,
    privileges: Box<dyn PrivilegePolicy>,
}

impl<B: DisplayBackend> CapturePipeline<B> {
    pub fn new(backend: B) -> Self {
        Self {
            source: FrameSource::new(backend),
            privileges: Box::new(KeepPrivileges),
        }
    }

    /// Replace the policy applied around writing the output file.
    #[must_use]
    pub fn with_privileges(mut self, policy: impl PrivilegePolicy + 'static) -> Self {
        self.privileges = Box::new(policy);
        self
    }

    pub const fn source(&self) -> &FrameSource<B> {
        &self.source
    }

    /// Capture the displayed frame and write it to `settings.destination`.
    pub fn run(&self, settings: &CaptureSettings) -> Result<CaptureReport, PipelineError> {
        let (descriptor, raw) = self.source.capture_frame()?;
        let source = (descriptor.width, descriptor.height);

        let output = resolve_output_size((settings.width, settings.height), source)?;

        let canonical = to_canonical(&raw)?;
        drop(raw);

        let resized;
        let frame = if output == source {
            &canonical
        } else {
            debug!(
                from = ?source,
                to = ?output,
                mode = ?settings.scale_mode,
                "Resampling"
            );
            resized = resize(&canonical, output.0, output.1, settings.scale_mode)?;
            &resized
        };

        let format = OutputFormat::from_path(&settings.destination);
        let scope = self.privileges.enter_write_scope()?;
        encode(frame, format, settings.quality, &settings.destination)?;
        drop(scope);

        info!(
            path = %settings.destination.display(),
            %format,
            width = output.0,
            height = output.1,
            "Screenshot saved"
        );

        Ok(CaptureReport {
            source,
            output,
            format,
            destination: settings.destination.clone(),
        })
    }
}

/// A pipeline bound to fixed settings, as served by the capture service.
pub struct ConfiguredPipeline<B> {
    pipeline: CapturePipeline<B>,
    settings: CaptureSettings,
}

impl<B> ConfiguredPipeline<B> {
    pub const fn new(pipeline: CapturePipeline<B>, settings: CaptureSettings) -> Self {
        Self { pipeline, settings }
    }
}

impl<B> CaptureHandler for ConfiguredPipeline<B>
where
    B: DisplayBackend + Send + Sync + 'static,
{
    fn capture(&self) -> Result<CaptureReport, PipelineError> {
        self.pipeline.run(&self.settings)
    }
}
