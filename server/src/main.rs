//! kmsgrab - Main Entry Point
//!
//! Captures the active KMS plane to a PNG or JPEG file, once or on request
//! over a control socket.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kg_frame::ScaleMode;
use tracing::{error, info};

use kg_server::capture::kms::DrmBackend;
use kg_server::config::{CaptureSettings, Config};
use kg_server::encode::Quality;
use kg_server::observability;
use kg_server::pipeline::{CapturePipeline, ConfiguredPipeline};
use kg_server::privilege::DropToRealUser;
use kg_server::service::CaptureService;

#[derive(Debug, Parser)]
#[command(name = "kmsgrab")]
#[command(about = "Screenshot the KMS/DRM display without a display server")]
#[command(version)]
struct Args {
    /// Log each step of the capture
    #[arg(short, long)]
    verbose: bool,

    /// Use bilinear interpolation when resizing
    #[arg(long)]
    bilinear: bool,

    /// Stay resident and capture on `GRAB` requests
    #[arg(long)]
    daemon: bool,

    /// Control socket path for --daemon
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Output width, 0 to infer from the height
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Output height, 0 to infer from the width
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// JPEG quality, clamped to 1-100
    #[arg(long, allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Write the output file as the real user of a setuid binary
    #[arg(long)]
    drop_privileges: bool,

    /// Log JSON lines instead of plain text
    #[arg(long)]
    json_logs: bool,

    /// Output file; a .jpg or .jpeg suffix selects JPEG, anything else PNG
    output: PathBuf,
}

impl Args {
    fn capture_settings(&self, config: &Config) -> CaptureSettings {
        CaptureSettings {
            destination: self.output.clone(),
            width: self.width,
            height: self.height,
            quality: self.quality.map_or(config.quality, Quality::clamped),
            scale_mode: if self.bilinear {
                ScaleMode::Bilinear
            } else {
                config.scale_mode
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    observability::init(args.verbose, args.json_logs || config.log_json)
        .context("Failed to initialize logging")?;

    let settings = args.capture_settings(&config);
    let mut pipeline = CapturePipeline::new(DrmBackend::new(&config.dri_dir));
    if args.drop_privileges {
        pipeline = pipeline.with_privileges(DropToRealUser);
    }

    if args.daemon {
        let socket = args.socket.unwrap_or(config.socket_path);
        info!(
            version = env!("CARGO_PKG_VERSION"),
            socket = %socket.display(),
            output = %settings.destination.display(),
            "Starting capture service"
        );

        let service = CaptureService::bind(socket, ConfiguredPipeline::new(pipeline, settings))?;
        service.serve(shutdown_signal()).await?;
        return Ok(());
    }

    let destination = settings.destination.clone();
    tokio::task::spawn_blocking(move || pipeline.run(&settings))
        .await
        .context("Capture task did not complete")?
        .with_context(|| format!("Failed to capture to {}", destination.display()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
