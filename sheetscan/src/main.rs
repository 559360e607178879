use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sheetscan::capture::{CaptureSession, CaptureSource, FileSource};
use sheetscan::config::{CameraConfig, Config};
use sheetscan::ocr::OcrProvider;
use sheetscan::permission::{PermissionGate, PermissionState};
use sheetscan::pipeline::ScanPipeline;
use sheetscan::retention::RetentionManager;
use sheetscan::sink;

#[derive(Parser)]
#[command(name = "sheetscan")]
#[command(about = "Capture a photo, extract its text, append it to a spreadsheet")]
struct Args {
    /// Perform a single scan and exit
    #[arg(long)]
    once: bool,

    /// Scan an existing image file instead of the camera
    #[arg(long)]
    image: Option<PathBuf>,

    /// Camera device path (overrides CAMERA_DEVICE)
    #[arg(long)]
    device: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(device) = args.device {
        config.camera.device = device;
    }

    let source: Box<dyn CaptureSource> = match &args.image {
        Some(path) => Box::new(FileSource::new(path)),
        None => {
            let mut gate = PermissionGate::new(&config.camera.device);
            if gate.check_and_request() == PermissionState::Denied {
                anyhow::bail!("camera access denied; see the log output for remediation steps");
            }
            live_source(&config.camera)?
        }
    };

    let mut session = CaptureSession::new(&config.storage.capture_dir, &config.storage.extension);
    session.bind(source)?;

    tracing::info!("Initializing OCR provider...");
    let ocr = OcrProvider::new(&config.ocr)?;
    if !ocr.is_available() {
        tracing::warn!("OCR unavailable - scans will fail until tesseract is installed");
    }

    let row_sink = sink::from_config(&config.sheet);

    let pipeline = Arc::new(ScanPipeline::new(session, Arc::new(ocr), row_sink));
    let cancel_token = CancellationToken::new();

    if config.storage.retention_days > 0 {
        tracing::info!(
            "Starting retention sweep... (max_age_days={}, interval={}s)",
            config.storage.retention_days,
            config.storage.retention_sweep_interval_secs
        );
        let manager = RetentionManager::new(
            &config.storage.capture_dir,
            config.storage.retention_days,
            config.storage.retention_sweep_interval_secs,
        );
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Retention sweep shutting down...");
                        break;
                    }
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(manager.interval_secs())) => {
                        if let Err(e) = manager.run_once() {
                            tracing::error!("Retention sweep error: {}", e);
                        }
                    }
                }
            }
        });
    }

    if args.once || args.image.is_some() {
        let text = pipeline.scan_once(&cancel_token).await?;
        println!("{text}");
        cancel_token.cancel();
        return Ok(());
    }

    tracing::info!("Ready - press Enter to scan, 'q' then Enter to quit");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim() == "q" => break,
                Ok(Some(_)) => match pipeline.scan_once(&cancel_token).await {
                    Ok(text) if text.is_empty() => {
                        tracing::info!("Scan complete; no text detected")
                    }
                    Ok(text) => println!("{text}"),
                    // Terminal for this attempt only; the next trigger works.
                    Err(e) => tracing::error!("Scan failed: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read trigger input: {}", e);
                    break;
                }
            }
        }
    }

    tracing::info!("Shutting down...");
    cancel_token.cancel();
    Ok(())
}

fn live_source(config: &CameraConfig) -> anyhow::Result<Box<dyn CaptureSource>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(sheetscan::capture::V4l2Source::new(config)))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        anyhow::bail!("live camera capture is only supported on Linux; use --image <path>")
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
