//! Capture session and camera sources.
//!
//! A [`CaptureSession`] owns at most one live [`CaptureSource`] and exposes a
//! single "take a picture now" operation. The session moves through
//! `Uninitialized → Bound → Ready → Capturing → Ready`; rebinding first stops
//! the previous source so exactly one binding is ever live.
//!
//! Sources:
//! - [`V4l2Source`]: live webcam frames via V4L2 (Linux)
//! - [`FileSource`]: frames from an existing image file (`--image` mode)
//! - [`StubSource`]: canned frames with observable start/stop counts, for
//!   harness use

mod file;
mod stub;
#[cfg(target_os = "linux")]
mod v4l2;

pub use file::FileSource;
pub use stub::{StubCounters, StubSource};
#[cfg(target_os = "linux")]
pub use v4l2::V4l2Source;

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::error::{Result, ScanError};

/// One captured photo plus its on-disk location. Valid until consumed by
/// recognition; the file stays on disk after the struct is dropped.
pub struct StillImage {
    pub image: DynamicImage,
    pub path: PathBuf,
}

impl StillImage {
    /// File name of the persisted capture, for row provenance.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A source of camera frames.
pub trait CaptureSource: Send {
    /// Negotiate the stream and drain any warm-up frames.
    fn start(&mut self) -> Result<()>;

    /// Capture a single frame.
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Release the stream. Must be idempotent.
    fn stop(&mut self);

    /// Resolution of captured frames.
    fn resolution(&self) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Bound,
    Ready,
    Capturing,
}

pub struct CaptureSession {
    source: Option<Box<dyn CaptureSource>>,
    state: SessionState,
    dir: PathBuf,
    extension: String,
}

impl CaptureSession {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            source: None,
            state: SessionState::Uninitialized,
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Attach and start a source. Any previous source is stopped first, so
    /// exactly one binding is live at a time.
    pub fn bind(&mut self, mut source: Box<dyn CaptureSource>) -> Result<()> {
        if let Some(mut old) = self.source.take() {
            debug!("Rebinding capture session; stopping previous source");
            old.stop();
        }
        self.state = SessionState::Bound;

        if let Err(e) = source.start() {
            self.state = SessionState::Uninitialized;
            return Err(e);
        }

        let (width, height) = source.resolution();
        info!(width, height, "Capture session ready");
        self.source = Some(source);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Stop and release the current source, returning to Uninitialized.
    pub fn unbind(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.state = SessionState::Uninitialized;
    }

    /// Capture one frame and persist it under a timestamp-derived unique
    /// name. Rejected if the session is not Ready; the session returns to
    /// Ready whether the capture succeeds or fails.
    pub fn take_picture(&mut self) -> Result<StillImage> {
        if self.state != SessionState::Ready {
            return Err(ScanError::CaptureNotReady(format!(
                "capture requested in state {:?}",
                self.state
            )));
        }

        self.state = SessionState::Capturing;
        let result = self.capture_and_save();
        self.state = SessionState::Ready;
        result
    }

    fn capture_and_save(&mut self) -> Result<StillImage> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| ScanError::CaptureNotReady("no source bound".to_string()))?;

        let frame = source.capture_frame()?;

        std::fs::create_dir_all(&self.dir)?;
        let path = unique_capture_path(&self.dir, &self.extension, Utc::now().timestamp_millis());

        let image = DynamicImage::ImageRgb8(frame);
        image
            .save(&path)
            .map_err(|e| ScanError::Capture(format!("failed to save {}: {e}", path.display())))?;

        debug!(path = %path.display(), "Still image persisted");
        Ok(StillImage { image, path })
    }
}

/// Timestamp-named capture path, unique per call. Two captures within the
/// same millisecond get a `-N` suffix instead of silently overwriting.
fn unique_capture_path(dir: &Path, extension: &str, timestamp_millis: i64) -> PathBuf {
    let mut candidate = dir.join(format!("{timestamp_millis}.{extension}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{timestamp_millis}-{n}.{extension}"));
        n += 1;
    }
    candidate
}
