use std::path::PathBuf;

use image::RgbImage;
use tracing::debug;

use super::CaptureSource;
use crate::error::{Result, ScanError};

/// Capture source backed by an existing image file. Used by `--image` mode:
/// the file is decoded once at start and every capture yields that frame,
/// flowing through the same recognition and sink steps as a live capture.
pub struct FileSource {
    path: PathBuf,
    frame: Option<RgbImage>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }
}

impl CaptureSource for FileSource {
    fn start(&mut self) -> Result<()> {
        let image = image::open(&self.path).map_err(|e| {
            ScanError::Capture(format!("failed to load {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "File source loaded");
        self.frame = Some(image.to_rgb8());
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        self.frame
            .clone()
            .ok_or_else(|| ScanError::CaptureNotReady("file source not started".to_string()))
    }

    fn stop(&mut self) {
        self.frame = None;
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame
            .as_ref()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.png");
        DynamicImage::new_rgb8(64, 48).save(&path).unwrap();

        let mut source = FileSource::new(&path);
        source.start().unwrap();
        assert_eq!(source.resolution(), (64, 48));

        let frame = source.capture_frame().unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
    }

    #[test]
    fn test_missing_file_fails_to_start() {
        let mut source = FileSource::new("/nonexistent/input.png");
        assert!(matches!(source.start(), Err(ScanError::Capture(_))));
    }

    #[test]
    fn test_capture_before_start_is_rejected() {
        let mut source = FileSource::new("/nonexistent/input.png");
        assert!(matches!(
            source.capture_frame(),
            Err(ScanError::CaptureNotReady(_))
        ));
    }
}
