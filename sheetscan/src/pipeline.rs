//! The scan pipeline: capture → recognize → append.
//!
//! One trigger produces at most one still image, one recognition pass, and
//! one sink append. A single-flight guard rejects overlapping triggers, so
//! at most one still image is ever in flight. Every failure is terminal for
//! the current attempt and leaves the capture session Ready for the next
//! trigger; nothing is retried here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capture::CaptureSession;
use crate::error::{Result, ScanError};
use crate::ocr::{RecognizedText, TextRecognizer};
use crate::sink::{RowSink, SheetRow};

pub struct ScanPipeline {
    session: Arc<Mutex<CaptureSession>>,
    recognizer: Arc<dyn TextRecognizer>,
    sink: Arc<dyn RowSink>,
    in_flight: AtomicBool,
}

impl ScanPipeline {
    pub fn new(
        session: CaptureSession,
        recognizer: Arc<dyn TextRecognizer>,
        sink: Arc<dyn RowSink>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            recognizer,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Handle on the capture session, for rebinding.
    pub fn session(&self) -> Arc<Mutex<CaptureSession>> {
        Arc::clone(&self.session)
    }

    /// Run one capture → recognize → append cycle.
    ///
    /// Returns the recognized text (possibly empty; an empty result is still
    /// appended, matching the capture-everything contract). Rejected with
    /// [`ScanError::Busy`] while a previous cycle is still in flight.
    pub async fn scan_once(&self, cancel: &CancellationToken) -> Result<RecognizedText> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let session = Arc::clone(&self.session);
        let still = tokio::task::spawn_blocking(move || session.blocking_lock().take_picture())
            .await
            .map_err(|e| ScanError::Capture(format!("capture task panicked: {e}")))??;

        info!(path = %still.path.display(), "Captured still image");
        let source = still.file_name();

        let text = self.recognizer.recognize(still, cancel).await?;
        if text.is_empty() {
            info!("No legible text in capture");
        }

        self.sink
            .append(SheetRow::new(text.as_str(), source))
            .await?;

        Ok(text)
    }
}

/// Releases the single-flight slot when the cycle ends, on every path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ScanError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_second_acquire() {
        let flag = AtomicBool::new(false);
        let first = InFlightGuard::acquire(&flag).unwrap();
        assert!(matches!(
            InFlightGuard::acquire(&flag),
            Err(ScanError::Busy)
        ));
        drop(first);
        assert!(InFlightGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = InFlightGuard::acquire(&flag).unwrap();
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
