#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use sheetscan::capture::StillImage;
use sheetscan::error::{Result, ScanError};
use sheetscan::ocr::{RecognizedText, TextRecognizer};
use sheetscan::sink::{RowSink, SheetRow};

/// A deterministic camera frame.
pub fn test_frame() -> RgbImage {
    RgbImage::from_fn(64, 48, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgb([255, 255, 255])
        } else {
            image::Rgb([0, 0, 0])
        }
    })
}

/// Recognizer returning canned text, with an optional number of leading
/// failures and a call counter.
pub struct StubRecognizer {
    text: String,
    fail_first: AtomicU32,
    calls: Arc<AtomicU32>,
}

impl StubRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fail_first: AtomicU32::new(0),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the first `n` recognition calls before succeeding.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = AtomicU32::new(n);
        self
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TextRecognizer for StubRecognizer {
    async fn recognize(
        &self,
        _still: StillImage,
        _cancel: &CancellationToken,
    ) -> Result<RecognizedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ScanError::Ocr("stub recognition failure".to_string()));
        }
        Ok(RecognizedText::new(self.text.clone()))
    }
}

/// Recognizer that parks until released, for exercising the single-flight
/// guard.
pub struct GatedRecognizer {
    release: Arc<Notify>,
}

impl GatedRecognizer {
    pub fn new() -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        (
            Self {
                release: Arc::clone(&release),
            },
            release,
        )
    }
}

#[async_trait]
impl TextRecognizer for GatedRecognizer {
    async fn recognize(
        &self,
        _still: StillImage,
        _cancel: &CancellationToken,
    ) -> Result<RecognizedText> {
        self.release.notified().await;
        Ok(RecognizedText::new("released"))
    }
}

/// Sink that records every appended row.
#[derive(Default)]
pub struct RecordingSink {
    rows: Mutex<Vec<SheetRow>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn rows(&self) -> Vec<SheetRow> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn append(&self, row: SheetRow) -> Result<()> {
        self.rows.lock().await.push(row);
        Ok(())
    }
}
