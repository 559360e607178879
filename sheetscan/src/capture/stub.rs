use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use image::RgbImage;

use super::CaptureSource;
use crate::error::{Result, ScanError};

/// Observable start/stop counts for a [`StubSource`], shared with the test
/// harness after the source has been boxed into a session.
#[derive(Clone, Default)]
pub struct StubCounters {
    started: Arc<AtomicU32>,
    stopped: Arc<AtomicU32>,
    captured: Arc<AtomicU32>,
}

impl StubCounters {
    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> u32 {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> u32 {
        self.captured.load(Ordering::SeqCst)
    }
}

/// Canned-frame capture source. Stands in for a live camera wherever a
/// deterministic frame and observable lifecycle are needed.
pub struct StubSource {
    frame: RgbImage,
    counters: StubCounters,
    fail_start: Arc<AtomicBool>,
    fail_next_capture: Arc<AtomicBool>,
}

impl StubSource {
    pub fn new(frame: RgbImage) -> Self {
        Self {
            frame,
            counters: StubCounters::default(),
            fail_start: Arc::new(AtomicBool::new(false)),
            fail_next_capture: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn counters(&self) -> StubCounters {
        self.counters.clone()
    }

    /// Make the next (and only the next) capture_frame call fail.
    pub fn fail_next_capture(&self) {
        self.fail_next_capture.store(true, Ordering::SeqCst);
    }

    /// Make start() fail.
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }
}

impl CaptureSource for StubSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ScanError::Capture("stub source refused to start".to_string()));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        if self.fail_next_capture.swap(false, Ordering::SeqCst) {
            return Err(ScanError::Capture("stub frame unavailable".to_string()));
        }
        self.counters.captured.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}
