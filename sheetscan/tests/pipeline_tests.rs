mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{test_frame, GatedRecognizer, RecordingSink, StubRecognizer};
use sheetscan::capture::{CaptureSession, SessionState, StubSource};
use sheetscan::error::ScanError;
use sheetscan::permission::{PermissionGate, PermissionState};
use sheetscan::pipeline::ScanPipeline;

fn bound_session(dir: &TempDir) -> CaptureSession {
    let mut session = CaptureSession::new(dir.path(), "jpg");
    session
        .bind(Box::new(StubSource::new(test_frame())))
        .unwrap();
    session
}

#[tokio::test]
async fn test_denied_permission_makes_capture_a_noop() {
    let dir = TempDir::new().unwrap();

    // A denied gate means the session is never bound.
    let mut gate = PermissionGate::new("/nonexistent/video99");
    assert_eq!(gate.check_and_request(), PermissionState::Denied);

    let session = CaptureSession::new(dir.path(), "jpg");
    let sink = RecordingSink::new();
    let pipeline = ScanPipeline::new(
        session,
        Arc::new(StubRecognizer::new("unused")),
        sink.clone(),
    );

    let cancel = CancellationToken::new();
    let result = pipeline.scan_once(&cancel).await;

    assert!(matches!(result, Err(ScanError::CaptureNotReady(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(sink.rows().await.is_empty());
}

#[tokio::test]
async fn test_consecutive_scans_write_distinct_files() {
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new();
    let pipeline = ScanPipeline::new(
        bound_session(&dir),
        Arc::new(StubRecognizer::new("text")),
        sink.clone(),
    );

    let cancel = CancellationToken::new();
    pipeline.scan_once(&cancel).await.unwrap();
    pipeline.scan_once(&cancel).await.unwrap();

    let rows = sink.rows().await;
    assert_eq!(rows.len(), 2);
    assert_ne!(rows[0].source, rows[1].source, "capture files must not collide");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn test_recognition_failure_leaves_pipeline_usable() {
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new();
    let recognizer = StubRecognizer::new("second try").failing_first(1);
    let calls = recognizer.calls();
    let pipeline = ScanPipeline::new(bound_session(&dir), Arc::new(recognizer), sink.clone());

    let cancel = CancellationToken::new();

    let first = pipeline.scan_once(&cancel).await;
    assert!(matches!(first, Err(ScanError::Ocr(_))));
    assert!(sink.rows().await.is_empty(), "failed scan must not reach the sink");

    // The session is Ready again; a fresh trigger completes end to end.
    let second = pipeline.scan_once(&cancel).await.unwrap();
    assert_eq!(second.as_str(), "second try");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(sink.rows().await.len(), 1);
}

#[tokio::test]
async fn test_invoice_text_reaches_sink_exactly_once() {
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new();
    let pipeline = ScanPipeline::new(
        bound_session(&dir),
        Arc::new(StubRecognizer::new("INVOICE 42\nTotal: $100")),
        sink.clone(),
    );

    let cancel = CancellationToken::new();
    let text = pipeline.scan_once(&cancel).await.unwrap();
    assert!(text.as_str().contains("INVOICE 42"));

    let rows = sink.rows().await;
    assert_eq!(rows.len(), 1, "store must be invoked exactly once");
    assert!(rows[0].text.contains("INVOICE 42"));
    assert!(rows[0].source.ends_with(".jpg"));
}

#[tokio::test]
async fn test_empty_recognition_is_still_appended() {
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new();
    let pipeline = ScanPipeline::new(
        bound_session(&dir),
        Arc::new(StubRecognizer::new("")),
        sink.clone(),
    );

    let cancel = CancellationToken::new();
    let text = pipeline.scan_once(&cancel).await.unwrap();
    assert!(text.is_empty());

    let rows = sink.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text, "");
}

#[tokio::test]
async fn test_overlapping_scan_is_rejected_as_busy() {
    let dir = TempDir::new().unwrap();
    let (recognizer, release) = GatedRecognizer::new();
    let pipeline = Arc::new(ScanPipeline::new(
        bound_session(&dir),
        Arc::new(recognizer),
        RecordingSink::new(),
    ));

    let cancel = CancellationToken::new();
    let background = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.scan_once(&cancel).await })
    };

    // Let the first scan claim the single-flight slot, then trigger again.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let second = pipeline.scan_once(&cancel).await;
    assert!(matches!(second, Err(ScanError::Busy)));

    release.notify_one();
    let first = background.await.unwrap().unwrap();
    assert_eq!(first.as_str(), "released");
}

#[tokio::test]
async fn test_rebinding_leaves_exactly_one_live_source() {
    let dir = TempDir::new().unwrap();
    let pipeline = ScanPipeline::new(
        bound_session(&dir),
        Arc::new(StubRecognizer::new("text")),
        RecordingSink::new(),
    );

    let replacement = StubSource::new(test_frame());
    let counters = replacement.counters();

    {
        let session = pipeline.session();
        let mut session = session.lock().await;
        session.bind(Box::new(replacement)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        // Rebind once more: the replacement must be stopped exactly once.
        session
            .bind(Box::new(StubSource::new(test_frame())))
            .unwrap();
    }

    assert_eq!(counters.started(), 1);
    assert_eq!(counters.stopped(), 1);

    // The newest binding still captures.
    let cancel = CancellationToken::new();
    assert!(pipeline.scan_once(&cancel).await.is_ok());
}
