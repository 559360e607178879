use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture session not ready: {0}")]
    CaptureNotReady(String),

    #[error("A scan is already in flight")]
    Busy,

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Recognition cancelled")]
    Cancelled,

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Sink authentication error: {0}")]
    SinkAuth(String),

    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::error::ImageError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
