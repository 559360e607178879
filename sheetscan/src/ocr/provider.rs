use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leptess::LepTess;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::StillImage;
use crate::config::OcrConfig;
use crate::error::{Result, ScanError};

use super::preprocess_frame;

/// Plain text produced by one recognition pass. Empty when nothing legible
/// was found — that is a successful result, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognizedText(String);

impl RecognizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecognizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts a still image into plain text. Exactly one success (possibly
/// empty) or failure per call; the image is consumed either way.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(
        &self,
        still: StillImage,
        cancel: &CancellationToken,
    ) -> Result<RecognizedText>;
}

#[derive(Clone)]
enum OcrBackend {
    Local { tesseract: Arc<Mutex<LepTess>> },
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let backend = match LepTess::new(None, &config.languages) {
            Ok(lt) => {
                info!(languages = %config.languages, "Tesseract OCR initialized");
                OcrBackend::Local {
                    tesseract: Arc::new(Mutex::new(lt)),
                }
            }
            Err(e) => {
                let reason = format!("Tesseract not available: {e}");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    async fn recognize_inner(&self, still: StillImage) -> Result<RecognizedText> {
        let tesseract = match &self.backend {
            OcrBackend::Local { tesseract } => Arc::clone(tesseract),
            OcrBackend::Unavailable { reason } => {
                return Err(ScanError::OcrUnavailable(reason.clone()));
            }
        };

        let bytes = preprocess_frame(&still.image, &self.config)?;
        debug!(path = %still.path.display(), "Still image consumed by recognition");
        drop(still);

        let text = tokio::task::spawn_blocking(move || {
            let mut lt = tesseract.blocking_lock();
            lt.set_image_from_mem(&bytes)
                .map_err(|e| ScanError::Ocr(format!("failed to set image: {e}")))?;
            lt.get_utf8_text()
                .map_err(|e| ScanError::Ocr(format!("failed to extract text: {e}")))
        })
        .await
        .map_err(|e| ScanError::Ocr(format!("OCR task panicked: {e}")))??;

        Ok(RecognizedText::new(text.trim()))
    }
}

#[async_trait]
impl TextRecognizer for OcrProvider {
    async fn recognize(
        &self,
        still: StillImage,
        cancel: &CancellationToken,
    ) -> Result<RecognizedText> {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        // Cancellation abandons the await; the blocking tesseract call runs
        // to completion in the background and its result is dropped.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = tokio::time::timeout(timeout, self.recognize_inner(still)) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ScanError::Ocr(format!(
                    "recognition timed out after {} seconds",
                    self.config.timeout_secs
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::path::PathBuf;

    fn test_config() -> OcrConfig {
        OcrConfig {
            languages: "eng".to_string(),
            timeout_secs: 30,
            max_image_dimension: 4096,
            min_image_dimension: 50,
        }
    }

    fn test_still() -> StillImage {
        StillImage {
            image: DynamicImage::new_rgb8(100, 100),
            path: PathBuf::from("captures/1700000000000.jpg"),
        }
    }

    #[test]
    fn test_provider_construction_never_fails() {
        // Without a tesseract installation this degrades to Unavailable.
        let result = OcrProvider::new(&test_config());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_backend_reports_per_attempt() {
        let provider = OcrProvider {
            backend: OcrBackend::Unavailable {
                reason: "tesseract missing".to_string(),
            },
            config: test_config(),
        };

        let cancel = CancellationToken::new();
        let result = provider.recognize(test_still(), &cancel).await;
        assert!(matches!(result, Err(ScanError::OcrUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_recognition() {
        let provider = OcrProvider {
            backend: OcrBackend::Unavailable {
                reason: "unused".to_string(),
            },
            config: test_config(),
        };

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = provider.recognize(test_still(), &cancel).await;
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }

    #[test]
    fn test_recognized_text_empty_is_success_shaped() {
        let text = RecognizedText::new("");
        assert!(text.is_empty());
        assert_eq!(text.as_str(), "");
    }

    #[test]
    fn test_recognized_text_display() {
        let text = RecognizedText::new("INVOICE 42");
        assert_eq!(text.to_string(), "INVOICE 42");
        assert_eq!(text.into_inner(), "INVOICE 42");
    }
}
