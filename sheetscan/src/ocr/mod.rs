//! Text recognition.
//!
//! Converts a captured still image into plain text via Tesseract. The
//! recognizer runs on a blocking worker thread, bounded by a configurable
//! timeout and a cancellation token; an image with nothing legible in it
//! yields empty text, not an error.
//!
//! Captured frames are preprocessed before recognition (dimension checks,
//! downscale, grayscale, contrast stretch) — see [`preprocess_frame`].
//!
//! When Tesseract is not installed the provider degrades to an unavailable
//! backend that reports a clear error per recognition attempt instead of
//! failing startup.

mod preprocessing;
mod provider;

pub use preprocessing::preprocess_frame;
pub use provider::{OcrProvider, RecognizedText, TextRecognizer};
