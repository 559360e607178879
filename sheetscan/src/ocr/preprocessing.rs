use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat};

use crate::config::OcrConfig;
use crate::error::{Result, ScanError};

/// Prepare a captured frame for recognition.
///
/// Validates dimensions, downscales oversized frames, converts to grayscale
/// and stretches contrast, then encodes to PNG bytes for the OCR engine.
pub fn preprocess_frame(img: &DynamicImage, config: &OcrConfig) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    if width < config.min_image_dimension || height < config.min_image_dimension {
        return Err(ScanError::Ocr(format!(
            "frame too small for recognition: {}x{}, minimum {}",
            width, height, config.min_image_dimension
        )));
    }

    let img = resize_if_needed(img, config.max_image_dimension);
    let gray = stretch_contrast(img.to_luma8());

    let mut output = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| ScanError::Ocr(format!("failed to encode frame: {e}")))?;

    Ok(output)
}

/// Downscale so neither side exceeds `max_dim`, preserving aspect ratio.
fn resize_if_needed(img: &DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dim && height <= max_dim {
        return img.clone();
    }
    img.resize(max_dim, max_dim, image::imageops::FilterType::Lanczos3)
}

/// Histogram stretch: map the darkest pixel to 0 and the lightest to 255.
/// A flat frame is returned unchanged.
fn stretch_contrast(gray: GrayImage) -> GrayImage {
    let (mut min_val, mut max_val) = (255u8, 0u8);
    for pixel in gray.pixels() {
        min_val = min_val.min(pixel[0]);
        max_val = max_val.max(pixel[0]);
    }
    if max_val <= min_val {
        return gray;
    }

    let range = (max_val - min_val) as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let val = gray.get_pixel(x, y)[0];
        let stretched = ((val - min_val) as f32 / range * 255.0) as u8;
        image::Luma([stretched])
    })
}
