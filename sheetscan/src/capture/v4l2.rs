use image::RgbImage;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::CaptureSource;
use crate::config::CameraConfig;
use crate::error::{Result, ScanError};

const MJPG: FourCC = FourCC { repr: *b"MJPG" };
const YUYV: FourCC = FourCC { repr: *b"YUYV" };
const RGB3: FourCC = FourCC { repr: *b"RGB3" };

/// Live webcam source via V4L2.
///
/// The device stays open for the lifetime of the binding; the memory-mapped
/// stream is negotiated per capture so each shot gets freshly exposed frames
/// after the configured warm-up.
pub struct V4l2Source {
    config: CameraConfig,
    device: Option<Device>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl V4l2Source {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            config: config.clone(),
            device: None,
            width: 0,
            height: 0,
            fourcc: MJPG,
        }
    }
}

impl CaptureSource for V4l2Source {
    fn start(&mut self) -> Result<()> {
        let device = Device::with_path(&self.config.device).map_err(|e| {
            ScanError::Capture(format!(
                "failed to open {}: {e}",
                self.config.device.display()
            ))
        })?;

        let mut fmt = device
            .format()
            .map_err(|e| ScanError::Capture(format!("failed to query format: {e}")))?;
        fmt.width = self.config.width;
        fmt.height = self.config.height;
        fmt.fourcc = MJPG;

        // The driver may substitute its own resolution or pixel format;
        // whatever comes back is what decode_frame must handle.
        let fmt = device
            .set_format(&fmt)
            .map_err(|e| ScanError::Capture(format!("failed to set format: {e}")))?;

        if fmt.fourcc != MJPG && fmt.fourcc != YUYV && fmt.fourcc != RGB3 {
            return Err(ScanError::Capture(format!(
                "device negotiated unsupported pixel format {}",
                fmt.fourcc
            )));
        }
        if fmt.width != self.config.width || fmt.height != self.config.height {
            warn!(
                requested_width = self.config.width,
                requested_height = self.config.height,
                actual_width = fmt.width,
                actual_height = fmt.height,
                "Driver adjusted capture resolution"
            );
        }

        info!(
            device = %self.config.device.display(),
            format = %fmt.fourcc,
            width = fmt.width,
            height = fmt.height,
            "Camera stream negotiated"
        );

        self.width = fmt.width;
        self.height = fmt.height;
        self.fourcc = fmt.fourcc;
        self.device = Some(device);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        let (width, height, fourcc) = (self.width, self.height, self.fourcc);
        let warmup = self.config.warmup_frames;

        let device = self
            .device
            .as_mut()
            .ok_or_else(|| ScanError::CaptureNotReady("camera not started".to_string()))?;

        let mut stream = Stream::with_buffers(device, Type::VideoCapture, 4)
            .map_err(|e| ScanError::Capture(format!("failed to start stream: {e}")))?;

        // Sensors deliver dark frames until auto-exposure settles.
        for _ in 0..warmup {
            stream
                .next()
                .map_err(|e| ScanError::Capture(format!("warm-up frame failed: {e}")))?;
        }

        let (buf, meta) = stream
            .next()
            .map_err(|e| ScanError::Capture(format!("frame read failed: {e}")))?;

        let used = meta.bytesused as usize;
        let data = if used > 0 && used <= buf.len() {
            &buf[..used]
        } else {
            buf
        };
        debug!(bytes = data.len(), "Frame captured");

        decode_frame(fourcc, width, height, data)
    }

    fn stop(&mut self) {
        self.device = None;
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn decode_frame(fourcc: FourCC, width: u32, height: u32, data: &[u8]) -> Result<RgbImage> {
    if fourcc == MJPG {
        let image = image::load_from_memory(data)
            .map_err(|e| ScanError::Capture(format!("failed to decode MJPG frame: {e}")))?;
        Ok(image.to_rgb8())
    } else if fourcc == YUYV {
        yuyv_to_rgb(data, width, height)
    } else if fourcc == RGB3 {
        let expected = (width * height * 3) as usize;
        if data.len() < expected {
            return Err(ScanError::Capture(format!(
                "short RGB frame: {} bytes, expected {expected}",
                data.len()
            )));
        }
        RgbImage::from_raw(width, height, data[..expected].to_vec())
            .ok_or_else(|| ScanError::Capture("invalid RGB frame buffer".to_string()))
    } else {
        Err(ScanError::Capture(format!(
            "unsupported pixel format {fourcc}"
        )))
    }
}

/// Packed YUYV 4:2:2 to RGB, BT.601 integer math.
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(ScanError::Capture(format!(
            "short YUYV frame: {} bytes, expected {expected}",
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as i32;
        let u = chunk[1] as i32 - 128;
        let y1 = chunk[2] as i32;
        let v = chunk[3] as i32 - 128;

        for y in [y0, y1] {
            let c = 298 * (y - 16);
            let r = (c + 409 * v + 128) >> 8;
            let g = (c - 100 * u - 208 * v + 128) >> 8;
            let b = (c + 516 * u + 128) >> 8;
            rgb.push(r.clamp(0, 255) as u8);
            rgb.push(g.clamp(0, 255) as u8);
            rgb.push(b.clamp(0, 255) as u8);
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ScanError::Capture("invalid YUYV frame buffer".to_string()))
}
