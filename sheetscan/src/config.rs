use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub device: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Frames drained after stream start so auto-exposure can settle.
    pub warmup_frames: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub capture_dir: PathBuf,
    pub extension: String,
    /// Captures older than this many days are swept. 0 disables the sweep.
    pub retention_days: u32,
    pub retention_sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub languages: String,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
    pub min_image_dimension: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetConfig {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub access_token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device: PathBuf::from(
                    env::var("CAMERA_DEVICE").unwrap_or_else(|_| "/dev/video0".to_string()),
                ),
                width: parse_env_or("CAMERA_WIDTH", 1280),
                height: parse_env_or("CAMERA_HEIGHT", 720),
                warmup_frames: parse_env_or("CAMERA_WARMUP_FRAMES", 3),
            },
            storage: StorageConfig {
                capture_dir: PathBuf::from(
                    env::var("CAPTURE_DIR").unwrap_or_else(|_| "captures".to_string()),
                ),
                extension: env::var("CAPTURE_FORMAT").unwrap_or_else(|_| "jpg".to_string()),
                retention_days: parse_env_or("RETENTION_DAYS", 0),
                retention_sweep_interval_secs: parse_env_or("RETENTION_SWEEP_INTERVAL", 3600),
            },
            ocr: OcrConfig {
                languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| "eng".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 30),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", 4096),
                min_image_dimension: parse_env_or("OCR_MIN_DIMENSION", 50),
            },
            sheet: SheetConfig {
                spreadsheet_id: env::var("SHEET_SPREADSHEET_ID").ok(),
                sheet_name: env::var("SHEET_NAME").unwrap_or_else(|_| "Sheet1".to_string()),
                access_token: env::var("SHEET_ACCESS_TOKEN").ok(),
                base_url: env::var("SHEET_BASE_URL").ok(),
                timeout_secs: parse_env_or("SHEET_TIMEOUT", 30),
                max_retries: parse_env_or("SHEET_MAX_RETRIES", 3),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
