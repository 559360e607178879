//! Capture retention sweep.
//!
//! Capture files accumulate without bound otherwise. The sweep is opt-in
//! (`RETENTION_DAYS=0` disables it) and ages files by the millisecond
//! timestamp in their names, so it only ever touches capture files.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use tracing::{debug, error, info};

use crate::error::Result;

#[derive(Clone)]
pub struct RetentionManager {
    dir: PathBuf,
    max_age_days: u32,
    interval_secs: u64,
}

impl RetentionManager {
    pub fn new(dir: impl Into<PathBuf>, max_age_days: u32, interval_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            max_age_days,
            interval_secs,
        }
    }

    /// Run a single sweep.
    ///
    /// Deletes captures older than the configured age. Continues past
    /// individual delete failures. Returns the number of files removed.
    pub fn run_once(&self) -> Result<u64> {
        if self.max_age_days == 0 {
            return Ok(0);
        }
        if !self.dir.exists() {
            return Ok(0);
        }

        let cutoff =
            (Utc::now() - Duration::days(self.max_age_days as i64)).timestamp_millis();

        let mut removed = 0u64;
        let mut errors = 0u32;

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some(timestamp) = capture_timestamp_millis(&path) else {
                continue;
            };
            if timestamp >= cutoff {
                continue;
            }

            debug!(path = %path.display(), "Sweeping expired capture");
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    error!("Failed to remove {}: {}", path.display(), e);
                    errors += 1;
                }
            }
        }

        if removed > 0 || errors > 0 {
            info!(removed, errors, "Retention sweep complete");
        }
        Ok(removed)
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}

/// Millisecond timestamp encoded in a capture file name, e.g.
/// `1700000000000.jpg` or `1700000000000-2.jpg`. Returns None for anything
/// that is not a capture file.
fn capture_timestamp_millis(path: &Path) -> Option<i64> {
    let stem = path.file_stem()?.to_str()?;
    let millis = stem.split('-').next()?;
    millis.parse().ok()
}
