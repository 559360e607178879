//! Camera permission gate.
//!
//! Captures cannot start until the configured device node has been probed.
//! The probe result is terminal for the session: a denial is reported once,
//! together with the manual remediation steps, and the user is expected to
//! fix device access and run the program again.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

pub struct PermissionGate {
    device: PathBuf,
    state: PermissionState,
}

impl PermissionGate {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            state: PermissionState::Unknown,
        }
    }

    /// Probe the device node once. Granted and Denied are terminal; repeated
    /// calls return the first result without re-probing.
    pub fn check_and_request(&mut self) -> PermissionState {
        if self.state != PermissionState::Unknown {
            return self.state;
        }

        self.state = match probe(&self.device) {
            Ok(()) => {
                info!(device = %self.device.display(), "Camera access granted");
                PermissionState::Granted
            }
            Err(e) => {
                error!("Camera access denied: {}", denial_message(&self.device, &e));
                for line in remediation_steps(&self.device) {
                    warn!("{}", line);
                }
                PermissionState::Denied
            }
        };
        self.state
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }
}

fn probe(device: &Path) -> std::io::Result<()> {
    // Opening read-only is enough to distinguish a missing node from one the
    // current user may not touch; no frame is read here.
    std::fs::metadata(device)?;
    OpenOptions::new().read(true).open(device)?;
    Ok(())
}

/// Manual recovery instructions, printed on denial. This is the only
/// recovery path; the gate never re-prompts within a session.
pub fn remediation_steps(device: &Path) -> Vec<String> {
    vec![
        format!(
            "Camera access to {} is required to scan. To grant it manually:",
            device.display()
        ),
        "  - check the device exists: ls -l /dev/video*".to_string(),
        "  - add your user to the device's owning group (usually 'video'):".to_string(),
        "      sudo usermod -aG video $USER".to_string(),
        "  - log out and back in, then run sheetscan again".to_string(),
    ]
}

/// Maps a probe failure to the user-facing denial message.
pub fn denial_message(device: &Path, err: &std::io::Error) -> String {
    match err.kind() {
        ErrorKind::NotFound => format!("camera device {} does not exist", device.display()),
        ErrorKind::PermissionDenied => {
            format!("no read access to camera device {}", device.display())
        }
        _ => format!("cannot open camera device {}: {}", device.display(), err),
    }
}
