use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use super::{CaptureError, CapturedFrame, FrameSource};
use crate::config::{timestamped, CameraConfig};

const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Grabs a single frame by running an external program.
///
/// Every `{output}` in the configured arguments is replaced with
/// `<captures>/capture_<timestamp>.png`.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    capture_dir: PathBuf,
}

impl CommandCamera {
    pub fn new(config: &CameraConfig, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            capture_dir: capture_dir.into(),
        }
    }

    fn build_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }
}

impl FrameSource for CommandCamera {
    fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        std::fs::create_dir_all(&self.capture_dir)?;
        let path = timestamped(&self.capture_dir, "capture", "png");
        // A frame from an earlier press in the same second must not be
        // mistaken for this one.
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("capture: replaced stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        log::info!("capture: grabbing one frame with {}", self.program);
        let output = Command::new(&self.program)
            .args(self.build_args(&path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CaptureError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(CaptureError::DeviceUnavailable(reason));
        }

        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                let _ = std::fs::remove_file(&path);
                return Err(CaptureError::EmptyFrame);
            }
            Err(_) => return Err(CaptureError::EmptyFrame),
        }

        log::info!("capture: frame saved to {}", path.display());
        Ok(CapturedFrame {
            path,
            captured_at: SystemTime::now(),
        })
    }
}
