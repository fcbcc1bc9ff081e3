use std::process::{Command, Stdio};

use super::{PlaybackError, Player};
use crate::tts::Waveform;

/// Plays WAV files with ALSA's `aplay`.
#[derive(Debug, Clone)]
pub struct AplayPlayer {
    program: String,
    device: Option<String>,
}

impl AplayPlayer {
    pub fn new(device: Option<String>) -> Self {
        Self::with_program("aplay", device)
    }

    pub fn with_program(program: impl Into<String>, device: Option<String>) -> Self {
        Self {
            program: program.into(),
            device,
        }
    }

    fn args(&self, waveform: &Waveform) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(device) = &self.device {
            args.push("-D".to_string());
            args.push(device.clone());
        }
        args.push("-q".to_string());
        args.push(waveform.path.to_string_lossy().into_owned());
        args
    }
}

impl Player for AplayPlayer {
    fn play(&self, waveform: &Waveform) -> Result<(), PlaybackError> {
        if !waveform.path.is_file() {
            return Err(PlaybackError::MissingFile(waveform.path.clone()));
        }

        log::info!(
            "playback: {} {}",
            self.program,
            self.device.as_deref().unwrap_or("(default device)")
        );
        let output = Command::new(&self.program)
            .args(self.args(waveform))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| PlaybackError::Process(format!("cannot start {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PlaybackError::Device(format!("{}: {stderr}", output.status)));
        }
        Ok(())
    }
}
