//! Piper voice handle and `.onnx.json` config parsing.
//!
//! A Piper voice is a pair of files:
//!
//! ```text
//! id_ID-news_tts-medium.onnx        model weights
//! id_ID-news_tts-medium.onnx.json   config (sample rate, speakers, …)
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::SynthesisError;

/// Loaded voice.  Cheap to clone; cache it for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceModel {
    pub model_path: PathBuf,
    pub config_path: PathBuf,
    /// Output sample rate of the voice (Hz).
    pub sample_rate: u32,
    pub num_speakers: u32,
    /// eSpeak language code from the voice config, if present.
    pub language: Option<String>,
}

#[derive(Deserialize)]
struct PiperVoiceConfig {
    audio: PiperAudio,
    #[serde(default)]
    num_speakers: Option<u32>,
    #[serde(default)]
    espeak: Option<PiperEspeak>,
}

#[derive(Deserialize)]
struct PiperAudio {
    sample_rate: u32,
}

#[derive(Deserialize)]
struct PiperEspeak {
    voice: String,
}

/// `<model>.onnx` → `<model>.onnx.json`.
pub fn config_path_for(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

impl VoiceModel {
    /// Validate the model file and parse its config.
    ///
    /// # Errors
    ///
    /// - [`SynthesisError::ModelNotFound`] — the `.onnx` file is missing.
    /// - [`SynthesisError::ConfigNotFound`] — the `.onnx.json` is missing.
    /// - [`SynthesisError::MalformedConfig`] — the config is not valid JSON or
    ///   has no `audio.sample_rate`.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, SynthesisError> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(SynthesisError::ModelNotFound(model_path.to_path_buf()));
        }

        let config_path = config_path_for(model_path);
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|_| SynthesisError::ConfigNotFound(config_path.clone()))?;

        let config: PiperVoiceConfig = serde_json::from_str(&raw)
            .map_err(|e| SynthesisError::MalformedConfig(format!("{}: {e}", config_path.display())))?;

        if config.audio.sample_rate == 0 {
            return Err(SynthesisError::MalformedConfig(format!(
                "{}: audio.sample_rate is 0",
                config_path.display()
            )));
        }

        Ok(Self {
            model_path: model_path.to_path_buf(),
            config_path,
            sample_rate: config.audio.sample_rate,
            num_speakers: config.num_speakers.unwrap_or(1).max(1),
            language: config.espeak.map(|e| e.voice),
        })
    }
}
