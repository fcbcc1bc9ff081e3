//! Core `Synthesizer` trait and the Piper implementation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use super::voice::VoiceModel;
use super::wav::{pcm16_from_le_bytes, write_wav};
use crate::config::{timestamped, TtsConfig};

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

/// All errors that can arise from the TTS subsystem.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The `.onnx` voice file was not found.
    #[error("voice model not found: {0}")]
    ModelNotFound(PathBuf),

    /// The `.onnx.json` voice config was not found.
    #[error("voice config not found: {0}")]
    ConfigNotFound(PathBuf),

    /// The voice config could not be parsed.
    #[error("malformed voice config: {0}")]
    MalformedConfig(String),

    /// Nothing to say.
    #[error("refusing to synthesize empty text")]
    EmptyText,

    /// The `piper` process could not be started or failed.
    #[error("piper failed: {0}")]
    Engine(String),

    /// Piper exited cleanly but produced no samples.
    #[error("piper produced no audio")]
    EmptyAudio,

    #[error("cannot write WAV: {0}")]
    Wav(String),

    #[error("audio storage error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Waveform
// ---------------------------------------------------------------------------

/// Synthesized speech stored as a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub samples: usize,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech synthesizers.
pub trait Synthesizer: Send + Sync {
    /// Load the voice at `model_path`.  Expensive; call once and cache.
    fn load_model(&self, model_path: &Path) -> Result<VoiceModel, SynthesisError>;

    /// Speak `text` with `voice` into a WAV file.
    fn synthesize(&self, voice: &VoiceModel, text: &str) -> Result<Waveform, SynthesisError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Synthesizer>) {}
};

// ---------------------------------------------------------------------------
// PiperEngine
// ---------------------------------------------------------------------------

/// Runs the `piper` CLI in `--output_raw` mode.
///
/// Piper streams 16-bit mono PCM on stdout; the samples are written to
/// `<audios>/output_<timestamp>.wav` at the voice's sample rate.
#[derive(Debug, Clone)]
pub struct PiperEngine {
    program: String,
    speaker: Option<u32>,
    length_scale: Option<f32>,
    audio_dir: PathBuf,
}

impl PiperEngine {
    pub fn new(config: &TtsConfig, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: config.program.clone(),
            speaker: config.speaker,
            length_scale: config.length_scale,
            audio_dir: audio_dir.into(),
        }
    }

    fn command(&self, voice: &VoiceModel) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--model")
            .arg(&voice.model_path)
            .arg("--config")
            .arg(&voice.config_path)
            .arg("--output_raw");

        if let Some(speaker) = self.speaker {
            if speaker < voice.num_speakers {
                cmd.arg("--speaker").arg(speaker.to_string());
            } else {
                log::warn!(
                    "tts: speaker {speaker} out of range for a {}-speaker voice; using default",
                    voice.num_speakers
                );
            }
        }
        if let Some(scale) = self.length_scale {
            cmd.arg("--length_scale").arg(scale.to_string());
        }
        cmd
    }

    /// Run piper and return the raw PCM bytes.
    fn run_piper(&self, voice: &VoiceModel, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let mut child = self
            .command(voice)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SynthesisError::Engine(format!("cannot start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SynthesisError::Engine("piper stdin unavailable".into()))?;

        // Piper reads one utterance per line.  Feed stdin from a helper thread
        // so a large stdout never deadlocks against a full stdin pipe.
        let line = format!("{}\n", text.replace('\n', " "));
        let output = std::thread::scope(|s| {
            s.spawn(move || {
                let _ = stdin.write_all(line.as_bytes());
            });
            child.wait_with_output()
        })
        .map_err(|e| SynthesisError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthesisError::Engine(format!("{}: {stderr}", output.status)));
        }
        Ok(output.stdout)
    }
}

impl Synthesizer for PiperEngine {
    fn load_model(&self, model_path: &Path) -> Result<VoiceModel, SynthesisError> {
        log::info!("tts: loading Piper voice {}", model_path.display());
        let voice = VoiceModel::load(model_path)?;
        log::info!("tts: voice ready, sample rate {} Hz", voice.sample_rate);
        Ok(voice)
    }

    fn synthesize(&self, voice: &VoiceModel, text: &str) -> Result<Waveform, SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let pcm = self.run_piper(voice, text)?;
        let samples = pcm16_from_le_bytes(&pcm);
        if samples.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        std::fs::create_dir_all(&self.audio_dir)?;
        let path = timestamped(&self.audio_dir, "output", "wav");
        write_wav(&path, voice.sample_rate, &samples)?;

        let waveform = Waveform {
            path,
            sample_rate: voice.sample_rate,
            samples: samples.len(),
        };
        log::info!(
            "tts: {:.1} s of audio written to {}",
            waveform.duration_secs(),
            waveform.path.display()
        );
        Ok(waveform)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
