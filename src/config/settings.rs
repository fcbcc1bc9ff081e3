//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{AppPaths, ArtifactDirs};
use crate::trigger::Edge;

// ---------------------------------------------------------------------------
// ButtonConfig
// ---------------------------------------------------------------------------

/// Push-button wiring and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Key name the button is reported as (e.g. `"F9"`).  See
    /// [`crate::trigger::parse_key`].
    pub key: String,
    /// Which transition counts as a press.  The button is wired active-low,
    /// so pressing it is a falling edge.
    pub edge: Edge,
    /// Minimum spacing between two accepted presses.
    pub debounce_ms: u64,
    /// Scheduler poll period.
    pub poll_interval_ms: u64,
}

impl ButtonConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            key: "F9".into(),
            edge: Edge::Falling,
            debounce_ms: 150,
            poll_interval_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// External frame grabber invocation.
///
/// `{output}` inside `args` is replaced with the destination image path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let args = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "v4l2",
            "-i",
            "/dev/video0",
            "-frames:v",
            "1",
            "-y",
            "{output}",
        ];
        Self {
            program: "ffmpeg".into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// VisionConfig
// ---------------------------------------------------------------------------

/// Settings for the vision-language description step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Multimodal model name as known to Ollama.
    pub model: String,
    /// Instruction sent together with every frame.
    pub prompt: String,
    /// Maximum seconds to wait for a description.  Inference on the board can
    /// take tens of seconds, so keep this generous.
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "customGemma3".into(),
            prompt: "Apa yang kamu lihat dari gambar ini? Jelaskan singkat dalam bahasa Indonesia."
                .into(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the Piper speech synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Path or name of the `piper` executable.
    pub program: String,
    /// Path to the `.onnx` voice.  Its `.onnx.json` config must sit next to it.
    pub model_path: PathBuf,
    /// Speaker id for multi-speaker voices.
    pub speaker: Option<u32>,
    /// Speaking rate; values above 1.0 slow speech down.
    pub length_scale: Option<f32>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            program: "piper".into(),
            model_path: AppPaths::new().models_dir.join("id_ID-news_tts-medium.onnx"),
            speaker: None,
            length_scale: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Which audio output path plays the synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlaybackBackend {
    /// In-process playback through `rodio` / `cpal`.
    Rodio,
    /// ALSA `aplay`, needed for raw I2S devices such as `hw:1,3`.
    Aplay,
}

impl Default for PlaybackBackend {
    fn default() -> Self {
        Self::Rodio
    }
}

/// Settings for the playback step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub backend: PlaybackBackend,
    /// Output device name (rodio: substring of the cpal device name; aplay:
    /// ALSA device such as `hw:1,3`).  `None` means the system default.
    pub device: Option<String>,
    /// Linear gain (rodio only).
    pub volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            backend: PlaybackBackend::default(),
            device: None,
            volume: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Where per-run artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl StorageConfig {
    pub fn dirs(&self) -> ArtifactDirs {
        ArtifactDirs::new(&self.root)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: AppPaths::new().data_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use sightspeak::config::{AppConfig, AppPaths};
///
/// let path = AppPaths::new().settings_file;
/// let mut config = AppConfig::load_from(&path).unwrap();
/// config.button.key = "F8".into();
/// config.save_to(&path).unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub button: ButtonConfig,
    pub camera: CameraConfig,
    pub vision: VisionConfig,
    pub tts: TtsConfig,
    pub playback: PlaybackConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from `path`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
