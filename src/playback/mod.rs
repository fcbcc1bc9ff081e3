//! Speaker output.
//!
//! [`Player`] blocks until the whole waveform has been played.  Two backends:
//!
//! * [`RodioPlayer`] — in-process playback through `rodio` on a `cpal` output
//!   device (default, or the first device whose name matches the configured
//!   one).
//! * [`AplayPlayer`] — ALSA `aplay -D <device>`, for I2S/APE outputs on
//!   Jetson-class boards that are only reachable as raw `hw:X,Y` devices.

pub mod aplay;
pub mod speaker;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{PlaybackBackend, PlaybackConfig};
use crate::tts::Waveform;

pub use aplay::AplayPlayer;
pub use speaker::{list_output_devices, RodioPlayer};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio file not found: {0}")]
    MissingFile(std::path::PathBuf),

    #[error("cannot open output device: {0}")]
    Device(String),

    #[error("cannot decode audio: {0}")]
    Decode(String),

    #[error("player process failed: {0}")]
    Process(String),
}

/// Render a waveform to the speaker, returning when playback has finished.
pub trait Player: Send + Sync {
    fn play(&self, waveform: &Waveform) -> Result<(), PlaybackError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Player>) {}
};

/// Build the player selected in the config.
pub fn player_from_config(config: &PlaybackConfig) -> Arc<dyn Player> {
    match config.backend {
        PlaybackBackend::Rodio => Arc::new(RodioPlayer::new(config.device.clone(), config.volume)),
        PlaybackBackend::Aplay => Arc::new(AplayPlayer::new(config.device.clone())),
    }
}
