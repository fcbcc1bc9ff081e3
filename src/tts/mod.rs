//! Text-to-speech using Piper voices.
//!
//! # Overview
//!
//! [`Synthesizer`] is the public interface used by the pipeline.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Synthesizer>`.
//!
//! Loading a voice is expensive, so it is split from synthesis:
//! [`Synthesizer::load_model`] returns a [`VoiceModel`] handle that the caller
//! caches and passes to every [`Synthesizer::synthesize`] call.
//!
//! [`PiperEngine`] is the production implementation.  It drives the `piper`
//! executable in raw-PCM mode and wraps the samples into a WAV file with
//! `hound`.

pub mod engine;
pub mod voice;
pub mod wav;

pub use engine::{PiperEngine, SynthesisError, Synthesizer, Waveform};
pub use voice::VoiceModel;
pub use wav::{pcm16_from_le_bytes, read_waveform, write_wav};
