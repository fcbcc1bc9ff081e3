pub mod capture;
pub mod config;
pub mod pipeline;
pub mod playback;
pub mod trigger;
pub mod tts;
pub mod vision;
