//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, `AppPaths` for cross-platform directories, `ArtifactDirs` for the
//! per-run output folders, and TOML persistence via `AppConfig::load_from` /
//! `AppConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::{latest_file, timestamped, AppPaths, ArtifactDirs};
pub use settings::{
    AppConfig, ButtonConfig, CameraConfig, PlaybackBackend, PlaybackConfig, StorageConfig,
    TtsConfig, VisionConfig,
};
