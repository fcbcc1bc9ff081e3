//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/sightspeak/
//!   macOS:   ~/Library/Application Support/sightspeak/
//!
//! Data dir (captures, descriptions, synthesized audio, voice models):
//!   Linux:   ~/.local/share/sightspeak/
//!   macOS:   ~/Library/Application Support/sightspeak/

use std::path::{Path, PathBuf};

use chrono::Local;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default root for pipeline artifacts.
    pub data_dir: PathBuf,
    /// Directory for Piper `.onnx` voices.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "sightspeak";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            data_dir,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ArtifactDirs
// ---------------------------------------------------------------------------

/// The three per-run artifact folders beneath a storage root.
///
/// ```text
/// <root>/captures/capture_20250101_120000.png
/// <root>/outputs/output_20250101_120003.txt
/// <root>/audios/output_20250101_120005.wav
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactDirs {
    pub captures: PathBuf,
    pub outputs: PathBuf,
    pub audios: PathBuf,
}

impl ArtifactDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            captures: root.join("captures"),
            outputs: root.join("outputs"),
            audios: root.join("audios"),
        }
    }

    /// Create all three folders if they do not exist yet.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in self.all() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Remove every file inside the artifact folders and return how many were
    /// deleted.  Missing folders are skipped; undeletable files are skipped
    /// with a warning.
    pub fn clean(&self) -> usize {
        let mut removed = 0;
        for dir in self.all() {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("clean: cannot remove {}: {e}", path.display()),
                }
            }
        }
        removed
    }

    fn all(&self) -> [&Path; 3] {
        [&self.captures, &self.outputs, &self.audios]
    }
}

/// Build `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.<ext>` using local time.
pub fn timestamped(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{prefix}_{ts}.{ext}"))
}

/// Most recently modified file in `dir` with extension `ext`.
pub fn latest_file(dir: &Path, ext: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == ext))
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }

    #[test]
    fn timestamped_name_has_prefix_and_extension() {
        let path = timestamped(Path::new("/tmp/x"), "capture", "png");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("capture_"));
        assert!(name.ends_with(".png"));
        // capture_ + 8 date digits + _ + 6 time digits + .png
        assert_eq!(name.len(), "capture_".len() + 15 + ".png".len());
    }

    #[test]
    fn clean_removes_files_in_all_artifact_dirs() {
        let dir = tempdir().unwrap();
        let dirs = ArtifactDirs::new(dir.path());
        dirs.ensure().unwrap();

        std::fs::write(dirs.captures.join("a.png"), b"x").unwrap();
        std::fs::write(dirs.outputs.join("b.txt"), b"x").unwrap();
        std::fs::write(dirs.audios.join("c.wav"), b"x").unwrap();
        std::fs::write(dirs.audios.join("d.wav"), b"x").unwrap();

        assert_eq!(dirs.clean(), 4);
        assert_eq!(std::fs::read_dir(&dirs.audios).unwrap().count(), 0);
        // Folders themselves survive.
        assert!(dirs.captures.is_dir());
    }

    #[test]
    fn clean_on_missing_dirs_is_zero() {
        let dir = tempdir().unwrap();
        let dirs = ArtifactDirs::new(dir.path().join("never-created"));
        assert_eq!(dirs.clean(), 0);
    }

    #[test]
    fn latest_file_picks_newest_with_extension() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("output_old.txt");
        let new = dir.path().join("output_new.txt");
        std::fs::write(&old, b"a").unwrap();
        std::fs::write(dir.path().join("ignored.wav"), b"b").unwrap();
        std::fs::write(&new, b"c").unwrap();

        let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(earlier)
            .unwrap();

        assert_eq!(latest_file(dir.path(), "txt"), Some(new));
        assert_eq!(latest_file(dir.path(), "png"), None);
        assert_eq!(latest_file(&dir.path().join("missing"), "txt"), None);
    }
}
