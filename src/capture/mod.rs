//! Camera frame acquisition.
//!
//! [`FrameSource`] is the interface the pipeline uses.  It is object-safe and
//! `Send + Sync` so it can be held behind an `Arc<dyn FrameSource>` and called
//! from the blocking thread pool.
//!
//! [`CommandCamera`] is the production implementation: it shells out to an
//! external grabber (ffmpeg / fswebcam / gst-launch) for exactly one frame and
//! keeps no device handle between calls.

pub mod camera;

use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

pub use camera::CommandCamera;

/// One frame saved to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub path: PathBuf,
    pub captured_at: SystemTime,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The grabber program could not be started.
    #[error("cannot start frame grabber {program:?}: {reason}")]
    Spawn { program: String, reason: String },

    /// The grabber ran but reported failure (device absent, busy, …).
    #[error("camera not available: {0}")]
    DeviceUnavailable(String),

    /// The grabber succeeded but produced no image data.
    #[error("no frame was read from the camera")]
    EmptyFrame,

    #[error("frame storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Acquire one image frame.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<CapturedFrame, CaptureError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn FrameSource>) {}
};
