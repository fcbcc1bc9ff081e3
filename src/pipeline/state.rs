//! Pipeline state machine and shared status board.
//!
//! [`PipelineState`] tracks the current run.  [`AppState`] is what a status
//! LED, log line or diagnostics endpoint reads: current phase, last
//! description, last audio file, last error and run counters.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`; cheap to clone
//! and safe to share across threads.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One sequential step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Describe,
    Synthesize,
    Play,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Capture => "capture",
            Stage::Describe => "describe",
            Stage::Synthesize => "synthesize",
            Stage::Play => "play",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of one pipeline run.
///
/// ```text
/// Idle ──permit──▶ Capturing ──▶ Describing ──▶ Synthesizing ──▶ Playing ──▶ Done
///                      │              │               │              │
///                      └──────────────┴───────────────┴──────────────┴──▶ Failed(stage)
/// Done / Failed ──release──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Waiting for a button press.
    #[default]
    Idle,
    Capturing,
    Describing,
    /// Loading the voice (first run only) and synthesizing speech.
    Synthesizing,
    Playing,
    /// The last run finished successfully.
    Done,
    /// The last run stopped at this stage.
    Failed(Stage),
}

impl PipelineState {
    /// Returns `true` while a stage is executing.
    ///
    /// ```
    /// use sightspeak::pipeline::{PipelineState, Stage};
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Describing.is_busy());
    /// assert!(!PipelineState::Failed(Stage::Play).is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        self.stage().is_some()
    }

    /// The stage currently executing, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Capturing => Some(Stage::Capture),
            PipelineState::Describing => Some(Stage::Describe),
            PipelineState::Synthesizing => Some(Stage::Synthesize),
            PipelineState::Playing => Some(Stage::Play),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Capturing => "Capturing",
            PipelineState::Describing => "Describing",
            PipelineState::Synthesizing => "Synthesizing",
            PipelineState::Playing => "Playing",
            PipelineState::Done => "Done",
            PipelineState::Failed(_) => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared status of the device.
#[derive(Debug, Default)]
pub struct AppState {
    pub pipeline: PipelineState,

    /// Text of the most recent successful description.
    pub last_description: Option<String>,

    /// WAV file of the most recent successful run.
    pub last_audio: Option<PathBuf>,

    /// Error message of the most recent failed run; cleared when a run starts.
    pub last_error: Option<String>,

    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section only; never hold the guard across an
/// `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stage_states_are_busy() {
        assert!(!PipelineState::Idle.is_busy());
        assert!(PipelineState::Capturing.is_busy());
        assert!(PipelineState::Describing.is_busy());
        assert!(PipelineState::Synthesizing.is_busy());
        assert!(PipelineState::Playing.is_busy());
        assert!(!PipelineState::Done.is_busy());
        assert!(!PipelineState::Failed(Stage::Capture).is_busy());
    }

    #[test]
    fn stage_of_running_state() {
        assert_eq!(PipelineState::Capturing.stage(), Some(Stage::Capture));
        assert_eq!(PipelineState::Playing.stage(), Some(Stage::Play));
        assert_eq!(PipelineState::Done.stage(), None);
    }

    #[test]
    fn labels() {
        assert_eq!(PipelineState::Idle.label(), "Idle");
        assert_eq!(PipelineState::Synthesizing.label(), "Synthesizing");
        assert_eq!(PipelineState::Failed(Stage::Describe).label(), "Failed");
        assert_eq!(Stage::Synthesize.label(), "synthesize");
    }

    #[test]
    fn default_app_state_is_idle_and_empty() {
        let state = AppState::default();
        assert_eq!(state.pipeline, PipelineState::Idle);
        assert!(state.last_description.is_none());
        assert!(state.last_error.is_none());
        assert_eq!(state.runs_started, 0);
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().pipeline = PipelineState::Playing;
        assert_eq!(state2.lock().unwrap().pipeline, PipelineState::Playing);
    }
}
