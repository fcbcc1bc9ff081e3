//! Pipeline runner: capture → describe → synthesize → play.
//!
//! [`PipelineRunner::run`] executes one press worth of work and returns a
//! [`PipelineResult`].  It assumes it is never called concurrently with
//! itself; the trigger latch guarantees that.
//!
//! # Pipeline flow
//!
//! ```text
//! spawn_blocking(camera.capture)            [Capturing]     ─Err─▶ CaptureFailed
//!   └─▶ spawn(describer.describe)           [Describing]    ─Err─▶ DescriptionFailed
//!         └─▶ voice cached?                 [Synthesizing]
//!               └─ no → spawn_blocking(load_model)          ─Err─▶ SynthesisFailed(ModelLoad)
//!               └─▶ spawn_blocking(synthesize)              ─Err─▶ SynthesisFailed(Synthesize)
//!                     └─▶ spawn_blocking(play) [Playing]    ─Err─▶ PlaybackFailed
//!                           └─▶ Success(wav path)           [Done]
//! ```
//!
//! Blocking adapters run on `tokio::task::spawn_blocking` and the describe
//! call on its own `tokio::spawn` task; a panic inside any of them surfaces as
//! a join error and is treated as that stage failing.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use crate::capture::{CommandCamera, FrameSource};
use crate::config::AppConfig;
use crate::playback::{player_from_config, Player};
use crate::tts::{PiperEngine, Synthesizer, VoiceModel};
use crate::vision::{Describer, OllamaDescriber};

use super::state::{AppState, PipelineState, SharedState, Stage};

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Which part of the synthesis stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStep {
    ModelLoad,
    Synthesize,
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    CaptureFailed,
    DescriptionFailed,
    SynthesisFailed(SynthesisStep),
    PlaybackFailed,
    /// Path of the synthesized audio.
    Success(PathBuf),
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineResult::CaptureFailed => Some(Stage::Capture),
            PipelineResult::DescriptionFailed => Some(Stage::Describe),
            PipelineResult::SynthesisFailed(_) => Some(Stage::Synthesize),
            PipelineResult::PlaybackFailed => Some(Stage::Play),
            PipelineResult::Success(_) => None,
        }
    }

    /// The failure to report when `stage` died without returning, e.g. a
    /// panicking adapter.
    pub fn failure_at(stage: Stage) -> Self {
        match stage {
            Stage::Capture => PipelineResult::CaptureFailed,
            Stage::Describe => PipelineResult::DescriptionFailed,
            Stage::Synthesize => PipelineResult::SynthesisFailed(SynthesisStep::Synthesize),
            Stage::Play => PipelineResult::PlaybackFailed,
        }
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineResult::CaptureFailed => write!(f, "failed at capture"),
            PipelineResult::DescriptionFailed => write!(f, "failed at description"),
            PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad) => {
                write!(f, "failed loading the voice model")
            }
            PipelineResult::SynthesisFailed(SynthesisStep::Synthesize) => {
                write!(f, "failed at speech synthesis")
            }
            PipelineResult::PlaybackFailed => write!(f, "failed at playback"),
            PipelineResult::Success(path) => write!(f, "finished, audio at {}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The four adapters a runner drives.
#[derive(Clone)]
pub struct Stages {
    pub camera: Arc<dyn FrameSource>,
    pub describer: Arc<dyn Describer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Arc<dyn Player>,
}

impl Stages {
    /// Production adapters wired from config.
    pub fn from_config(config: &AppConfig) -> Self {
        let dirs = config.storage.dirs();
        Self {
            camera: Arc::new(CommandCamera::new(&config.camera, dirs.captures)),
            describer: Arc::new(OllamaDescriber::from_config(&config.vision, dirs.outputs)),
            synthesizer: Arc::new(PiperEngine::new(&config.tts, dirs.audios)),
            player: player_from_config(&config.playback),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

pub struct PipelineRunner {
    stages: Stages,
    prompt: String,
    model_path: PathBuf,
    state: SharedState,
}

impl PipelineRunner {
    /// # Arguments
    ///
    /// * `stages`     — the four adapters.
    /// * `prompt`     — instruction sent with every frame.
    /// * `model_path` — Piper voice to load on first use.
    /// * `state`      — status board updated on every transition.
    pub fn new(
        stages: Stages,
        prompt: impl Into<String>,
        model_path: impl Into<PathBuf>,
        state: SharedState,
    ) -> Self {
        Self {
            stages,
            prompt: prompt.into(),
            model_path: model_path.into(),
            state,
        }
    }

    pub fn from_config(config: &AppConfig, state: SharedState) -> Self {
        Self::new(
            Stages::from_config(config),
            config.vision.prompt.clone(),
            config.tts.model_path.clone(),
            state,
        )
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Execute one run to completion or first failure.
    ///
    /// `voice` is the caller-owned voice cache: loaded here when empty, left
    /// empty when loading fails so the next run retries.
    pub async fn run(&self, voice: &mut Option<Arc<VoiceModel>>) -> PipelineResult {
        log::info!("pipeline: run started");
        {
            let mut st = self.lock_state();
            st.runs_started += 1;
            st.last_error = None;
        }

        // ── 1. Capture ───────────────────────────────────────────────────
        let started = self.enter(PipelineState::Capturing);
        let camera = Arc::clone(&self.stages.camera);
        let frame = match tokio::task::spawn_blocking(move || camera.capture()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => return self.fail(PipelineResult::CaptureFailed, e),
            Err(e) => return self.fail(PipelineResult::CaptureFailed, e),
        };
        log::info!("pipeline: capture done in {:.1?}", started.elapsed());

        // ── 2. Describe ──────────────────────────────────────────────────
        let started = self.enter(PipelineState::Describing);
        let describer = Arc::clone(&self.stages.describer);
        let prompt = self.prompt.clone();
        let described =
            tokio::spawn(async move { describer.describe(&frame, &prompt).await }).await;
        let text = match described {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => return self.fail(PipelineResult::DescriptionFailed, "empty description"),
            Ok(Err(e)) => return self.fail(PipelineResult::DescriptionFailed, e),
            Err(e) => return self.fail(PipelineResult::DescriptionFailed, e),
        };
        log::info!(
            "pipeline: description ready in {:.1?}: {text:?}",
            started.elapsed()
        );
        self.lock_state().last_description = Some(text.clone());

        // ── 3. Voice model (first use) ───────────────────────────────────
        let started = self.enter(PipelineState::Synthesizing);
        let voice_model = match voice {
            Some(cached) => Arc::clone(cached),
            None => {
                let synth = Arc::clone(&self.stages.synthesizer);
                let path = self.model_path.clone();
                let loaded = match tokio::task::spawn_blocking(move || synth.load_model(&path))
                    .await
                {
                    Ok(Ok(model)) => Arc::new(model),
                    Ok(Err(e)) => {
                        return self.fail(PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad), e)
                    }
                    Err(e) => {
                        return self.fail(PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad), e)
                    }
                };
                *voice = Some(Arc::clone(&loaded));
                loaded
            }
        };

        // ── 4. Synthesize ────────────────────────────────────────────────
        let synth = Arc::clone(&self.stages.synthesizer);
        let waveform =
            match tokio::task::spawn_blocking(move || synth.synthesize(&voice_model, &text)).await {
                Ok(Ok(waveform)) => waveform,
                Ok(Err(e)) => {
                    return self.fail(PipelineResult::SynthesisFailed(SynthesisStep::Synthesize), e)
                }
                Err(e) => {
                    return self.fail(PipelineResult::SynthesisFailed(SynthesisStep::Synthesize), e)
                }
            };
        log::info!("pipeline: speech synthesized in {:.1?}", started.elapsed());

        // ── 5. Play ──────────────────────────────────────────────────────
        let started = self.enter(PipelineState::Playing);
        let player = Arc::clone(&self.stages.player);
        let audio_path = waveform.path.clone();
        match tokio::task::spawn_blocking(move || player.play(&waveform)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.fail(PipelineResult::PlaybackFailed, e),
            Err(e) => return self.fail(PipelineResult::PlaybackFailed, e),
        }
        log::info!("pipeline: playback finished in {:.1?}", started.elapsed());

        {
            let mut st = self.lock_state();
            st.pipeline = PipelineState::Done;
            st.last_audio = Some(audio_path.clone());
            st.runs_succeeded += 1;
        }
        PipelineResult::Success(audio_path)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, state: PipelineState) -> Instant {
        log::debug!("pipeline: → {}", state.label());
        self.lock_state().pipeline = state;
        Instant::now()
    }

    fn fail(&self, result: PipelineResult, reason: impl fmt::Display) -> PipelineResult {
        let stage = result.failed_stage().unwrap_or(Stage::Capture);
        let message = format!("{} stage: {reason}", stage.label());
        log::error!("pipeline: {message}");

        let mut st = self.lock_state();
        st.pipeline = PipelineState::Failed(stage);
        st.last_error = Some(message);
        st.runs_failed += 1;
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::new_shared_state;
    use crate::pipeline::testing::Rig;

    #[tokio::test]
    async fn happy_path_returns_success_with_audio_path() {
        let rig = Rig::new();
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        let result = runner.run(&mut voice).await;

        assert_eq!(result, PipelineResult::Success(rig.synthesizer.audio_path()));
        assert_eq!(rig.camera.calls(), 1);
        assert_eq!(rig.describer.calls(), 1);
        assert_eq!(rig.synthesizer.loads(), 1);
        assert_eq!(rig.synthesizer.synths(), 1);
        assert_eq!(rig.player.calls(), 1);
        assert!(voice.is_some());

        let st = runner.state().lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Done);
        assert_eq!(st.last_description.as_deref(), Some("Ada kursi di depan."));
        assert_eq!(st.runs_succeeded, 1);
        assert!(st.last_error.is_none());
    }

    #[tokio::test]
    async fn description_text_is_what_gets_synthesized() {
        let rig = Rig::new();
        let runner = rig.runner(new_shared_state());
        runner.run(&mut None).await;
        assert_eq!(
            rig.synthesizer.last_text().as_deref(),
            Some("Ada kursi di depan.")
        );
    }

    #[tokio::test]
    async fn capture_failure_stops_before_any_other_adapter() {
        let rig = Rig::new();
        rig.camera.set_fail(true);
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        let result = runner.run(&mut voice).await;

        assert_eq!(result, PipelineResult::CaptureFailed);
        assert_eq!(rig.camera.calls(), 1);
        assert_eq!(rig.describer.calls(), 0);
        assert_eq!(rig.synthesizer.loads(), 0);
        assert_eq!(rig.synthesizer.synths(), 0);
        assert_eq!(rig.player.calls(), 0);
        assert!(voice.is_none());

        let st = runner.state().lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Failed(Stage::Capture));
        assert!(st.last_error.as_deref().unwrap().contains("capture"));
        assert_eq!(st.runs_failed, 1);
    }

    #[tokio::test]
    async fn description_failure_skips_synthesis_and_playback() {
        let rig = Rig::new();
        rig.describer.set_response(None);
        let runner = rig.runner(new_shared_state());

        let result = runner.run(&mut None).await;

        assert_eq!(result, PipelineResult::DescriptionFailed);
        assert_eq!(rig.synthesizer.loads(), 0);
        assert_eq!(rig.player.calls(), 0);
    }

    #[tokio::test]
    async fn blank_description_counts_as_failure() {
        let rig = Rig::new();
        rig.describer.set_response(Some("   "));
        let runner = rig.runner(new_shared_state());

        assert_eq!(
            runner.run(&mut None).await,
            PipelineResult::DescriptionFailed
        );
        assert_eq!(rig.synthesizer.synths(), 0);
    }

    #[tokio::test]
    async fn model_load_failure_leaves_cache_empty() {
        let rig = Rig::new();
        rig.synthesizer.set_fail_load(true);
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        let result = runner.run(&mut voice).await;

        assert_eq!(
            result,
            PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad)
        );
        assert!(voice.is_none());
        assert_eq!(rig.synthesizer.synths(), 0);
        assert_eq!(rig.player.calls(), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_keeps_loaded_voice() {
        let rig = Rig::new();
        rig.synthesizer.set_fail_synth(true);
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        let result = runner.run(&mut voice).await;

        assert_eq!(
            result,
            PipelineResult::SynthesisFailed(SynthesisStep::Synthesize)
        );
        assert!(voice.is_some());
        assert_eq!(rig.player.calls(), 0);
    }

    #[tokio::test]
    async fn playback_failure_is_reported() {
        let rig = Rig::new();
        rig.player.set_fail(true);
        let runner = rig.runner(new_shared_state());

        assert_eq!(runner.run(&mut None).await, PipelineResult::PlaybackFailed);
        let st = runner.state().lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Failed(Stage::Play));
    }

    #[tokio::test]
    async fn panicking_adapter_is_a_stage_failure() {
        let rig = Rig::new();
        rig.camera.set_panic(true);
        let runner = rig.runner(new_shared_state());

        assert_eq!(runner.run(&mut None).await, PipelineResult::CaptureFailed);
        assert_eq!(rig.describer.calls(), 0);
    }

    #[tokio::test]
    async fn panicking_describer_keeps_the_cached_voice() {
        let rig = Rig::new();
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        assert!(runner.run(&mut voice).await.is_success());
        let loaded = voice.clone().unwrap();

        rig.describer.set_panic(true);
        assert_eq!(
            runner.run(&mut voice).await,
            PipelineResult::DescriptionFailed
        );
        assert!(Arc::ptr_eq(voice.as_ref().unwrap(), &loaded));
        assert_eq!(rig.synthesizer.loads(), 1);
    }

    #[tokio::test]
    async fn cached_voice_is_reused() {
        let rig = Rig::new();
        let runner = rig.runner(new_shared_state());
        let mut voice = None;

        for _ in 0..5 {
            assert!(runner.run(&mut voice).await.is_success());
        }
        assert_eq!(rig.synthesizer.loads(), 1);
        assert_eq!(rig.synthesizer.synths(), 5);
    }

    #[test]
    fn failure_at_maps_every_stage() {
        for stage in [Stage::Capture, Stage::Describe, Stage::Synthesize, Stage::Play] {
            assert_eq!(PipelineResult::failure_at(stage).failed_stage(), Some(stage));
        }
        assert_eq!(PipelineResult::Success("a.wav".into()).failed_stage(), None);
    }

    #[test]
    fn display_mentions_the_stage() {
        assert!(PipelineResult::CaptureFailed.to_string().contains("capture"));
        assert!(PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad)
            .to_string()
            .contains("voice model"));
        assert!(PipelineResult::Success("/a/out.wav".into())
            .to_string()
            .contains("/a/out.wav"));
    }
}
