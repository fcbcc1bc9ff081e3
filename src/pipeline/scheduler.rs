//! Latch polling loop.
//!
//! The scheduler is the only consumer of the [`TriggerLatch`].  It wakes every
//! `poll_interval`, takes a pending request if there is one and runs the
//! pipeline on its own task.  It owns the voice cache between runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::trigger::TriggerLatch;
use crate::tts::VoiceModel;

use super::runner::{PipelineResult, PipelineRunner};
use super::state::{PipelineState, Stage};

pub struct Scheduler {
    latch: Arc<TriggerLatch>,
    runner: Arc<PipelineRunner>,
    poll_interval: Duration,
    voice: Option<Arc<VoiceModel>>,
}

impl Scheduler {
    pub fn new(latch: Arc<TriggerLatch>, runner: Arc<PipelineRunner>, poll_interval: Duration) -> Self {
        Self {
            latch,
            runner,
            poll_interval,
            voice: None,
        }
    }

    /// The cached voice, once a run has loaded it.
    pub fn voice(&self) -> Option<&Arc<VoiceModel>> {
        self.voice.as_ref()
    }

    /// Run the pipeline if a press is pending.  Returns `None` otherwise.
    pub async fn run_once(&mut self) -> Option<PipelineResult> {
        let latch = Arc::clone(&self.latch);
        let _permit = latch.take_if_pending()?;
        Some(self.execute().await)
    }

    /// Poll the latch until `shutdown` resolves.
    ///
    /// A run in flight when `shutdown` resolves is abandoned; the latch is
    /// released on the way out.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!(
            "scheduler: polling every {} ms, waiting for button",
            self.poll_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let latch = Arc::clone(&self.latch);
                    let Some(_permit) = latch.take_if_pending() else {
                        continue;
                    };
                    tokio::select! {
                        _ = self.execute() => {}
                        _ = &mut shutdown => {
                            log::warn!("scheduler: shutdown during a run, abandoning it");
                            break;
                        }
                    }
                }
            }
        }
        log::info!("scheduler: stopped");
    }

    /// Run the pipeline on its own task so a panicking stage cannot take the
    /// loop down with it.
    async fn execute(&mut self) -> PipelineResult {
        let runner = Arc::clone(&self.runner);
        // The task works on a copy; a crashed run leaves the cache untouched.
        let mut voice = self.voice.clone();
        let task = tokio::spawn(async move {
            let result = runner.run(&mut voice).await;
            (result, voice)
        });

        let result = match task.await {
            Ok((result, voice)) => {
                if voice.is_some() {
                    self.voice = voice;
                }
                result
            }
            Err(e) => self.crashed(e),
        };

        if result.is_success() {
            log::info!("scheduler: run {result}");
        } else {
            log::warn!("scheduler: run {result}");
        }
        self.set_idle();
        result
    }

    fn crashed(&self, error: tokio::task::JoinError) -> PipelineResult {
        let mut st = self
            .runner
            .state()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stage = st.pipeline.stage().unwrap_or(Stage::Capture);
        log::error!("scheduler: {} stage crashed: {error}", stage.label());
        st.pipeline = PipelineState::Failed(stage);
        st.last_error = Some(format!("{} stage crashed: {error}", stage.label()));
        st.runs_failed += 1;
        PipelineResult::failure_at(stage)
    }

    fn set_idle(&self) {
        let mut st = self
            .runner
            .state()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        st.pipeline = PipelineState::Idle;
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
///
/// The SIGTERM handler is installed by this call, before the returned future
/// is first polled, so the default "terminate now" action never applies once
/// it has returned.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("shutdown: cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            terminate.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => log::info!("shutdown: Ctrl-C received"),
            _ = terminate => log::info!("shutdown: SIGTERM received"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::runner::SynthesisStep;
    use crate::pipeline::state::new_shared_state;
    use crate::pipeline::testing::{wait_until, Rig};
    use crate::trigger::{ButtonEvent, ButtonTrigger, Edge, LatchState, RequestOutcome};

    fn scheduler_for(rig: &Rig) -> (Scheduler, Arc<TriggerLatch>) {
        let latch = Arc::new(TriggerLatch::new());
        let runner = Arc::new(rig.runner(new_shared_state()));
        let scheduler = Scheduler::new(Arc::clone(&latch), runner, Duration::from_millis(10));
        (scheduler, latch)
    }

    #[tokio::test]
    async fn nothing_pending_runs_nothing() {
        let rig = Rig::new();
        let (mut scheduler, _latch) = scheduler_for(&rig);
        assert!(scheduler.run_once().await.is_none());
        assert_eq!(rig.camera.calls(), 0);
    }

    #[tokio::test]
    async fn pending_press_runs_pipeline_and_releases_latch() {
        let rig = Rig::new();
        let (mut scheduler, latch) = scheduler_for(&rig);

        assert_eq!(latch.request_run(), RequestOutcome::Latched);
        let result = scheduler.run_once().await.unwrap();

        assert!(result.is_success());
        assert_eq!(latch.state(), LatchState::Idle);
        let st = scheduler.runner.state().lock().unwrap();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert_eq!(st.last_description.as_deref(), Some("Ada kursi di depan."));
    }

    #[tokio::test]
    async fn failed_run_still_releases_latch() {
        let rig = Rig::new();
        rig.camera.set_fail(true);
        let (mut scheduler, latch) = scheduler_for(&rig);

        latch.request_run();
        assert_eq!(
            scheduler.run_once().await,
            Some(PipelineResult::CaptureFailed)
        );
        assert_eq!(latch.state(), LatchState::Idle);
        assert_eq!(latch.request_run(), RequestOutcome::Latched);
    }

    #[tokio::test]
    async fn voice_is_loaded_once_across_runs() {
        let rig = Rig::new();
        let (mut scheduler, latch) = scheduler_for(&rig);

        for _ in 0..4 {
            latch.request_run();
            assert!(scheduler.run_once().await.unwrap().is_success());
        }
        assert_eq!(rig.synthesizer.loads(), 1);
        assert_eq!(rig.synthesizer.synths(), 4);
        assert!(scheduler.voice().is_some());
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_run() {
        let rig = Rig::new();
        let (mut scheduler, latch) = scheduler_for(&rig);

        rig.synthesizer.set_fail_load(true);
        latch.request_run();
        assert_eq!(
            scheduler.run_once().await,
            Some(PipelineResult::SynthesisFailed(SynthesisStep::ModelLoad))
        );
        assert!(scheduler.voice().is_none());

        rig.synthesizer.set_fail_load(false);
        latch.request_run();
        assert!(scheduler.run_once().await.unwrap().is_success());
        assert_eq!(rig.synthesizer.loads(), 2);
        assert!(scheduler.voice().is_some());
    }

    #[tokio::test]
    async fn panicking_describer_fails_the_describe_stage() {
        let rig = Rig::new();
        rig.describer.set_panic(true);
        let (mut scheduler, latch) = scheduler_for(&rig);

        latch.request_run();
        assert_eq!(
            scheduler.run_once().await,
            Some(PipelineResult::DescriptionFailed)
        );
        assert_eq!(latch.state(), LatchState::Idle);
        assert_eq!(rig.synthesizer.synths(), 0);

        let st = scheduler.runner.state().lock().unwrap();
        assert_eq!(st.runs_failed, 1);
        assert!(st.last_error.as_deref().unwrap().contains("describe"));
    }

    #[tokio::test]
    async fn voice_cache_survives_a_crashed_run() {
        let rig = Rig::new();
        let (mut scheduler, latch) = scheduler_for(&rig);

        latch.request_run();
        assert!(scheduler.run_once().await.unwrap().is_success());

        rig.describer.set_panic(true);
        latch.request_run();
        assert_eq!(
            scheduler.run_once().await,
            Some(PipelineResult::DescriptionFailed)
        );
        assert!(scheduler.voice().is_some());

        rig.describer.set_panic(false);
        latch.request_run();
        assert!(scheduler.run_once().await.unwrap().is_success());
        assert_eq!(rig.synthesizer.loads(), 1);
        assert_eq!(rig.synthesizer.synths(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn press_during_run_is_ignored() {
        let rig = Rig::new();
        let gate = rig.player.hold();
        let (scheduler, latch) = scheduler_for(&rig);
        let trigger = ButtonTrigger::new(Duration::from_millis(150), Arc::clone(&latch));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(scheduler.run(async {
            let _ = stop_rx.await;
        }));

        let first = ButtonEvent::now(Edge::Falling);
        assert_eq!(trigger.on_raw_event(first), Some(RequestOutcome::Latched));
        wait_until("playback to start", || rig.player.calls() == 1).await;

        let during = ButtonEvent {
            at: first.at + Duration::from_millis(400),
            edge: Edge::Falling,
        };
        assert_eq!(trigger.on_raw_event(during), Some(RequestOutcome::Ignored));

        gate.send(()).unwrap();
        wait_until("latch release", || latch.state() == LatchState::Idle).await;
        assert_eq!(rig.camera.calls(), 1);

        gate.send(()).unwrap();
        let after = ButtonEvent {
            at: first.at + Duration::from_millis(800),
            edge: Edge::Falling,
        };
        assert_eq!(trigger.on_raw_event(after), Some(RequestOutcome::Latched));
        wait_until("second run", || rig.player.calls() == 2).await;
        wait_until("latch release", || latch.state() == LatchState::Idle).await;
        assert_eq!(rig.camera.calls(), 2);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn bounce_burst_runs_once() {
        let rig = Rig::new();
        let (mut scheduler, latch) = scheduler_for(&rig);
        let trigger = ButtonTrigger::new(Duration::from_millis(150), Arc::clone(&latch));

        let start = ButtonEvent::now(Edge::Falling);
        for i in 0..5 {
            trigger.on_raw_event(ButtonEvent {
                at: start.at + Duration::from_millis(i * 10),
                edge: Edge::Falling,
            });
        }
        assert!(scheduler.run_once().await.is_some());
        assert!(scheduler.run_once().await.is_none());
        assert_eq!(rig.camera.calls(), 1);
    }

    #[tokio::test]
    async fn stops_when_shutdown_resolves() {
        let rig = Rig::new();
        let (scheduler, _latch) = scheduler_for(&rig);
        tokio::time::timeout(Duration::from_secs(5), scheduler.run(async {}))
            .await
            .unwrap();
        assert_eq!(rig.camera.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_abandons_in_flight_run_and_releases_latch() {
        let rig = Rig::new();
        let gate = rig.player.hold();
        let (scheduler, latch) = scheduler_for(&rig);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(scheduler.run(async {
            let _ = stop_rx.await;
        }));

        latch.request_run();
        wait_until("playback to start", || rig.player.calls() == 1).await;

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latch.state(), LatchState::Idle);

        drop(gate);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_stops_the_scheduler() {
        let rig = Rig::new();
        let (scheduler, _latch) = scheduler_for(&rig);
        let shutdown = shutdown_signal().unwrap();
        let handle = tokio::spawn(scheduler.run(shutdown));

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
