//! Pipeline orchestration for the describe-what-I-see device.
//!
//! # Architecture
//!
//! ```text
//! ButtonTrigger (listener thread)
//!        │ request_run
//!        ▼
//! TriggerLatch ◀── take_if_pending ── Scheduler::run()   ← tokio task, polls
//!                                           │
//!                                           └─ tokio::spawn(PipelineRunner::run)
//!                                                 ├─ spawn_blocking(capture)     → Capturing
//!                                                 ├─ describe (HTTP)             → Describing
//!                                                 ├─ spawn_blocking(load/synth)  → Synthesizing
//!                                                 └─ spawn_blocking(play)        → Playing
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── updated on every transition
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sightspeak::config::AppConfig;
//! use sightspeak::pipeline::{new_shared_state, shutdown_signal, PipelineRunner, Scheduler};
//! use sightspeak::trigger::TriggerLatch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let latch = Arc::new(TriggerLatch::new());
//!     let runner = Arc::new(PipelineRunner::from_config(&config, new_shared_state()));
//!
//!     let scheduler = Scheduler::new(latch, runner, config.button.poll_interval());
//!     let shutdown = shutdown_signal().expect("signal handlers");
//!     scheduler.run(shutdown).await;
//! }
//! ```

pub mod runner;
pub mod scheduler;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::{PipelineResult, PipelineRunner, Stages, SynthesisStep};
pub use scheduler::{shutdown_signal, Scheduler};
pub use state::{new_shared_state, AppState, PipelineState, SharedState, Stage};
