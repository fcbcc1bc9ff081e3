//! Single-slot run latch shared between the interrupt thread and the
//! scheduler.
//!
//! The two logical flags (`pending`, `busy`) live in one `AtomicU8`, so
//! "check busy, then set pending" is a single compare-and-swap and can never
//! interleave with the scheduler's "take pending, set busy".
//!
//! ```text
//!          request_run            take_if_pending
//!   Idle ───────────────▶ Pending ───────────────▶ Busy
//!    ▲                                              │
//!    └──────────────────── release ─────────────────┘
//! ```
//!
//! A press while `Busy` is dropped, not queued.

use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const BUSY: u8 = 2;

/// Snapshot of the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Idle,
    Pending,
    Busy,
}

impl LatchState {
    pub fn is_pending(self) -> bool {
        self == LatchState::Pending
    }

    pub fn is_busy(self) -> bool {
        self == LatchState::Busy
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            PENDING => LatchState::Pending,
            BUSY => LatchState::Busy,
            _ => LatchState::Idle,
        }
    }
}

/// What a logical press did to the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Idle → Pending; a run will start on the next poll.
    Latched,
    /// A run was already requested and has not started yet.
    AlreadyPending,
    /// A run is in progress; the press has no effect.
    Ignored,
}

#[derive(Debug, Default)]
pub struct TriggerLatch {
    state: AtomicU8,
}

impl TriggerLatch {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Request a pipeline run.  Called from the interrupt thread.
    pub fn request_run(&self) -> RequestOutcome {
        match self
            .state
            .compare_exchange(IDLE, PENDING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                log::info!("trigger: button pressed, pipeline will run");
                RequestOutcome::Latched
            }
            Err(PENDING) => RequestOutcome::AlreadyPending,
            Err(_) => {
                log::info!("trigger: pipeline already running, press ignored");
                RequestOutcome::Ignored
            }
        }
    }

    /// Consume a pending request and mark the latch busy.
    ///
    /// The returned permit releases the latch when dropped.
    pub fn take_if_pending(&self) -> Option<RunPermit<'_>> {
        self.state
            .compare_exchange(PENDING, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { latch: self })
    }

    /// Busy → Idle.  A no-op in any other state.
    pub fn release(&self) {
        if self
            .state
            .compare_exchange(BUSY, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("trigger: release() on a latch that was not busy");
        }
    }

    pub fn state(&self) -> LatchState {
        LatchState::from_raw(self.state.load(Ordering::Acquire))
    }
}

/// Proof that the holder owns the single `busy` slot.
#[must_use = "dropping the permit releases the latch immediately"]
#[derive(Debug)]
pub struct RunPermit<'a> {
    latch: &'a TriggerLatch,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.latch.release();
    }
}
