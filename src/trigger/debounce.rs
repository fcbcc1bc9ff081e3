//! Time-based debounce for raw button edges.
//!
//! Contact bounce on a cheap tactile switch produces a burst of edges within
//! a few milliseconds.  [`EdgeDetector`] accepts an edge only when at least
//! `threshold` has elapsed since the last *accepted* edge.
//!
//! The check is a single compare-and-swap on a microsecond counter, so it is
//! safe to call from the interrupt delivery thread: no locks, no I/O, bounded
//! time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sentinel for "no edge accepted yet".
const NEVER: u64 = u64::MAX;

#[derive(Debug)]
pub struct EdgeDetector {
    threshold_us: u64,
    origin: Instant,
    /// Microseconds since `origin` of the last accepted edge, or [`NEVER`].
    last_accepted_us: AtomicU64,
}

impl EdgeDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_us: threshold.as_micros() as u64,
            origin: Instant::now(),
            last_accepted_us: AtomicU64::new(NEVER),
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_micros(self.threshold_us)
    }

    /// Returns `true` if the edge observed at `at` is a new logical press.
    ///
    /// Edges stamped before the detector was created, or before the last
    /// accepted edge, count as zero elapsed time and are dropped.
    pub fn accept(&self, at: Instant) -> bool {
        let now_us = at.saturating_duration_since(self.origin).as_micros() as u64;

        let mut last = self.last_accepted_us.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_us.saturating_sub(last) < self.threshold_us {
                return false;
            }
            match self.last_accepted_us.compare_exchange_weak(
                last,
                now_us,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last = actual,
            }
        }
    }
}
