//! Push-button trigger: edge source, debounce and the re-entrancy latch.
//!
//! # Design
//!
//! The interrupt facility ([`InterruptSource`]) delivers raw
//! [`ButtonEvent`]s on its own thread.  That thread runs only
//! [`ButtonTrigger::on_raw_event`]: a lock-free debounce check
//! ([`EdgeDetector`]) followed by a lock-free latch set ([`TriggerLatch`]).
//! Everything that blocks happens later on the scheduler's task, which polls
//! the latch.
//!
//! ```text
//! InterruptSource thread            scheduler task
//! ──────────────────────            ──────────────
//! ButtonEvent
//!   └─▶ EdgeDetector::accept
//!         └─▶ TriggerLatch::request_run ──▶ take_if_pending ─▶ run ─▶ release
//! ```
//!
//! [`TriggerGuard`] owns the registered source and calls
//! [`InterruptSource::cleanup`] when dropped, so the registration is released
//! on every exit path including panics.

pub mod debounce;
pub mod latch;
pub mod listener;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use debounce::EdgeDetector;
pub use latch::{LatchState, RequestOutcome, RunPermit, TriggerLatch};
pub use listener::KeyboardButton;

// ---------------------------------------------------------------------------
// Edge / ButtonEvent
// ---------------------------------------------------------------------------

/// Signal transition that the interrupt facility reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    /// High → low.  An active-low button (pull-up, other leg to GND) produces
    /// this on press.
    Falling,
    /// Low → high, i.e. release of an active-low button.
    Rising,
    Both,
}

impl Edge {
    pub fn matches(self, other: Edge) -> bool {
        self == Edge::Both || self == other
    }
}

/// One raw hardware transition.
#[derive(Debug, Clone, Copy)]
pub struct ButtonEvent {
    pub at: Instant,
    pub edge: Edge,
}

impl ButtonEvent {
    pub fn now(edge: Edge) -> Self {
        Self {
            at: Instant::now(),
            edge,
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("unknown button key: {0:?}")]
    UnknownKey(String),

    #[error("an edge callback is already registered")]
    AlreadyRegistered,

    #[error("cannot listen for button events: {0}")]
    Listen(String),
}

// ---------------------------------------------------------------------------
// InterruptSource
// ---------------------------------------------------------------------------

/// Callback invoked on the interrupt delivery thread.  Must not block.
pub type EdgeCallback = Box<dyn Fn(ButtonEvent) + Send + Sync + 'static>;

/// A facility that delivers edge interrupts for one input line.
pub trait InterruptSource: Send {
    /// Start delivering `edge` transitions on `pin` to `callback`.
    ///
    /// `debounce_hint` is advisory; sources that can filter in hardware may
    /// use it, the software [`EdgeDetector`] filters regardless.
    fn register_edge_callback(
        &mut self,
        pin: &str,
        edge: Edge,
        debounce_hint: Duration,
        callback: EdgeCallback,
    ) -> Result<(), TriggerError>;

    /// Release the registration.  Must be idempotent.
    fn cleanup(&mut self);
}

// ---------------------------------------------------------------------------
// ButtonTrigger
// ---------------------------------------------------------------------------

/// The interrupt-context half of the trigger: debounce, then latch.
#[derive(Debug, Clone)]
pub struct ButtonTrigger {
    detector: Arc<EdgeDetector>,
    latch: Arc<TriggerLatch>,
}

impl ButtonTrigger {
    pub fn new(debounce: Duration, latch: Arc<TriggerLatch>) -> Self {
        Self {
            detector: Arc::new(EdgeDetector::new(debounce)),
            latch,
        }
    }

    /// Handle one raw event.  Returns `None` when the debounce filter drops
    /// it, otherwise the latch outcome of the logical press.
    pub fn on_raw_event(&self, event: ButtonEvent) -> Option<RequestOutcome> {
        if !self.detector.accept(event.at) {
            log::trace!("trigger: bounce dropped");
            return None;
        }
        Some(self.latch.request_run())
    }

    pub fn latch(&self) -> &Arc<TriggerLatch> {
        &self.latch
    }

    /// Box a callback suitable for [`InterruptSource::register_edge_callback`].
    pub fn callback(&self) -> EdgeCallback {
        let this = self.clone();
        Box::new(move |event| {
            let _ = this.on_raw_event(event);
        })
    }
}

// ---------------------------------------------------------------------------
// TriggerGuard
// ---------------------------------------------------------------------------

/// Owns a registered [`InterruptSource`]; dropping it calls `cleanup()`.
pub struct TriggerGuard<S: InterruptSource> {
    source: S,
}

impl<S: InterruptSource> TriggerGuard<S> {
    /// Register `trigger` on `source`.  On failure the source is cleaned up
    /// before the error is returned.
    pub fn register(
        mut source: S,
        pin: &str,
        edge: Edge,
        debounce_hint: Duration,
        trigger: &ButtonTrigger,
    ) -> Result<Self, TriggerError> {
        if let Err(e) = source.register_edge_callback(pin, edge, debounce_hint, trigger.callback())
        {
            source.cleanup();
            return Err(e);
        }
        log::info!("trigger: listening on {pin} ({edge:?} edge)");
        Ok(Self { source })
    }
}

impl<S: InterruptSource> Drop for TriggerGuard<S> {
    fn drop(&mut self) {
        log::info!("trigger: releasing button registration");
        self.source.cleanup();
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from the config into an [`rdev::Key`].
///
/// Cheap USB arcade buttons and foot switches usually enumerate as one of
/// these keys.
///
/// ```
/// use sightspeak::trigger::parse_key;
///
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("space"), Some(rdev::Key::Space));
/// assert_eq!(parse_key("xyz"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match name.to_ascii_lowercase().as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "space" => Key::Space,
        "return" | "enter" => Key::Return,
        "kpreturn" => Key::KpReturn,
        "escape" | "esc" => Key::Escape,
        "pause" => Key::Pause,
        "scrolllock" => Key::ScrollLock,
        "printscreen" => Key::PrintScreen,
        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "s" => Key::KeyS,
        "x" => Key::KeyX,
        "z" => Key::KeyZ,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
