//! [`InterruptSource`] backed by `rdev` global key events.
//!
//! USB push buttons, foot switches and keypad modules show up as a keyboard
//! key.  `rdev::listen` is a blocking call that must live on its own OS
//! thread; that thread is the "interrupt context" and runs only the
//! registered callback.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has no graceful shutdown API.  [`KeyboardButton::cleanup`]
//! sets a stop flag so the callback discards further events; the thread
//! itself stays parked in the rdev event loop until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
use std::time::{Duration, Instant};

use super::{parse_key, ButtonEvent, Edge, EdgeCallback, InterruptSource, TriggerError};

/// How long `register_edge_callback` waits for `rdev::listen` to fail fast
/// (missing X display, no input permission) before assuming it is running.
const STARTUP_GRACE: Duration = Duration::from_millis(300);

#[derive(Default)]
pub struct KeyboardButton {
    stop: Option<Arc<AtomicBool>>,
    /// Never joined: `rdev::listen` does not return.
    _thread: Option<std::thread::JoinHandle<()>>,
}

impl KeyboardButton {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InterruptSource for KeyboardButton {
    fn register_edge_callback(
        &mut self,
        pin: &str,
        edge: Edge,
        _debounce_hint: Duration,
        callback: EdgeCallback,
    ) -> Result<(), TriggerError> {
        if self.stop.is_some() {
            return Err(TriggerError::AlreadyRegistered);
        }
        let key = parse_key(pin).ok_or_else(|| TriggerError::UnknownKey(pin.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (err_tx, err_rx) = mpsc::channel::<String>();

        let thread = std::thread::Builder::new()
            .name("button-listener".into())
            .spawn(move || {
                // Auto-repeat sends KeyPress every ~30 ms while held; only the
                // first one is an edge.
                let mut held = false;
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let observed = match event.event_type {
                        rdev::EventType::KeyPress(k) if k == key => {
                            if held {
                                return;
                            }
                            held = true;
                            Edge::Falling
                        }
                        rdev::EventType::KeyRelease(k) if k == key => {
                            held = false;
                            Edge::Rising
                        }
                        _ => return,
                    };
                    if edge.matches(observed) {
                        callback(ButtonEvent {
                            at: Instant::now(),
                            edge: observed,
                        });
                    }
                });

                if let Err(e) = result {
                    log::error!("button-listener: rdev::listen exited with error: {e:?}");
                    let _ = err_tx.send(format!("{e:?}"));
                }
            })
            .map_err(|e| TriggerError::Listen(e.to_string()))?;

        match err_rx.recv_timeout(STARTUP_GRACE) {
            Ok(message) => Err(TriggerError::Listen(message)),
            Err(_) => {
                self.stop = Some(stop);
                self._thread = Some(thread);
                Ok(())
            }
        }
    }

    fn cleanup(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}
