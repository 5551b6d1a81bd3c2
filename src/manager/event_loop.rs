use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use crate::{
    log::{dev_debug, dev_error, dev_warn},
    system::signal::{signal_name, Capture},
};

use super::registry::Registry;

/// Where a processing loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessingState {
    /// No loop has run yet, or the last one returned after a single timed pass.
    Idle = 0,
    /// Managed signals are unblocked and the loop is parked on the semaphore.
    Waiting = 1,
    /// Managed signals are blocked again and callbacks are running.
    Draining = 2,
    /// The loop returned because a stop was requested.
    Stopped = 3,
}

impl ProcessingState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Waiting,
            2 => Self::Draining,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// How a loop waits for captured signals.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WaitMode {
    Indefinite,
    Timeout {
        timeout: Duration,
        exit_after_timeout: bool,
    },
}

/// State shared by a manager, its worker thread and every [`super::StopHandle`].
pub(crate) struct Shared {
    pub(crate) capture: Capture,
    stop: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new(capture: Capture) -> Self {
        Self {
            capture,
            stop: AtomicBool::new(false),
            state: AtomicU8::new(ProcessingState::Idle as u8),
        }
    }

    /// Ask the running loop to return and wake it up so it notices.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.capture.wake();
    }

    pub(crate) fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> ProcessingState {
        ProcessingState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ProcessingState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Leaves the state as `Stopped` if a callback unwinds out of the loop.
struct StateGuard<'a> {
    shared: &'a Shared,
    on_exit: ProcessingState,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.shared.set_state(self.on_exit);
    }
}

/// Run the processing loop on the calling thread until it is stopped, or for a single pass if
/// `mode` says so.
///
/// The registry stays locked for the whole run so registration calls fail fast meanwhile.
pub(crate) fn run(shared: &Shared, registry: &Mutex<Registry>, mode: WaitMode) {
    // declared first so the state changes only after the registry is unlocked again
    let mut guard = StateGuard {
        shared,
        on_exit: ProcessingState::Stopped,
    };
    let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);

    let managed = match registry.managed_set() {
        Ok(set) => set,
        Err(err) => {
            dev_error!("cannot build the set of managed signals: {err}");
            return;
        }
    };

    shared.capture.discard_stale_wakeups();
    // a stop requested before this point may have lost its wake up above
    if shared.stop_requested() {
        shared.capture.wake();
    }

    loop {
        shared.set_state(ProcessingState::Waiting);
        if let Err(err) = managed.unblock() {
            dev_warn!("cannot unblock managed signals: {err}");
        }

        let woken = match mode {
            WaitMode::Indefinite => shared.capture.wait().map(|()| true),
            WaitMode::Timeout { timeout, .. } => shared.capture.wait_timeout(timeout),
        };

        shared.set_state(ProcessingState::Draining);
        if let Err(err) = managed.block() {
            dev_warn!("cannot block managed signals: {err}");
        }

        match woken {
            Ok(true) => {}
            Ok(false) => dev_debug!("no signal before the timeout"),
            Err(err) => {
                dev_error!("cannot wait for signals: {err}");
                return;
            }
        }

        while let Some(info) = shared.capture.pop() {
            if !registry.dispatch(&info) {
                dev_debug!("discarding {}, it has no handler", signal_name(info.signal()));
            }
        }

        if shared.stop_requested() {
            return;
        }

        if let WaitMode::Timeout {
            exit_after_timeout: true,
            ..
        } = mode
        {
            guard.on_exit = ProcessingState::Idle;
            return;
        }
    }
}
