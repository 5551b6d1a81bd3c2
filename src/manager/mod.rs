//! The signal manager: registration API, processing loop and worker thread.
//!
//! Signals are handed over in three steps:
//!
//! 1. the thread that registers a handler blocks the signal and installs the capture action.
//!    Threads spawned from then on inherit the blocked mask;
//! 2. when the signal arrives, the capture action copies its `siginfo_t` into the pending queue
//!    and posts a semaphore, on whatever thread the kernel picked;
//! 3. the processing loop, parked on that semaphore with the managed signals unblocked, wakes up,
//!    blocks them again and runs the callbacks like any other code.
//!
//! Threads spawned *before* registration keep their old mask and may receive managed signals
//! themselves. That is harmless for correctness: the capture action runs there instead and the
//! loop still sees the record through the semaphore.
use std::{
    sync::{Arc, Mutex, PoisonError, TryLockError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    common::{Config, Error},
    log::{dev_debug, dev_error, dev_info, dev_warn},
    system::signal::{Capture, SignalInfo, SignalNumber},
};

use event_loop::{Shared, WaitMode};
use registry::{Callback, Registry};

pub use event_loop::ProcessingState;

mod event_loop;
pub mod queue;
mod registry;

/// Runs user callbacks for OS signals on an ordinary thread.
///
/// The registration calls never wait on a running processing loop: they fail (or do nothing)
/// while one is active. Register every handler first, then start processing.
///
/// Signal actions are process wide, so a given signal can be managed by at most one
/// `SignalManager` at a time. Dropping the manager stops processing and restores the default
/// action of every signal it managed.
pub struct SignalManager {
    shared: Arc<Shared>,
    registry: Arc<Mutex<Registry>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Stops the processing loop of a [`SignalManager`] from anywhere, callbacks included.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Same as [`SignalManager::stop_processing`] except that it never joins the worker thread.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop_requested()
    }
}

impl SignalManager {
    /// Create a manager using [`Config::default`].
    pub fn new() -> std::io::Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a manager.
    ///
    /// Fails if the configuration is invalid or the semaphore cannot be created.
    pub fn with_config(config: Config) -> std::io::Result<Self> {
        let capture = Capture::new(&config).map_err(|err| {
            dev_error!("cannot set up signal capture: {err}");
            err
        })?;

        Ok(Self {
            shared: Arc::new(Shared::new(capture)),
            registry: Arc::new(Mutex::new(Registry::default())),
            worker: Mutex::new(None),
        })
    }

    fn try_registry(&self) -> Result<std::sync::MutexGuard<'_, Registry>, Error> {
        match self.registry.try_lock() {
            Ok(registry) => Ok(registry),
            // a callback panicked, the registry itself is still consistent
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(Error::Busy),
        }
    }

    /// Set the handler for `signal`.
    ///
    /// Fails if `signal` cannot be managed, already has a handler, is managed by another manager,
    /// or if signals are being processed right now. Nothing changes on failure.
    pub fn try_set_handler<F>(&self, signal: SignalNumber, callback: F) -> Result<(), Error>
    where
        F: FnMut(SignalNumber, &SignalInfo) + Send + 'static,
    {
        let mut registry = self.try_registry()?;
        registry.insert(signal, Box::new(callback) as Callback, &self.shared.capture)
    }

    /// Set or replace the handler for `signal`.
    ///
    /// Replacing keeps the signal blocked and captured, only the callback changes.
    pub fn try_reset_handler<F>(&self, signal: SignalNumber, callback: F) -> Result<(), Error>
    where
        F: FnMut(SignalNumber, &SignalInfo) + Send + 'static,
    {
        let mut registry = self.try_registry()?;
        registry.upsert(signal, Box::new(callback) as Callback, &self.shared.capture)
    }

    /// Boolean form of [`SignalManager::try_set_handler`].
    pub fn set_handler<F>(&self, signal: SignalNumber, callback: F) -> bool
    where
        F: FnMut(SignalNumber, &SignalInfo) + Send + 'static,
    {
        self.try_set_handler(signal, callback)
            .map_err(|err| dev_info!("set_handler: {err}"))
            .is_ok()
    }

    /// Boolean form of [`SignalManager::try_reset_handler`].
    pub fn reset_handler<F>(&self, signal: SignalNumber, callback: F) -> bool
    where
        F: FnMut(SignalNumber, &SignalInfo) + Send + 'static,
    {
        self.try_reset_handler(signal, callback)
            .map_err(|err| dev_info!("reset_handler: {err}"))
            .is_ok()
    }

    /// [`SignalManager::set_handler`] for callbacks that don't need the signal information.
    pub fn set_handler_simple<F>(&self, signal: SignalNumber, mut callback: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.set_handler(signal, move |_, _| callback())
    }

    /// [`SignalManager::reset_handler`] for callbacks that don't need the signal information.
    pub fn reset_handler_simple<F>(&self, signal: SignalNumber, mut callback: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.reset_handler(signal, move |_, _| callback())
    }

    /// Remove the handler for `signal` and give the signal its default action back.
    ///
    /// Does nothing if signals are being processed right now.
    pub fn remove_handler(&self, signal: SignalNumber) {
        match self.try_registry() {
            Ok(mut registry) => {
                registry.remove(signal);
            }
            Err(err) => dev_debug!("remove_handler: {err}"),
        }
    }

    /// Returns whether `signal` has a handler, or `None` if signals are being processed right now.
    pub fn is_registered(&self, signal: SignalNumber) -> Option<bool> {
        self.try_registry()
            .ok()
            .map(|registry| registry.contains(signal))
    }

    /// Stop processing, then remove every handler and discard the signals still pending.
    ///
    /// Unlike the other registration calls this waits for a running loop to return. It must not
    /// be called from inside a handler.
    pub fn clear(&self) {
        self.stop_processing();

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.clear();
        let discarded = self.shared.capture.drain();
        if discarded > 0 {
            dev_debug!("discarded {discarded} pending signals");
        }
        self.shared.capture.discard_stale_wakeups();
    }

    /// Process signals on the calling thread until [`SignalManager::stop_processing`] is called.
    pub fn signals_processing(&self) {
        self.shared.clear_stop();
        event_loop::run(&self.shared, &self.registry, WaitMode::Indefinite);
    }

    /// Process signals on the calling thread, waking up at least every `timeout`.
    ///
    /// With `exit_after_timeout` this returns after the first wake up, whether it was caused by a
    /// signal or by the timeout. Otherwise it runs until stopped.
    pub fn signals_processing_with_timeout(&self, timeout: Duration, exit_after_timeout: bool) {
        self.shared.clear_stop();
        event_loop::run(
            &self.shared,
            &self.registry,
            WaitMode::Timeout {
                timeout,
                exit_after_timeout,
            },
        );
    }

    /// Process signals on a dedicated thread.
    ///
    /// A zero `timeout` waits indefinitely between signals, any other value wakes the loop at
    /// least that often. Does nothing if the worker thread is already running and was not asked
    /// to stop, or if another thread is starting or stopping it right now.
    pub fn threaded_signals_processing(&self, timeout: Duration) {
        let mut worker = match self.worker.try_lock() {
            Ok(worker) => worker,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                dev_debug!("the worker is being started or stopped elsewhere");
                return;
            }
        };

        if let Some(handle) = worker.take() {
            let exiting = handle.is_finished() || self.shared.stop_requested();
            if !exiting || handle.thread().id() == thread::current().id() {
                *worker = Some(handle);
                return;
            }
            // stopped from one of its own callbacks, reap it before starting over
            if handle.join().is_err() {
                dev_warn!("the previous signal processing thread panicked");
            }
        }

        let mode = if timeout.is_zero() {
            WaitMode::Indefinite
        } else {
            WaitMode::Timeout {
                timeout,
                exit_after_timeout: false,
            }
        };

        // cleared here rather than in the thread so a stop right after this call is not lost
        self.shared.clear_stop();

        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.registry);
        match thread::Builder::new()
            .name("signal-dispatch".into())
            .spawn(move || event_loop::run(&shared, &registry, mode))
        {
            Ok(handle) => *worker = Some(handle),
            Err(err) => dev_error!("cannot spawn signal processing thread: {err}"),
        }
    }

    /// Make the processing loop return as soon as the current callback is done.
    ///
    /// If the loop runs on the worker thread, this also waits for that thread to finish, unless
    /// it is called from the worker itself.
    pub fn stop_processing(&self) {
        self.shared.request_stop();

        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            match worker.take() {
                Some(handle) if handle.thread().id() == thread::current().id() => {
                    // joining ourselves would deadlock, the next start or stop reaps it
                    *worker = Some(handle);
                    None
                }
                handle => handle,
            }
        };

        if let Some(handle) = handle {
            if handle.join().is_err() {
                dev_warn!("the signal processing thread panicked");
            }
        }
    }

    /// A handle that callbacks can capture to stop processing.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns whether a stop was requested and not yet superseded by a new processing run.
    pub fn is_stopped(&self) -> bool {
        self.shared.stop_requested()
    }

    pub fn state(&self) -> ProcessingState {
        self.shared.state()
    }

    /// Number of captured signals waiting to be dispatched.
    pub fn pending_signals(&self) -> usize {
        self.shared.capture.pending()
    }

    /// Number of captured signals that were lost because the pending queue was full.
    pub fn dropped_signals(&self) -> usize {
        self.shared.capture.dropped()
    }
}

impl Drop for SignalManager {
    fn drop(&mut self) {
        self.clear();
    }
}
