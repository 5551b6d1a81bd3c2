use std::{
    io,
    ptr,
    sync::atomic::{AtomicPtr, AtomicUsize, Ordering},
    time::Duration,
};

use crate::{
    common::Config,
    manager::queue::{PendingQueue, SignalQueue},
    system::semaphore::Semaphore,
};

use super::{info::SignalInfo, SignalNumber, SIGNAL_SLOTS};

#[allow(clippy::declare_interior_mutable_const)]
const NO_ROUTE: AtomicPtr<Capture> = AtomicPtr::new(ptr::null_mut());

/// The capture each signal is forwarded to. Signal actions are process wide so this table is too.
static ROUTES: [AtomicPtr<Capture>; SIGNAL_SLOTS] = [NO_ROUTE; SIGNAL_SLOTS];

/// Number of `capture_siginfo` calls currently running, on any thread.
static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// The action installed for every managed signal.
///
/// This runs in signal context: it may only touch atomics, the pending queue and the semaphore.
pub(super) extern "C" fn capture_siginfo(
    signal: SignalNumber,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    IN_FLIGHT.fetch_add(1, Ordering::SeqCst);

    let slot = usize::try_from(signal)
        .ok()
        .and_then(|index| ROUTES.get(index));

    if let Some(slot) = slot {
        let capture = slot.load(Ordering::SeqCst);
        if !capture.is_null() && !info.is_null() {
            // SAFETY: `release_route` waits for `IN_FLIGHT` to drop to zero after clearing the
            // slot, so the capture outlives this call. `info` points to kernel provided storage
            // that is valid until we return, which is why it is copied here.
            unsafe { (*capture).record(SignalInfo::from_raw(*info)) };
        }
    }

    IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
}

/// Point the route for `signal` at `capture`. Fails if another capture owns the route.
pub(super) fn claim_route(signal: SignalNumber, capture: &Capture) -> bool {
    let Some(slot) = usize::try_from(signal).ok().and_then(|i| ROUTES.get(i)) else {
        return false;
    };
    let target = capture as *const Capture as *mut Capture;

    match slot.compare_exchange(ptr::null_mut(), target, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => true,
        Err(current) => current == target,
    }
}

/// Clear the route for `signal` and wait until no signal action can still be using it.
pub(super) fn release_route(signal: SignalNumber) {
    if let Some(slot) = usize::try_from(signal).ok().and_then(|i| ROUTES.get(i)) {
        slot.store(ptr::null_mut(), Ordering::SeqCst);
    }

    // Signal actions never block, so this only spins for the length of a queue push.
    while IN_FLIGHT.load(Ordering::SeqCst) != 0 {
        std::thread::yield_now();
    }
}

/// The destination of captured signals: a pending queue plus the semaphore used to wake up
/// whoever drains it.
pub(crate) struct Capture {
    queue: PendingQueue,
    wake: Semaphore,
    dropped: AtomicUsize,
}

impl Capture {
    pub(crate) fn new(config: &Config) -> io::Result<Self> {
        Ok(Self {
            queue: PendingQueue::new(config)?,
            wake: Semaphore::new()?,
            dropped: AtomicUsize::new(0),
        })
    }

    /// Store `info` and wake the consumer. Async-signal-safe.
    fn record(&self, info: SignalInfo) {
        if !self.queue.push(info) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.wake.post();
    }

    pub(crate) fn pop(&self) -> Option<SignalInfo> {
        self.queue.pop()
    }

    /// Discard every pending record.
    pub(crate) fn drain(&self) -> usize {
        std::iter::from_fn(|| self.queue.pop()).count()
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn wake(&self) {
        self.wake.post();
    }

    /// Forget wake ups that no record backs, such as a stop posted while no loop was running.
    ///
    /// If a record is still pending afterwards one wake up is kept for it.
    pub(crate) fn discard_stale_wakeups(&self) {
        while self.wake.try_wait() {}
        if self.pending() > 0 {
            self.wake.post();
        }
    }

    pub(crate) fn wait(&self) -> io::Result<()> {
        self.wake.wait()
    }

    /// Returns `false` if `timeout` expired without a wake up.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        self.wake.wait_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{capture_siginfo, claim_route, release_route, Capture};
    use crate::{
        common::{Config, QueueKind},
        system::signal::consts::*,
        testing::in_child,
    };

    fn deliver(signal: i32, code: i32) {
        let mut raw = *crate::system::signal::synthetic(signal, code).as_raw();
        capture_siginfo(signal, &mut raw, std::ptr::null_mut());
    }

    #[test]
    fn unrouted_signals_are_ignored() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            deliver(SIGHUP, 0);
            assert_eq!(capture.pending(), 0);
            assert!(!capture.wait_timeout(Duration::from_millis(10)).unwrap());
        });
    }

    #[test]
    fn routed_signals_are_recorded_and_wake() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            assert!(claim_route(SIGHUP, &capture));

            deliver(SIGHUP, 0);
            deliver(SIGHUP, -1);

            assert!(capture.wait_timeout(Duration::from_secs(1)).unwrap());
            assert!(capture.wait_timeout(Duration::from_secs(1)).unwrap());
            assert_eq!(capture.pending(), 2);
            assert_eq!(capture.pop().unwrap().code(), 0);
            assert_eq!(capture.pop().unwrap().code(), -1);
            assert!(capture.pop().is_none());

            release_route(SIGHUP);
            deliver(SIGHUP, 0);
            assert_eq!(capture.pending(), 0);
        });
    }

    #[test]
    fn stale_wakeups_are_discarded() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            capture.wake();
            capture.wake();

            capture.discard_stale_wakeups();
            assert!(!capture.wait_timeout(Duration::from_millis(10)).unwrap());
        });
    }

    #[test]
    fn pending_records_keep_one_wakeup() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            assert!(claim_route(SIGUSR2, &capture));
            deliver(SIGUSR2, 0);
            capture.wake();

            capture.discard_stale_wakeups();
            assert!(capture.wait_timeout(Duration::from_millis(10)).unwrap());
            assert!(!capture.wait_timeout(Duration::from_millis(10)).unwrap());
            assert_eq!(capture.pending(), 1);

            release_route(SIGUSR2);
        });
    }

    #[test]
    fn overflow_is_counted() {
        in_child(|| {
            let config = Config {
                queue: QueueKind::LockFree,
                capacity: 2,
            };
            let capture = Capture::new(&config).unwrap();
            assert!(claim_route(SIGUSR1, &capture));

            for _ in 0..5 {
                deliver(SIGUSR1, 0);
            }

            assert_eq!(capture.pending(), 2);
            assert_eq!(capture.dropped(), 3);
            assert_eq!(capture.drain(), 2);
            assert_eq!(capture.pending(), 0);

            release_route(SIGUSR1);
        });
    }
}
