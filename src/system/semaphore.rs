use std::{cell::UnsafeCell, io, mem::MaybeUninit, time::Duration};

use crate::cutils::cerr;

const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

/// An unnamed POSIX counting semaphore.
///
/// [`Semaphore::post`] is one of the few synchronization calls that is async-signal-safe, which is
/// why it is used instead of a condition variable.
pub(crate) struct Semaphore {
    // `sem_t` must not move once initialized.
    raw: Box<UnsafeCell<libc::sem_t>>,
}

// SAFETY: `sem_t` is designed to be shared between threads, every access goes through the
// `sem_*` functions.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Create a semaphore with a count of zero.
    pub(crate) fn new() -> io::Result<Self> {
        // SAFETY: an all zeroes `sem_t` is only used as storage for `sem_init`.
        let raw = Box::new(UnsafeCell::new(unsafe {
            MaybeUninit::<libc::sem_t>::zeroed().assume_init()
        }));

        cerr(unsafe { libc::sem_init(raw.get(), 0, 0) })?;

        Ok(Self { raw })
    }

    /// Increment the count, waking one waiter if any.
    pub(crate) fn post(&self) -> bool {
        unsafe { libc::sem_post(self.raw.get()) == 0 }
    }

    /// Decrement the count, blocking while it is zero.
    pub(crate) fn wait(&self) -> io::Result<()> {
        loop {
            match cerr(unsafe { libc::sem_wait(self.raw.get()) }) {
                Ok(_) => return Ok(()),
                // a signal action ran on this thread, most likely our own
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Decrement the count, blocking for at most `timeout` while it is zero.
    ///
    /// Returns `false` if the timeout expired.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = deadline_after(timeout)?;

        loop {
            match cerr(unsafe { libc::sem_timedwait(self.raw.get(), &deadline) }) {
                Ok(_) => return Ok(true),
                Err(err) if err.raw_os_error() == Some(libc::ETIMEDOUT) => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Decrement the count if it is not zero.
    pub(crate) fn try_wait(&self) -> bool {
        unsafe { libc::sem_trywait(self.raw.get()) == 0 }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.raw.get()) };
    }
}

/// `sem_timedwait` takes an absolute `CLOCK_REALTIME` deadline.
fn deadline_after(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = MaybeUninit::<libc::timespec>::zeroed();
    cerr(unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, now.as_mut_ptr()) })?;
    let now = unsafe { now.assume_init() };

    let secs = libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX);
    let mut deadline = now;
    deadline.tv_sec = now.tv_sec.saturating_add(secs);
    deadline.tv_nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if deadline.tv_nsec >= NANOS_PER_SEC {
        deadline.tv_nsec -= NANOS_PER_SEC;
        deadline.tv_sec = deadline.tv_sec.saturating_add(1);
    }

    Ok(deadline)
}
