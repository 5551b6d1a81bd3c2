use crate::{
    cutils::{cerr, cerr_errno},
    system::make_zeroed_sigaction,
};

use super::{handler::SignalHandlerBehavior, SignalNumber};

use std::{io, mem::MaybeUninit};

#[repr(transparent)]
pub(super) struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    pub(super) fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        // System calls interrupted by the capture action are restarted instead of failing with
        // EINTR in whichever thread the signal landed on.
        let mut sa_flags = libc::SA_RESTART;

        // The capture action runs with every signal blocked so it cannot be re-entered halfway
        // through a queue push.
        let (sa_sigaction, sa_mask) = match behavior {
            SignalHandlerBehavior::Default => (libc::SIG_DFL, SignalSet::empty()?),
            SignalHandlerBehavior::Capture => {
                // Specify that we want to pass a signal-catching function in `sa_sigaction`.
                sa_flags |= libc::SA_SIGINFO;
                (
                    super::capture::capture_siginfo as libc::sighandler_t,
                    SignalSet::full()?,
                )
            }
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = sa_mask.raw;
        raw.sa_flags = sa_flags;

        Ok(Self { raw })
    }

    /// Install this action for `signal`, returning the action that was installed before.
    pub(super) fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_action.assume_init() })
    }

    /// Read the action currently installed for `signal`.
    #[cfg(test)]
    pub(super) fn current(signal: SignalNumber) -> io::Result<Self> {
        let mut action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, std::ptr::null(), action.as_mut_ptr().cast()) })?;

        Ok(unsafe { action.assume_init() })
    }

    #[cfg(test)]
    pub(super) fn handler(&self) -> libc::sighandler_t {
        self.raw.sa_sigaction
    }
}

/// A signal set that can be used to mask signals.
#[repr(transparent)]
pub struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// Create an empty set.
    pub fn empty() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigemptyset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    pub fn full() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set from the signals yielded by `signals`.
    pub fn from_signals(signals: impl IntoIterator<Item = SignalNumber>) -> io::Result<Self> {
        let mut set = Self::empty()?;
        for signal in signals {
            set.add(signal)?;
        }
        Ok(set)
    }

    /// The set of signals currently blocked for the calling thread.
    pub fn current_mask() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr_errno(unsafe {
            libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), set.as_mut_ptr().cast())
        })?;

        Ok(unsafe { set.assume_init() })
    }

    pub fn add(&mut self, signal: SignalNumber) -> io::Result<()> {
        cerr(unsafe { libc::sigaddset(&mut self.raw, signal) }).map(drop)
    }

    pub fn contains(&self, signal: SignalNumber) -> bool {
        unsafe { libc::sigismember(&self.raw, signal) == 1 }
    }

    fn pthread_sigmask(&self, how: libc::c_int) -> io::Result<Self> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        cerr_errno(unsafe {
            libc::pthread_sigmask(how, &self.raw, original_set.as_mut_ptr().cast())
        })?;

        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set for the calling thread and return the previous set of
    /// blocked signals.
    ///
    /// Threads spawned afterwards by this thread start with the same mask.
    pub fn block(&self) -> io::Result<Self> {
        self.pthread_sigmask(libc::SIG_BLOCK)
    }

    /// Unblock all the signals in this set for the calling thread and return the previous set of
    /// blocked signals.
    pub fn unblock(&self) -> io::Result<Self> {
        self.pthread_sigmask(libc::SIG_UNBLOCK)
    }
}

/// Block `signal` for the calling thread.
pub fn block_signal(signal: SignalNumber) -> io::Result<()> {
    SignalSet::from_signals([signal])?.block().map(drop)
}

/// Unblock `signal` for the calling thread.
pub fn unblock_signal(signal: SignalNumber) -> io::Result<()> {
    SignalSet::from_signals([signal])?.unblock().map(drop)
}
