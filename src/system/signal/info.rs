use std::fmt;

use crate::system::interface::{ProcessId, UserId};

use super::{signal_name, SignalNumber};

/// Information related to the arrival of a signal.
///
/// This is a copy of the `siginfo_t` the kernel handed to the signal action, taken before the
/// action returned.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct SignalInfo {
    info: libc::siginfo_t,
}

// SAFETY: on Linux `siginfo_t` is plain integers, it holds no pointer the kernel expects us to
// dereference from another thread.
unsafe impl Send for SignalInfo {}
unsafe impl Sync for SignalInfo {}

impl SignalInfo {
    pub(crate) fn from_raw(info: libc::siginfo_t) -> Self {
        Self { info }
    }

    /// Gets the signal number.
    pub fn signal(&self) -> SignalNumber {
        self.info.si_signo
    }

    /// Gets the `si_code` describing why the signal was sent.
    pub fn code(&self) -> libc::c_int {
        self.info.si_code
    }

    /// Gets the `si_errno` value, zero for almost every signal.
    pub fn errno(&self) -> libc::c_int {
        self.info.si_errno
    }

    /// Returns whether the signal was sent by a process (`kill`, `sigqueue`, `tgkill`) rather
    /// than by the kernel.
    pub fn is_user_signaled(&self) -> bool {
        // SI_USER is 0 and every other user originated code is negative.
        self.info.si_code <= 0
    }

    /// Gets the PID that sent the signal.
    ///
    /// Only meaningful for user signaled records and for `SIGCHLD`.
    pub fn pid(&self) -> ProcessId {
        // SAFETY: the union field is always readable, it is just zero when not set.
        ProcessId::new(unsafe { self.info.si_pid() })
    }

    /// Gets the real user ID of the sending process.
    pub fn uid(&self) -> UserId {
        // SAFETY: see `pid`.
        UserId::new(unsafe { self.info.si_uid() })
    }

    /// Access the raw record.
    pub fn as_raw(&self) -> &libc::siginfo_t {
        &self.info
    }
}

impl fmt::Debug for SignalInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalInfo")
            .field("signal", &signal_name(self.signal()))
            .field("code", &self.code())
            .field("pid", &self.pid())
            .field("uid", &self.uid())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn synthetic(signal: SignalNumber, code: libc::c_int) -> SignalInfo {
    // SAFETY: `siginfo_t` is a C struct, all zeroes is a valid value.
    let mut raw: libc::siginfo_t = unsafe { std::mem::zeroed() };
    raw.si_signo = signal;
    raw.si_code = code;
    SignalInfo::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::synthetic;
    use crate::system::signal::consts::*;

    #[test]
    fn accessors() {
        let info = synthetic(SIGUSR2, 0);
        assert_eq!(info.signal(), SIGUSR2);
        assert_eq!(info.code(), 0);
        assert_eq!(info.errno(), 0);
        assert!(info.is_user_signaled());
        assert_eq!(info.pid().get(), 0);

        // SI_KERNEL
        let info = synthetic(SIGUSR2, 0x80);
        assert!(!info.is_user_signaled());
    }

    #[test]
    fn debug_uses_signal_name() {
        let info = synthetic(SIGHUP, 0);
        assert!(format!("{info:?}").contains("SIGHUP"));
    }
}
