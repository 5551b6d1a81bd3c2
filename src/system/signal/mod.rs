//! Utilities to handle signals.
use std::borrow::Cow;

mod capture;
mod handler;
mod info;
mod set;

pub(crate) use capture::Capture;
pub(crate) use handler::SignalHandler;
#[cfg(test)]
pub(crate) use info::synthetic;
pub use info::SignalInfo;
pub use set::{block_signal, unblock_signal, SignalSet};

pub type SignalNumber = libc::c_int;

/// Number of slots in per-signal tables, one past the highest signal number Linux can deliver.
pub(crate) const SIGNAL_SLOTS: usize = 65;

/// Signals whose default action must never be replaced by the dispatcher.
const FORBIDDEN: &[SignalNumber] = &[
    consts::SIGSEGV,
    consts::SIGKILL,
    consts::SIGSTOP,
    consts::SIGCONT,
];

/// Returns whether `signal` can be handed over to a [`crate::SignalManager`].
///
/// This rejects numbers the OS does not know about as well as signals whose disposition must
/// stay untouched: `SIGSEGV`, `SIGKILL`, `SIGSTOP` and `SIGCONT`.
///
/// The numbers between the standard signals and `SIGRTMIN` are accepted here, but glibc keeps
/// them for its own threads and refuses to install an action for them. Registering one fails
/// with [`crate::Error::Io`] and leaves nothing behind.
pub fn is_manageable(signal: SignalNumber) -> bool {
    let in_range = signal > 0 && signal <= libc::SIGRTMAX() && (signal as usize) < SIGNAL_SLOTS;
    in_range && !FORBIDDEN.contains(&signal)
}

macro_rules! define_consts {
    ($($signal:ident,)*) => {
        pub mod consts {
            pub use libc::{$($signal,)*};
        }

        /// A human readable name for `signal`.
        pub fn signal_name(signal: SignalNumber) -> Cow<'static, str> {
            match signal {
                $(consts::$signal => Cow::Borrowed(stringify!($signal)),)*
                rt if rt >= libc::SIGRTMIN() && rt <= libc::SIGRTMAX() => {
                    Cow::Owned(format!("SIGRTMIN+{}", rt - libc::SIGRTMIN()))
                }
                other => Cow::Owned(format!("signal {other}")),
            }
        }
    };
}

define_consts! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGTERM,
    SIGHUP,
    SIGALRM,
    SIGPIPE,
    SIGUSR1,
    SIGUSR2,
    SIGCHLD,
    SIGCONT,
    SIGWINCH,
    SIGTTIN,
    SIGTTOU,
    SIGKILL,
    SIGSTOP,
    SIGSEGV,
}

#[cfg(test)]
mod tests {
    use super::{consts::*, is_manageable, signal_name};

    #[test]
    fn forbidden_signals_are_not_manageable() {
        for signal in [SIGSEGV, SIGKILL, SIGSTOP, SIGCONT] {
            assert!(!is_manageable(signal), "{}", signal_name(signal));
        }
    }

    #[test]
    fn out_of_range_numbers_are_not_manageable() {
        assert!(!is_manageable(0));
        assert!(!is_manageable(-1));
        assert!(!is_manageable(libc::SIGRTMAX() + 1));
        assert!(!is_manageable(1000));
    }

    #[test]
    fn common_and_realtime_signals_are_manageable() {
        for signal in [SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2, SIGCHLD, SIGWINCH] {
            assert!(is_manageable(signal), "{}", signal_name(signal));
        }
        assert!(is_manageable(libc::SIGRTMIN()));
        assert!(is_manageable(libc::SIGRTMIN() + 13));
        assert!(is_manageable(libc::SIGRTMAX()));
    }

    #[test]
    fn names() {
        assert_eq!(signal_name(SIGUSR1), "SIGUSR1");
        assert_eq!(signal_name(libc::SIGRTMIN() + 13), "SIGRTMIN+13");
        assert_eq!(signal_name(0), "signal 0");
    }
}
