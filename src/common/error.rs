use crate::system::signal::{signal_name, SignalNumber};
use std::fmt;

/// Why a handler could not be registered.
#[derive(Debug)]
pub enum Error {
    /// The signal is outside the OS range or its action must never be overridden.
    Unmanageable(SignalNumber),
    /// `set_handler` was called for a signal that already has a handler.
    AlreadyRegistered(SignalNumber),
    /// Another manager in this process already routes the signal.
    Claimed(SignalNumber),
    /// A processing loop holds the handler registry.
    Busy,
    /// Blocking the signal or installing its action failed. The registration was rolled back.
    Io(Option<SignalNumber>, std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unmanageable(signal) => {
                write!(f, "the {} signal cannot be managed", signal_name(*signal))
            }
            Error::AlreadyRegistered(signal) => {
                write!(f, "a handler for {} is already set", signal_name(*signal))
            }
            Error::Claimed(signal) => write!(
                f,
                "{} is already managed by another signal manager",
                signal_name(*signal)
            ),
            Error::Busy => f.write_str("signals are being processed"),
            Error::Io(signal, e) => {
                if let Some(signal) = signal {
                    write!(f, "cannot set up {}: {e}", signal_name(*signal))
                } else {
                    write!(f, "IO error: {e}")
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(None, err)
    }
}

impl Error {
    /// Returns `true` if retrying once processing has stopped may succeed.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::system::signal::consts::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages() {
        assert_eq!(
            Error::Unmanageable(SIGKILL).to_string(),
            "the SIGKILL signal cannot be managed"
        );
        assert_eq!(
            Error::AlreadyRegistered(SIGUSR1).to_string(),
            "a handler for SIGUSR1 is already set"
        );
        assert_eq!(Error::Busy.to_string(), "signals are being processed");
        let io = std::io::Error::from_raw_os_error(libc::EINVAL);
        assert!(Error::Io(Some(SIGHUP), io)
            .to_string()
            .starts_with("cannot set up SIGHUP: "));
    }

    #[test]
    fn only_contention_is_busy() {
        assert!(Error::Busy.is_busy());
        assert!(!Error::Claimed(SIGTERM).is_busy());
    }
}
