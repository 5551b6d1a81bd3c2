use crate::{common::Error, log::dev_warn};

use super::{
    block_signal, capture, is_manageable, set::SignalAction, signal_name, unblock_signal, Capture,
    SignalNumber,
};

/// A signal routed into a [`Capture`].
///
/// While a value of this type is alive the signal is blocked for the thread that registered it,
/// its action is the capture trampoline and the trampoline forwards it to the owning capture.
/// Dropping it restores the default action, unblocks the signal and releases the route, in that
/// order.
pub(crate) struct SignalHandler {
    signal: SignalNumber,
}

impl SignalHandler {
    /// Route `signal` into `capture`.
    ///
    /// Either every step succeeds or none of them is left in place.
    pub(crate) fn register(signal: SignalNumber, capture: &Capture) -> Result<Self, Error> {
        if !is_manageable(signal) {
            return Err(Error::Unmanageable(signal));
        }

        if !capture::claim_route(signal, capture) {
            return Err(Error::Claimed(signal));
        }

        if let Err(err) = block_signal(signal) {
            capture::release_route(signal);
            return Err(Error::Io(Some(signal), err));
        }

        // From here on dropping `handler` undoes the partial registration.
        let handler = Self { signal };

        SignalAction::new(SignalHandlerBehavior::Capture)
            .and_then(|action| action.register(signal))
            .map_err(|err| Error::Io(Some(signal), err))?;

        Ok(handler)
    }

    pub(crate) fn signal(&self) -> SignalNumber {
        self.signal
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        let signal = self.signal;

        if let Err(err) =
            SignalAction::new(SignalHandlerBehavior::Default).and_then(|sa| sa.register(signal))
        {
            dev_warn!("cannot restore default action for {}: {err}", signal_name(signal));
        }

        if let Err(err) = unblock_signal(signal) {
            dev_warn!("cannot unblock {}: {err}", signal_name(signal));
        }

        capture::release_route(signal);
    }
}

/// The possible behaviors for a signal action.
pub(crate) enum SignalHandlerBehavior {
    /// Execute the default action for the signal.
    Default,
    /// Copy the signal information into the [`Capture`] routed for the signal.
    Capture,
}

#[cfg(test)]
mod tests {
    use super::SignalHandler;
    use crate::{
        common::{Config, Error},
        system::signal::{consts::*, set::SignalAction, Capture, SignalSet},
        testing::in_child,
    };

    #[test]
    fn register_and_drop_round_trip() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            let handler = SignalHandler::register(SIGUSR1, &capture).unwrap();
            assert_eq!(handler.signal(), SIGUSR1);

            assert!(SignalSet::current_mask().unwrap().contains(SIGUSR1));
            assert_ne!(SignalAction::current(SIGUSR1).unwrap().handler(), libc::SIG_DFL);

            drop(handler);

            assert!(!SignalSet::current_mask().unwrap().contains(SIGUSR1));
            assert_eq!(SignalAction::current(SIGUSR1).unwrap().handler(), libc::SIG_DFL);
        });
    }

    #[test]
    fn forbidden_signals_are_rejected_without_side_effects() {
        in_child(|| {
            let capture = Capture::new(&Config::default()).unwrap();
            for signal in [SIGKILL, SIGSTOP, SIGSEGV, SIGCONT] {
                assert!(matches!(
                    SignalHandler::register(signal, &capture),
                    Err(Error::Unmanageable(s)) if s == signal
                ));
                assert!(!SignalSet::current_mask().unwrap().contains(signal));
            }
        });
    }

    #[test]
    fn route_is_exclusive() {
        in_child(|| {
            let first = Capture::new(&Config::default()).unwrap();
            let second = Capture::new(&Config::default()).unwrap();

            let handler = SignalHandler::register(SIGUSR2, &first).unwrap();
            assert!(matches!(
                SignalHandler::register(SIGUSR2, &second),
                Err(Error::Claimed(SIGUSR2))
            ));
            // the failed attempt must not have undone the first registration
            assert!(SignalSet::current_mask().unwrap().contains(SIGUSR2));

            drop(handler);
            let handler = SignalHandler::register(SIGUSR2, &second).unwrap();
            drop(handler);
        });
    }
}
