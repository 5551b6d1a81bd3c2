use std::{
    collections::{hash_map::Entry as MapEntry, HashMap},
    io,
};

use crate::{
    common::Error,
    log::dev_debug,
    system::signal::{signal_name, Capture, SignalHandler, SignalInfo, SignalNumber, SignalSet},
};

/// A user callback for a signal.
pub(crate) type Callback = Box<dyn FnMut(SignalNumber, &SignalInfo) + Send>;

struct Entry {
    callback: Callback,
    // dropped after `callback`, this is what undoes the OS side of the registration
    handler: SignalHandler,
}

/// The signals managed by one [`crate::SignalManager`] and their callbacks.
///
/// An entry exists exactly as long as its signal is routed into the manager's capture.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<SignalNumber, Entry>,
}

impl Registry {
    /// Add a callback for a signal that has none yet.
    pub(crate) fn insert(
        &mut self,
        signal: SignalNumber,
        callback: Callback,
        capture: &Capture,
    ) -> Result<(), Error> {
        match self.entries.entry(signal) {
            MapEntry::Occupied(_) => Err(Error::AlreadyRegistered(signal)),
            MapEntry::Vacant(vacant) => {
                let handler = SignalHandler::register(signal, capture)?;
                dev_debug!("managing {}", signal_name(signal));
                vacant.insert(Entry { callback, handler });
                Ok(())
            }
        }
    }

    /// Replace the callback for `signal` in place, or add it if there is none.
    pub(crate) fn upsert(
        &mut self,
        signal: SignalNumber,
        callback: Callback,
        capture: &Capture,
    ) -> Result<(), Error> {
        match self.entries.get_mut(&signal) {
            Some(entry) => {
                entry.callback = callback;
                Ok(())
            }
            None => self.insert(signal, callback, capture),
        }
    }

    /// Returns whether there was an entry for `signal`.
    pub(crate) fn remove(&mut self, signal: SignalNumber) -> bool {
        let removed = self.entries.remove(&signal).is_some();
        if removed {
            dev_debug!("released {}", signal_name(signal));
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        for (signal, entry) in self.entries.drain() {
            debug_assert_eq!(signal, entry.handler.signal());
            dev_debug!("released {}", signal_name(signal));
        }
    }

    pub(crate) fn contains(&self, signal: SignalNumber) -> bool {
        self.entries.contains_key(&signal)
    }

    pub(crate) fn signals(&self) -> impl Iterator<Item = SignalNumber> + '_ {
        self.entries.keys().copied()
    }

    /// The set to unblock while waiting for signals.
    pub(crate) fn managed_set(&self) -> io::Result<SignalSet> {
        SignalSet::from_signals(self.signals())
    }

    /// Run the callback registered for the signal in `info`.
    ///
    /// Returns `false` if the signal has no callback, which happens when it was removed after
    /// being captured.
    pub(crate) fn dispatch(&mut self, info: &SignalInfo) -> bool {
        let signal = info.signal();
        match self.entries.get_mut(&signal) {
            Some(entry) => {
                (entry.callback)(signal, info);
                true
            }
            None => false,
        }
    }
}
