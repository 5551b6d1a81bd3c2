use std::io;

/// Capacity used by [`Config::default`].
pub const DEFAULT_CAPACITY: usize = 31;

/// The pending queue implementation a manager uses to hand signals over to its processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// A preallocated buffer behind a mutex that signal actions only ever `try_lock`.
    Locked,
    /// A lock-free bounded queue.
    LockFree,
}

impl Default for QueueKind {
    fn default() -> Self {
        if cfg!(feature = "lockfree") {
            QueueKind::LockFree
        } else {
            QueueKind::Locked
        }
    }
}

/// Settings fixed when a [`crate::SignalManager`] is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub queue: QueueKind,
    /// Maximum number of captured signals waiting to be dispatched. Signals arriving while the
    /// queue is full are dropped.
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueKind::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    pub fn with_queue(mut self, queue: QueueKind) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> io::Result<()> {
        if self.capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "signal queue capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
