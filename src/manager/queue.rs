use std::{
    collections::VecDeque,
    io,
    sync::{Mutex, PoisonError, TryLockError},
};

use crossbeam_queue::ArrayQueue;

use crate::{
    common::{Config, QueueKind},
    system::signal::SignalInfo,
};

/// How many times a signal action retries a contended [`LockedQueue`] before dropping the record.
const PUSH_ATTEMPTS: usize = 64;

/// A bounded FIFO of captured signals.
///
/// `push` is called from signal context and therefore must not allocate, block or panic.
pub trait SignalQueue {
    /// Append `info`, returning `false` if it was dropped.
    fn push(&self, info: SignalInfo) -> bool;
    fn pop(&self) -> Option<SignalInfo>;
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
}

/// A preallocated ring behind a mutex.
///
/// Pushing only ever uses `try_lock`: a signal action that interrupts the thread holding the lock
/// gives up after a few attempts instead of deadlocking.
pub struct LockedQueue {
    slots: Mutex<VecDeque<SignalInfo>>,
    capacity: usize,
}

impl LockedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn push_locked(&self, slots: &mut VecDeque<SignalInfo>, info: SignalInfo) -> bool {
        // the length check keeps `push_back` from reallocating
        if slots.len() < self.capacity {
            slots.push_back(info);
            true
        } else {
            false
        }
    }
}

impl SignalQueue for LockedQueue {
    fn push(&self, info: SignalInfo) -> bool {
        for _ in 0..PUSH_ATTEMPTS {
            match self.slots.try_lock() {
                Ok(mut slots) => return self.push_locked(&mut slots, info),
                Err(TryLockError::Poisoned(poisoned)) => {
                    return self.push_locked(&mut poisoned.into_inner(), info)
                }
                Err(TryLockError::WouldBlock) => std::hint::spin_loop(),
            }
        }
        false
    }

    fn pop(&self) -> Option<SignalInfo> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A lock-free bounded queue.
pub struct LockFreeQueue {
    inner: ArrayQueue<SignalInfo>,
}

impl LockFreeQueue {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }
}

impl SignalQueue for LockFreeQueue {
    fn push(&self, info: SignalInfo) -> bool {
        self.inner.push(info).is_ok()
    }

    fn pop(&self) -> Option<SignalInfo> {
        self.inner.pop()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

/// The queue selected by [`Config::queue`].
///
/// An enum rather than a trait object so the signal action never goes through a vtable.
pub(crate) enum PendingQueue {
    Locked(LockedQueue),
    LockFree(LockFreeQueue),
}

impl PendingQueue {
    pub(crate) fn new(config: &Config) -> io::Result<Self> {
        config.validate()?;
        Ok(match config.queue {
            QueueKind::Locked => Self::Locked(LockedQueue::new(config.capacity)),
            QueueKind::LockFree => Self::LockFree(LockFreeQueue::new(config.capacity)),
        })
    }
}

impl SignalQueue for PendingQueue {
    fn push(&self, info: SignalInfo) -> bool {
        match self {
            Self::Locked(queue) => queue.push(info),
            Self::LockFree(queue) => queue.push(info),
        }
    }

    fn pop(&self) -> Option<SignalInfo> {
        match self {
            Self::Locked(queue) => queue.pop(),
            Self::LockFree(queue) => queue.pop(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Locked(queue) => queue.is_empty(),
            Self::LockFree(queue) => queue.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Locked(queue) => queue.len(),
            Self::LockFree(queue) => queue.len(),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Self::Locked(queue) => queue.capacity(),
            Self::LockFree(queue) => queue.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{LockedQueue, PendingQueue, SignalQueue};
    use crate::{
        common::{Config, QueueKind},
        system::signal::{consts::*, synthetic},
    };

    fn both(capacity: usize) -> [PendingQueue; 2] {
        [QueueKind::Locked, QueueKind::LockFree].map(|queue| {
            PendingQueue::new(&Config { queue, capacity }).unwrap()
        })
    }

    #[test]
    fn fifo_order() {
        for queue in both(4) {
            assert!(queue.is_empty());
            assert!(queue.push(synthetic(SIGUSR1, 0)));
            assert!(queue.push(synthetic(SIGUSR2, 0)));
            assert!(queue.push(synthetic(SIGHUP, 0)));
            assert_eq!(queue.len(), 3);

            let order: Vec<_> = std::iter::from_fn(|| queue.pop())
                .map(|info| info.signal())
                .collect();
            assert_eq!(order, [SIGUSR1, SIGUSR2, SIGHUP]);
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn full_queue_drops() {
        for queue in both(2) {
            assert_eq!(queue.capacity(), 2);
            assert!(queue.push(synthetic(SIGUSR1, 0)));
            assert!(queue.push(synthetic(SIGUSR1, 0)));
            assert!(!queue.push(synthetic(SIGTERM, 0)));
            assert_eq!(queue.len(), 2);

            // room again after a pop
            assert!(queue.pop().is_some());
            assert!(queue.push(synthetic(SIGTERM, 0)));
            assert_eq!(queue.pop().unwrap().signal(), SIGUSR1);
            assert_eq!(queue.pop().unwrap().signal(), SIGTERM);
        }
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        assert!(PendingQueue::new(&Config::default().with_capacity(0)).is_err());
    }

    #[test]
    fn contended_locked_queue_gives_up() {
        let queue = LockedQueue::new(4);
        let guard = queue.slots.lock().unwrap();
        assert!(!queue.push(synthetic(SIGUSR1, 0)));
        drop(guard);
        assert!(queue.push(synthetic(SIGUSR1, 0)));
    }

    #[test]
    fn concurrent_producers() {
        for queue in both(64) {
            let queue = Arc::new(queue);
            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = queue.clone();
                    std::thread::spawn(move || {
                        (0..16)
                            .filter(|_| queue.push(synthetic(SIGUSR1, 0)))
                            .count()
                    })
                })
                .collect();

            let pushed: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
            assert_eq!(queue.len(), pushed);
            assert!(pushed <= 64);
        }
    }
}
