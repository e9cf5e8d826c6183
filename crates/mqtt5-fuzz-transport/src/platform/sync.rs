//! Event-group and recursive-lock primitives for the emulated platform.

use parking_lot::{Condvar, Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::time::{Duration, Instant};

/// Bit flags that threads can set, clear and wait on.
#[derive(Debug, Default)]
pub struct EventGroup {
    bits: Mutex<u32>,
    changed: Condvar,
}

impl EventGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `bits`, wakes all waiters and returns the new value.
    pub fn set_bits(&self, bits: u32) -> u32 {
        let mut guard = self.bits.lock();
        *guard |= bits;
        self.changed.notify_all();
        *guard
    }

    /// Clears `bits` and returns the new value.
    pub fn clear_bits(&self, bits: u32) -> u32 {
        let mut guard = self.bits.lock();
        *guard &= !bits;
        *guard
    }

    #[must_use]
    pub fn get_bits(&self) -> u32 {
        *self.bits.lock()
    }

    /// Waits until any (or, with `wait_for_all`, every) bit of `mask` is set,
    /// or `timeout` elapses. `None`, or a timeout too large to add to the
    /// current instant, waits forever.
    ///
    /// Returns the bits as they were when the wait ended; `clear_on_exit`
    /// clears `mask` only if the condition was met.
    pub fn wait_bits(
        &self,
        mask: u32,
        clear_on_exit: bool,
        wait_for_all: bool,
        timeout: Option<Duration>,
    ) -> u32 {
        let satisfied = |bits: u32| {
            if wait_for_all {
                bits & mask == mask
            } else {
                bits & mask != 0
            }
        };

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut guard = self.bits.lock();
        while !satisfied(*guard) {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut guard, deadline).timed_out() {
                        break;
                    }
                }
                None => self.changed.wait(&mut guard),
            }
        }

        let observed = *guard;
        if clear_on_exit && satisfied(observed) {
            *guard &= !mask;
        }
        observed
    }
}

/// Recursive lock serializing a client's public API.
#[derive(Debug, Default)]
pub struct ApiLock {
    inner: ReentrantMutex<()>,
}

impl ApiLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.lock()
    }

    pub fn try_acquire_for(&self, timeout: Duration) -> Option<ReentrantMutexGuard<'_, ()>> {
        self.inner.try_lock_for(timeout)
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_clear_get() {
        let group = EventGroup::new();
        assert_eq!(group.set_bits(0b0101), 0b0101);
        assert_eq!(group.clear_bits(0b0001), 0b0100);
        assert_eq!(group.get_bits(), 0b0100);
    }

    #[test]
    fn test_wait_any_returns_immediately_when_set() {
        let group = EventGroup::new();
        group.set_bits(0b0010);
        let bits = group.wait_bits(0b0011, true, false, Some(Duration::ZERO));
        assert_eq!(bits, 0b0010);
        assert_eq!(group.get_bits(), 0);
    }

    #[test]
    fn test_wait_with_unbounded_timeout_when_already_set() {
        let group = EventGroup::new();
        group.set_bits(0b0001);
        let bits = group.wait_bits(0b0001, false, false, Some(Duration::MAX));
        assert_eq!(bits, 0b0001);
        assert_eq!(group.get_bits(), 0b0001);
    }

    #[test]
    fn test_wait_all_times_out() {
        let group = EventGroup::new();
        group.set_bits(0b0001);
        let bits = group.wait_bits(0b0011, true, true, Some(Duration::from_millis(10)));
        assert_eq!(bits, 0b0001);
        assert_eq!(group.get_bits(), 0b0001);
    }

    #[test]
    fn test_wait_wakes_on_signal_from_other_thread() {
        let group = Arc::new(EventGroup::new());
        let signaller = Arc::clone(&group);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            signaller.set_bits(0b1000);
        });

        let bits = group.wait_bits(0b1000, false, true, Some(Duration::from_secs(5)));
        handle.join().unwrap();
        assert_eq!(bits & 0b1000, 0b1000);
    }

    #[test]
    fn test_api_lock_is_reentrant() {
        let lock = ApiLock::new();
        let outer = lock.acquire();
        let inner = lock.acquire();
        assert!(lock.is_held());
        drop(inner);
        drop(outer);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_api_lock_contended() {
        let lock = Arc::new(ApiLock::new());
        let guard = lock.acquire();
        let other = Arc::clone(&lock);
        let acquired = thread::spawn(move || other.try_acquire_for(Duration::from_millis(10)).is_some())
            .join()
            .unwrap();
        assert!(!acquired);
        drop(guard);
    }

    #[test]
    fn test_api_lock_serializes_threads() {
        let lock = Arc::new(ApiLock::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|id| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let _guard = lock.acquire();
                    let _nested = lock.acquire();
                    counter.lock().push((id, "enter"));
                    thread::sleep(Duration::from_millis(1));
                    counter.lock().push((id, "exit"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let log = counter.lock();
        assert_eq!(log.len(), 8);
        for pair in log.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0);
            assert_eq!((pair[0].1, pair[1].1), ("enter", "exit"));
        }
    }
}
