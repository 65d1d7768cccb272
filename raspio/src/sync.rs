/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Locks for callers that share multi-step register sequences between threads.
//!
//! Register operations themselves take no locks: single word writes are atomic on the bus,
//! and a sequence such as the pull strobe is the caller's to serialise. Four process-wide
//! keyed locks are provided for that, selected by the caller.

use parking_lot::{Mutex, MutexGuard};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

pub mod interface {
    /// Closure-scoped exclusive access to `Data`.
    pub trait Mutex {
        type Data: ?Sized;

        fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R;
    }
}

/// A real lock around `T`, usable from any thread.
pub struct ThreadLock<T: ?Sized> {
    inner: Mutex<T>,
}

/// Selects one of the four process-wide locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Zero,
    One,
    Two,
    Three,
}

/// Held while a keyed lock is taken, released on drop.
pub struct KeyGuard(#[allow(dead_code)] MutexGuard<'static, ()>);

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

static KEYED: [ThreadLock<()>; 4] = [
    ThreadLock::new(()),
    ThreadLock::new(()),
    ThreadLock::new(()),
    ThreadLock::new(()),
];

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl<T> ThreadLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }
}

impl LockKey {
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for LockKey {
    type Error = u8;

    fn try_from(key: u8) -> Result<Self, Self::Error> {
        match key {
            0 => Ok(LockKey::Zero),
            1 => Ok(LockKey::One),
            2 => Ok(LockKey::Two),
            3 => Ok(LockKey::Three),
            other => Err(other),
        }
    }
}

/// Run `f` while holding the lock selected by `key`.
pub fn lock<R>(key: LockKey, f: impl FnOnce() -> R) -> R {
    use interface::Mutex;
    KEYED[key.index()].lock(|_| f())
}

/// Take the lock selected by `key` until the returned guard is dropped.
pub fn acquire(key: LockKey) -> KeyGuard {
    KeyGuard(KEYED[key.index()].inner.lock())
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

impl<T: ?Sized> interface::Mutex for ThreadLock<T> {
    type Data = T;

    fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R {
        let mut data = self.inner.lock();
        f(&mut data)
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{
            sync::{
                atomic::{AtomicUsize, Ordering},
                Arc,
            },
            thread,
        },
    };

    #[test]
    fn keyed_lock_serialises_read_modify_write() {
        let counter = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        lock(LockKey::Two, || {
                            // Deliberately split load and store.
                            let value = counter.load(Ordering::Relaxed);
                            counter.store(value + 1, Ordering::Relaxed);
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4000);
    }

    #[test]
    fn distinct_keys_do_not_block_each_other() {
        let _held = acquire(LockKey::Zero);
        assert_eq!(lock(LockKey::One, || 7), 7);
    }

    #[test]
    fn key_from_index() {
        assert_eq!(LockKey::try_from(3), Ok(LockKey::Three));
        assert_eq!(LockKey::try_from(4), Err(4));
    }

    #[test]
    fn wrapped_data_is_mutable_inside_the_closure() {
        use interface::Mutex;
        let lock = ThreadLock::new(vec![1u32]);
        lock.lock(|v| v.push(2));
        assert_eq!(lock.lock(|v| v.clone()), vec![1, 2]);
    }
}
