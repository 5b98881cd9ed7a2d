//! Compute-once cells for derived views.
//!
//! A [`Memo`] starts unset and is filled by the first successful read. It is
//! never invalidated: a fresh owner gets a fresh cell. Failed computations
//! leave the cell unset so the next read retries.

use std::sync::{Mutex, OnceLock, PoisonError};

/// Lazily computed, per-instance value.
#[derive(Debug)]
pub struct Memo<T> {
    value: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> Memo<T> {
    /// Create an unset cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The cached value, if it has been computed.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Whether the value has been computed.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the cached value, computing it with `f` on first access.
    pub fn get_or_init<F>(&self, f: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(f())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Return the cached value, computing it with `f` on first access.
    ///
    /// An `Err` from `f` is returned to the caller and nothing is cached.
    /// Concurrent first readers serialize on a per-cell lock, so `f` runs at
    /// most once per successful initialization.
    pub fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        // A panic inside `f` poisons the lock but leaves the cell unset.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let value = f()?;
        Ok(self.value.get_or_init(|| value))
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        let memo = Self::new();
        if let Some(value) = self.value.get() {
            let _ = memo.value.set(value.clone());
        }
        memo
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;

    #[test]
    fn test_computes_once() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::new();

        for _ in 0..5 {
            let value = memo.get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                42
            });
            assert_eq!(*value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.is_set());
    }

    #[test]
    fn test_starts_unset() {
        let memo: Memo<String> = Memo::new();
        assert!(!memo.is_set());
        assert!(memo.get().is_none());
    }

    #[test]
    fn test_failure_is_not_cached() {
        let calls = AtomicUsize::new(0);
        let memo: Memo<u32> = Memo::new();

        let first: Result<&u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        });
        assert_eq!(first, Err("boom"));
        assert!(!memo.is_set());

        let second: Result<&u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });
        assert_eq!(second, Ok(&7));

        let third: Result<&u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(8)
        });
        assert_eq!(third, Ok(&7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Memo::new();
        let b = Memo::new();
        assert_eq!(*a.get_or_init(|| 1), 1);
        assert_eq!(*b.get_or_init(|| 2), 2);
    }

    #[test]
    fn test_concurrent_first_access_computes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = Arc::new(Memo::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let calls = Arc::clone(&calls);
                let memo = Arc::clone(&memo);
                thread::spawn(move || {
                    *memo.get_or_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        "done"
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "done");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_carries_cached_value() {
        let memo = Memo::new();
        memo.get_or_init(|| vec![1, 2]);
        let copy = memo.clone();
        assert_eq!(copy.get(), Some(&vec![1, 2]));
    }
}
