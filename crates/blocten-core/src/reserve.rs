//! Shared memory-budget ledger.
//!
//! A [`MemoryReserve`] tracks how many bytes of a fixed ceiling are
//! committed to live tensors. Tensors attach at construction or later and
//! detach on drop; the remaining budget feeds the batching layer. The
//! ledger is serialized internally, so attach/detach from worker threads
//! needs no external locking.

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};

/// A mutable bytes ledger with a fixed ceiling.
///
/// # Examples
///
/// ```
/// use blocten_core::MemoryReserve;
///
/// let reserve = MemoryReserve::new(1024);
/// reserve.add_tensor(1000).unwrap();
/// assert_eq!(reserve.mem_avail(), 24);
/// assert!(reserve.add_tensor(100).is_err());
/// reserve.remove_tensor(1000);
/// assert_eq!(reserve.mem_avail(), 1024);
/// ```
#[derive(Debug)]
pub struct MemoryReserve {
    ceiling: usize,
    committed: Mutex<usize>,
}

impl MemoryReserve {
    /// Create a reserve with the given ceiling in bytes.
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            committed: Mutex::new(0),
        }
    }

    /// Commit `bytes` to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfMemory`] if committing would exceed the
    /// ceiling; the ledger is left unchanged (no partial commit).
    pub fn add_tensor(&self, bytes: usize) -> CoreResult<()> {
        let mut committed = self.committed.lock();
        let available = self.ceiling - *committed;
        if bytes > available {
            return Err(CoreError::OutOfMemory {
                requested: bytes,
                available,
            });
        }
        *committed += bytes;
        Ok(())
    }

    /// Release `bytes` from the ledger.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds the committed total; releasing more than
    /// was committed is a programming error, not a runtime condition.
    pub fn remove_tensor(&self, bytes: usize) {
        let mut committed = self.committed.lock();
        assert!(
            bytes <= *committed,
            "released {} bytes with only {} committed",
            bytes,
            *committed
        );
        *committed -= bytes;
    }

    /// Remaining budget: ceiling minus committed bytes.
    pub fn mem_avail(&self) -> usize {
        self.ceiling - *self.committed.lock()
    }

    /// The fixed ceiling in bytes.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Currently committed bytes.
    pub fn committed(&self) -> usize {
        *self.committed.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let r = MemoryReserve::new(100);
        r.add_tensor(60).unwrap();
        r.add_tensor(40).unwrap();
        assert_eq!(r.mem_avail(), 0);
        r.remove_tensor(60);
        assert_eq!(r.mem_avail(), 60);
        assert_eq!(r.committed(), 40);
    }

    #[test]
    fn test_overcommit_leaves_ledger_unchanged() {
        let r = MemoryReserve::new(100);
        r.add_tensor(90).unwrap();
        let err = r.add_tensor(20).unwrap_err();
        assert_eq!(
            err,
            CoreError::OutOfMemory {
                requested: 20,
                available: 10
            }
        );
        assert_eq!(r.committed(), 90);
    }

    #[test]
    #[should_panic(expected = "released")]
    fn test_remove_below_zero_panics() {
        let r = MemoryReserve::new(100);
        r.remove_tensor(1);
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;

        let r = Arc::new(MemoryReserve::new(8 * 1024));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let r = Arc::clone(&r);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    if r.add_tensor(64).is_ok() {
                        r.remove_tensor(64);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(r.committed(), 0);
    }
}
