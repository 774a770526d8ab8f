/*!
 * State Word
 *
 * The single atomically-modifiable integer at the heart of every
 * synchronizer. Its semantics are defined entirely by the concrete
 * primitive: 0 = unlocked / hold count for a reentrant lock, permit count
 * for a semaphore, remaining count for a latch.
 *
 * All transitions go through `compare_and_set` or release-ordered stores;
 * reads are acquire-ordered.
 */

use std::sync::atomic::{AtomicUsize, Ordering};

/// Word-sized synchronizer state with acquire/release semantics.
pub struct StateWord(AtomicUsize);

impl StateWord {
    #[inline]
    pub const fn new(initial: usize) -> Self {
        Self(AtomicUsize::new(initial))
    }

    /// Acquire-ordered read of the current state.
    #[inline]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Release-ordered unconditional write.
    ///
    /// Only sound while the caller holds exclusive ownership; contended
    /// transitions must use `compare_and_set`.
    #[inline]
    pub fn set(&self, value: usize) {
        self.0.store(value, Ordering::Release);
    }

    /// Atomically set the state to `update` if it currently equals `expect`.
    #[inline]
    pub fn compare_and_set(&self, expect: usize, update: usize) -> bool {
        self.0
            .compare_exchange(expect, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for StateWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateWord").field(&self.get()).finish()
    }
}
