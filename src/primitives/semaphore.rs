/*!
 * Counting Semaphore
 *
 * Multi-permit shared-mode primitive over the synchronizer core. The state
 * word holds the available permit count. Fairness follows the lock: fair
 * acquisition refuses to barge past queued waiters, unfair races the CAS.
 * A release of n permits cascades through up to n queued acquirers via
 * shared wake propagation.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::errors::Interrupted;
use crate::sync::{StateWord, SyncOps, SyncView, Synchronizer};

struct SemaphoreOps {
    fair: bool,
}

impl SemaphoreOps {
    /// Barging permit grab, shared by the unfair policy and `try_acquire`.
    fn try_permits(&self, state: &StateWord, requested: usize) -> isize {
        loop {
            let available = state.get();
            let Some(remaining) = available.checked_sub(requested) else {
                return -1;
            };
            if state.compare_and_set(available, remaining) {
                return remaining as isize;
            }
        }
    }
}

impl SyncOps for SemaphoreOps {
    fn try_acquire_shared(&self, view: &SyncView<'_>, arg: usize) -> isize {
        if self.fair && view.has_queued_predecessors() {
            return -1;
        }
        self.try_permits(view.state(), arg)
    }

    fn try_release_shared(&self, view: &SyncView<'_>, arg: usize) -> bool {
        loop {
            let available = view.state().get();
            let next = available
                .checked_add(arg)
                .unwrap_or_else(|| panic!("semaphore permit count overflow"));
            if view.state().compare_and_set(available, next) {
                return true;
            }
        }
    }
}

/// Counting semaphore with interruptible, timed and fair acquisition.
pub struct Semaphore {
    sync: Arc<Synchronizer<SemaphoreOps>>,
}

impl Semaphore {
    /// New unfair semaphore with `permits` available.
    pub fn new(permits: usize) -> Self {
        Self {
            sync: Arc::new(Synchronizer::with_state(
                SemaphoreOps { fair: false },
                permits,
            )),
        }
    }

    /// New fair semaphore: permits go to waiters in arrival order.
    pub fn fair(permits: usize) -> Self {
        Self {
            sync: Arc::new(Synchronizer::with_state(
                SemaphoreOps { fair: true },
                permits,
            )),
        }
    }

    #[inline]
    pub fn is_fair(&self) -> bool {
        self.sync.ops().fair
    }

    /// Take one permit, blocking interruptibly.
    pub fn acquire(&self) -> Result<(), Interrupted> {
        self.acquire_many(1)
    }

    /// Take `permits` permits atomically, blocking interruptibly.
    pub fn acquire_many(&self, permits: usize) -> Result<(), Interrupted> {
        self.sync.acquire_shared_interruptibly(permits)
    }

    /// Take one permit, ignoring interrupts (deferred re-assert).
    pub fn acquire_uninterruptibly(&self) {
        self.sync.acquire_shared(1);
    }

    pub fn acquire_many_uninterruptibly(&self, permits: usize) {
        self.sync.acquire_shared(permits);
    }

    /// Single barging attempt, even on a fair semaphore.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_many(1)
    }

    pub fn try_acquire_many(&self, permits: usize) -> bool {
        self.sync.ops().try_permits(self.sync.state(), permits) >= 0
    }

    /// Take one permit within `timeout`; `Ok(false)` = budget elapsed.
    pub fn try_acquire_for(&self, timeout: Duration) -> Result<bool, Interrupted> {
        self.sync.try_acquire_shared_for(1, timeout)
    }

    pub fn try_acquire_many_for(
        &self,
        permits: usize,
        timeout: Duration,
    ) -> Result<bool, Interrupted> {
        self.sync.try_acquire_shared_for(permits, timeout)
    }

    pub fn try_acquire_until(&self, deadline: Instant) -> Result<bool, Interrupted> {
        self.sync.try_acquire_shared_until(1, deadline)
    }

    /// Return one permit.
    pub fn release(&self) {
        self.release_many(1);
    }

    /// Return `permits` permits, waking up to that many waiters.
    pub fn release_many(&self, permits: usize) {
        self.sync.release_shared(permits);
    }

    /// Available permits (racy by nature; for monitoring).
    pub fn available_permits(&self) -> usize {
        self.sync.state().get()
    }

    /// Atomically take every available permit, returning how many.
    pub fn drain_permits(&self) -> usize {
        loop {
            let available = self.sync.state().get();
            if available == 0 || self.sync.state().compare_and_set(available, 0) {
                return available;
            }
        }
    }

    /// Shrink the permit pool without blocking (capacity adjustment).
    /// Saturates at zero.
    pub fn reduce_permits(&self, permits: usize) {
        loop {
            let available = self.sync.state().get();
            let next = available.saturating_sub(permits);
            if self.sync.state().compare_and_set(available, next) {
                return;
            }
        }
    }

    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }

    pub fn queue_length(&self) -> usize {
        self.sync.queue_len()
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available_permits())
            .field("fair", &self.is_fair())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_accounting() {
        let sem = Semaphore::new(3);
        sem.acquire().unwrap();
        sem.acquire_many(2).unwrap();
        assert_eq!(sem.available_permits(), 0);
        assert!(!sem.try_acquire());
        sem.release_many(3);
        assert_eq!(sem.available_permits(), 3);
    }

    #[test]
    fn test_drain_and_reduce() {
        let sem = Semaphore::new(5);
        sem.reduce_permits(2);
        assert_eq!(sem.available_permits(), 3);
        assert_eq!(sem.drain_permits(), 3);
        assert_eq!(sem.available_permits(), 0);
        assert_eq!(sem.drain_permits(), 0);
        // Reduce saturates rather than underflowing
        sem.reduce_permits(10);
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn test_try_acquire_many_needs_enough_permits() {
        let sem = Semaphore::new(2);
        assert!(!sem.try_acquire_many(3));
        assert!(sem.try_acquire_many(2));
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn test_timed_acquire_times_out_empty() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert_eq!(sem.try_acquire_for(Duration::from_millis(50)), Ok(false));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
