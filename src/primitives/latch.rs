/*!
 * Countdown Latch
 *
 * One-shot gate over the shared mode of the synchronizer core. The state
 * word holds the remaining count; waiters pass once it reaches zero. The
 * final `count_down` releases every waiter in one cascading shared wake.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::errors::Interrupted;
use crate::sync::{SyncOps, SyncView, Synchronizer};

struct LatchOps;

impl SyncOps for LatchOps {
    fn try_acquire_shared(&self, view: &SyncView<'_>, _arg: usize) -> isize {
        if view.state().get() == 0 {
            1
        } else {
            -1
        }
    }

    fn try_release_shared(&self, view: &SyncView<'_>, _arg: usize) -> bool {
        // Decrement until zero; only the transition to zero opens the gate.
        loop {
            let count = view.state().get();
            if count == 0 {
                return false;
            }
            if view.state().compare_and_set(count, count - 1) {
                return count == 1;
            }
        }
    }
}

/// Gate that opens once `count` events have been counted down.
///
/// Counting down past zero is a no-op; the latch never resets.
pub struct CountDownLatch {
    sync: Arc<Synchronizer<LatchOps>>,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            sync: Arc::new(Synchronizer::with_state(LatchOps, count)),
        }
    }

    /// Block until the count reaches zero; fails fast on interruption.
    pub fn wait(&self) -> Result<(), Interrupted> {
        self.sync.acquire_shared_interruptibly(1)
    }

    /// Block until the count reaches zero or `timeout` elapses.
    /// `Ok(false)` = still counting when the budget ran out.
    pub fn wait_for(&self, timeout: Duration) -> Result<bool, Interrupted> {
        self.sync.try_acquire_shared_for(1, timeout)
    }

    /// Block until the count reaches zero or the deadline passes.
    pub fn wait_until(&self, deadline: Instant) -> Result<bool, Interrupted> {
        self.sync.try_acquire_shared_until(1, deadline)
    }

    /// Count one event down, releasing all waiters on the zero transition.
    pub fn count_down(&self) {
        self.sync.release_shared(1);
    }

    /// Remaining count (racy by nature; for monitoring).
    pub fn count(&self) -> usize {
        self.sync.state().get()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }
}

impl std::fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("count", &self.count())
            .finish()
    }
}
