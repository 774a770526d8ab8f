/*!
 * Reentrant Lock
 *
 * Exclusive-mode mutex over the synchronizer core. The state word holds
 * the reentrant hold count; ownership is tracked by the holder's
 * process-unique thread token. Fairness is a pure `try_acquire` policy:
 * the fair variant refuses to barge past queued waiters, the unfair
 * variant (default) races the CAS and wins whenever it can.
 */

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::core::errors::{Interrupted, LockError};
use crate::core::interrupt;
use crate::sync::{Condition, StateWord, SyncOps, SyncView, Synchronizer};

/// Hook set backing `ReentrantLock`. Public only so lock conditions are
/// nameable as `Condition<LockOps>`.
pub struct LockOps {
    fair: bool,
    owner: AtomicU64,
}

impl LockOps {
    fn new(fair: bool) -> Self {
        Self {
            fair,
            owner: AtomicU64::new(0),
        }
    }

    /// Barging acquire attempt, used by the unfair policy and by
    /// `try_lock` regardless of fairness.
    fn try_barge(&self, state: &StateWord, arg: usize) -> bool {
        let me = interrupt::current_token();
        let held = state.get();
        if held == 0 {
            if state.compare_and_set(0, arg) {
                self.owner.store(me, Ordering::Release);
                return true;
            }
            return false;
        }
        if self.owner.load(Ordering::Acquire) == me {
            let next = held
                .checked_add(arg)
                .unwrap_or_else(|| panic!("lock hold count overflow"));
            state.set(next);
            return true;
        }
        false
    }
}

impl SyncOps for LockOps {
    fn try_acquire(&self, view: &SyncView<'_>, arg: usize) -> bool {
        if self.fair && view.state().get() == 0 && view.has_queued_predecessors() {
            return false;
        }
        self.try_barge(view.state(), arg)
    }

    fn try_release(&self, view: &SyncView<'_>, arg: usize) -> bool {
        if self.owner.load(Ordering::Acquire) != interrupt::current_token() {
            return false;
        }
        let held = view.state().get();
        if arg > held {
            return false;
        }
        let remaining = held - arg;
        if remaining == 0 {
            self.owner.store(0, Ordering::Release);
        }
        view.state().set(remaining);
        remaining == 0
    }

    fn is_held_exclusively(&self, view: &SyncView<'_>) -> bool {
        view.state().get() != 0
            && self.owner.load(Ordering::Acquire) == interrupt::current_token()
    }
}

/// Reentrant mutual-exclusion lock with interruptible, timed and fair
/// acquisition modes, plus condition objects.
///
/// Unlike a poisoning mutex this lock is a pure ownership protocol:
/// `lock`/`unlock` are explicit (a RAII [`LockGuard`] is available via
/// [`ReentrantLock::guard`]), a thread may re-enter, and `unlock` by a
/// non-owner is rejected rather than undefined.
pub struct ReentrantLock {
    sync: Arc<Synchronizer<LockOps>>,
}

impl ReentrantLock {
    /// New unfair (barging) lock, the throughput-oriented default.
    pub fn new() -> Self {
        Self {
            sync: Arc::new(Synchronizer::new(LockOps::new(false))),
        }
    }

    /// New fair lock: queued waiters acquire in arrival order.
    pub fn fair() -> Self {
        Self {
            sync: Arc::new(Synchronizer::new(LockOps::new(true))),
        }
    }

    #[inline]
    pub fn is_fair(&self) -> bool {
        self.sync.ops().fair
    }

    /// Acquire, blocking uninterruptibly. Reentrant.
    pub fn lock(&self) {
        self.sync.acquire(1);
    }

    /// Acquire, failing fast on interruption.
    pub fn lock_interruptibly(&self) -> Result<(), Interrupted> {
        self.sync.acquire_interruptibly(1)
    }

    /// Single barging attempt, even on a fair lock.
    pub fn try_lock(&self) -> bool {
        self.sync.ops().try_barge(self.sync.state(), 1)
    }

    /// Acquire within `timeout`; `Ok(false)` = budget elapsed.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool, Interrupted> {
        self.sync.try_acquire_for(1, timeout)
    }

    /// Acquire before an absolute deadline.
    pub fn try_lock_until(&self, deadline: Instant) -> Result<bool, Interrupted> {
        self.sync.try_acquire_until(1, deadline)
    }

    /// Release one hold. Fails if the caller is not the owner.
    pub fn unlock(&self) -> Result<(), LockError> {
        if !self.sync.is_held_exclusively() {
            return Err(LockError::NotOwner);
        }
        self.sync.release(1);
        Ok(())
    }

    /// Acquire and return a guard that releases one hold on drop.
    pub fn guard(&self) -> LockGuard<'_> {
        self.lock();
        LockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Holds by the current thread (0 when not the owner).
    pub fn hold_count(&self) -> usize {
        if self.sync.is_held_exclusively() {
            self.sync.state().get()
        } else {
            0
        }
    }

    pub fn is_locked(&self) -> bool {
        self.sync.state().get() != 0
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_held_exclusively()
    }

    /// New condition bound to this lock.
    pub fn new_condition(&self) -> Condition<LockOps> {
        self.sync.new_condition()
    }

    // Weakly consistent introspection, delegated to the core.

    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }

    pub fn queue_length(&self) -> usize {
        self.sync.queue_len()
    }

    pub fn queued_threads(&self) -> Vec<ThreadId> {
        self.sync.queued_threads()
    }

    pub fn has_queued_thread(&self, thread: ThreadId) -> bool {
        self.sync.is_queued(thread)
    }

    /// Whether any thread waits on `condition`; fails for a foreign
    /// condition or a non-owning caller.
    pub fn has_waiters(
        &self,
        condition: &Condition<LockOps>,
    ) -> Result<bool, crate::core::errors::ConditionError> {
        self.sync.has_waiters(condition)
    }

    pub fn wait_queue_length(
        &self,
        condition: &Condition<LockOps>,
    ) -> Result<usize, crate::core::errors::ConditionError> {
        self.sync.wait_queue_len(condition)
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("fair", &self.is_fair())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// RAII guard releasing one hold on drop.
///
/// Not sendable: the hold belongs to the constructing thread, so the drop
/// must run there too.
pub struct LockGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // The guard was constructed by the owning thread; a failure here
        // means the hold was already released manually.
        let _ = self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reentrancy_counts_holds() {
        let lock = ReentrantLock::new();
        lock.lock();
        lock.lock();
        assert_eq!(lock.hold_count(), 2);
        lock.unlock().unwrap();
        assert_eq!(lock.hold_count(), 1);
        assert!(lock.is_locked());
        lock.unlock().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_unlock_by_non_owner_rejected() {
        let lock = Arc::new(ReentrantLock::new());
        lock.lock();
        let l = lock.clone();
        let err = thread::spawn(move || l.unlock()).join().unwrap();
        assert_eq!(err, Err(LockError::NotOwner));
        assert!(lock.is_locked());
        lock.unlock().unwrap();
    }

    #[test]
    fn test_try_lock_respects_other_owner() {
        let lock = Arc::new(ReentrantLock::new());
        lock.lock();
        let l = lock.clone();
        assert!(!thread::spawn(move || l.try_lock()).join().unwrap());
        // Reentrant try_lock by the owner succeeds
        assert!(lock.try_lock());
        assert_eq!(lock.hold_count(), 2);
        lock.unlock().unwrap();
        lock.unlock().unwrap();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = ReentrantLock::new();
        {
            let _g = lock.guard();
            assert!(lock.is_held_by_current_thread());
        }
        assert!(!lock.is_locked());
    }
}
