/*!
 * Condition Object
 *
 * Per-synchronizer wait/notify built on a second, singly-linked wait list.
 * The protocol invariant: every operation runs with the calling thread
 * holding exclusive ownership of the owning synchronizer, so list
 * manipulation is inherently single-threaded. The `parking_lot::Mutex`
 * around the list head/tail keeps the structure memory-safe even against a
 * client that violates the invariant; such calls are rejected by the
 * ownership check before they can observe anything.
 *
 * `wait` fully releases the synchronizer (recording the hold level),
 * parks, and reacquires exactly that level before returning, whether it
 * was woken by a signal, an interrupt, or a deadline.
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::core::errors::ConditionError;
use crate::core::{interrupt, park};
use crate::sync::node::{status, Mode, Node};
use crate::sync::synchronizer::{SyncOps, Synchronizer};

/// How an interrupt observed during a wait must surface.
#[derive(PartialEq, Eq, Clone, Copy)]
enum InterruptMode {
    None,
    /// Interrupt beat any signal: report it as an error.
    Throw,
    /// A signal won the race: swallow the error, re-assert the flag.
    Reassert,
}

struct WaiterList {
    first: Option<Arc<Node>>,
    last: Option<Arc<Node>>,
}

/// Wait/notify object bound to the synchronizer that created it.
pub struct Condition<O: SyncOps> {
    sync: Arc<Synchronizer<O>>,
    waiters: Mutex<WaiterList>,
}

impl<O: SyncOps> Synchronizer<O> {
    /// Create a condition owned by this synchronizer instance.
    pub fn new_condition(self: &Arc<Self>) -> Condition<O> {
        Condition {
            sync: Arc::clone(self),
            waiters: Mutex::new(WaiterList {
                first: None,
                last: None,
            }),
        }
    }

    /// Whether `condition` was created by this synchronizer instance.
    pub fn owns(&self, condition: &Condition<O>) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&condition.sync))
    }

    /// Whether any thread is waiting on `condition`.
    ///
    /// Illegal-argument if the condition belongs to another synchronizer,
    /// illegal-state if the caller does not hold exclusive ownership.
    pub fn has_waiters(&self, condition: &Condition<O>) -> Result<bool, ConditionError> {
        self.check_condition(condition)?;
        Ok(condition.any_waiter())
    }

    /// Approximate count of threads waiting on `condition`.
    pub fn wait_queue_len(&self, condition: &Condition<O>) -> Result<usize, ConditionError> {
        self.check_condition(condition)?;
        Ok(condition.waiter_count())
    }

    /// Snapshot of threads waiting on `condition`.
    pub fn waiting_threads(
        &self,
        condition: &Condition<O>,
    ) -> Result<Vec<ThreadId>, ConditionError> {
        self.check_condition(condition)?;
        Ok(condition.waiting_thread_ids())
    }

    fn check_condition(&self, condition: &Condition<O>) -> Result<(), ConditionError> {
        if !self.owns(condition) {
            return Err(ConditionError::ForeignCondition);
        }
        if !self.is_held_exclusively() {
            return Err(ConditionError::NotOwner);
        }
        Ok(())
    }
}

impl<O: SyncOps> Condition<O> {
    /// The synchronizer this condition was created from.
    pub fn synchronizer(&self) -> &Arc<Synchronizer<O>> {
        &self.sync
    }

    fn check_owner(&self) -> Result<(), ConditionError> {
        if !self.sync.is_held_exclusively() {
            return Err(ConditionError::NotOwner);
        }
        Ok(())
    }

    /// Block until signalled; fail fast on interruption.
    ///
    /// The synchronizer is fully released while waiting and the previous
    /// hold level is restored before this returns, on every path.
    pub fn wait(&self) -> Result<(), ConditionError> {
        if interrupt::interrupted() {
            return Err(ConditionError::Interrupted);
        }
        self.check_owner()?;
        let node = self.add_waiter();
        let saved = self.fully_release(&node)?;

        let mut mode = InterruptMode::None;
        while !self.sync.on_sync_queue(&node) {
            park::park();
            mode = self.check_interrupt(&node);
            if mode != InterruptMode::None {
                break;
            }
        }

        if self.sync.acquire_transferred(&node, saved) && mode != InterruptMode::Throw {
            mode = InterruptMode::Reassert;
        }
        if node.cond_next().is_some() {
            self.unlink_cancelled();
        }
        self.report(mode)
    }

    /// Block until signalled or `timeout` elapses. `Ok(false)` = timed out
    /// (the synchronizer is still reacquired before returning).
    pub fn wait_for(&self, timeout: Duration) -> Result<bool, ConditionError> {
        self.wait_until(Instant::now() + timeout)
    }

    /// Block until signalled or the absolute deadline passes.
    pub fn wait_until(&self, deadline: Instant) -> Result<bool, ConditionError> {
        if interrupt::interrupted() {
            return Err(ConditionError::Interrupted);
        }
        self.check_owner()?;
        let node = self.add_waiter();
        let saved = self.fully_release(&node)?;

        let mut timed_out = false;
        let mut mode = InterruptMode::None;
        while !self.sync.on_sync_queue(&node) {
            if Instant::now() >= deadline {
                // Cancellation wins only if no signal beat the deadline.
                timed_out = self.sync.transfer_after_cancelled_wait(&node);
                break;
            }
            park::park_until(deadline);
            mode = self.check_interrupt(&node);
            if mode != InterruptMode::None {
                break;
            }
        }

        if self.sync.acquire_transferred(&node, saved) && mode != InterruptMode::Throw {
            mode = InterruptMode::Reassert;
        }
        if node.cond_next().is_some() {
            self.unlink_cancelled();
        }
        self.report(mode)?;
        Ok(!timed_out)
    }

    /// Block until signalled, swallowing interruption.
    ///
    /// An interrupt observed while waiting never aborts the wait; the
    /// thread's interrupted flag is re-asserted after reacquisition.
    pub fn wait_uninterruptibly(&self) -> Result<(), ConditionError> {
        self.check_owner()?;
        let node = self.add_waiter();
        let saved = self.fully_release(&node)?;

        let mut interrupted = false;
        while !self.sync.on_sync_queue(&node) {
            park::park();
            if interrupt::interrupted() {
                interrupted = true;
            }
        }

        if self.sync.acquire_transferred(&node, saved) || interrupted {
            interrupt::set_interrupted();
        }
        Ok(())
    }

    /// Move the longest-waiting thread to the main acquire queue.
    /// No-op when nobody waits.
    pub fn signal(&self) -> Result<(), ConditionError> {
        self.check_owner()?;
        let mut list = self.waiters.lock();
        while let Some(first) = list.first.clone() {
            let next = first.cond_next();
            first.set_cond_next(None);
            list.first = next.clone();
            if next.is_none() {
                list.last = None;
            }
            if self.sync.transfer_for_signal(&first) {
                break;
            }
            // Cancelled wait: drop it and try the next node.
        }
        Ok(())
    }

    /// Move every waiting thread to the main acquire queue.
    pub fn signal_all(&self) -> Result<(), ConditionError> {
        self.check_owner()?;
        let mut list = self.waiters.lock();
        let mut cursor = list.first.take();
        list.last = None;
        drop(list);
        while let Some(node) = cursor {
            cursor = node.cond_next();
            node.set_cond_next(None);
            self.sync.transfer_for_signal(&node);
        }
        Ok(())
    }

    // ---- wait-list maintenance (caller holds exclusive ownership) ------

    fn add_waiter(&self) -> Arc<Node> {
        let mut list = self.waiters.lock();
        // Purge a cancelled tail before appending.
        if list
            .last
            .as_ref()
            .map_or(false, |l| l.status() != status::CONDITION)
        {
            Self::unlink_cancelled_locked(&mut list);
        }
        let node = Node::new(
            Mode::Exclusive,
            Some(interrupt::current_state()),
            status::CONDITION,
        );
        match &list.last {
            Some(last) => last.set_cond_next(Some(node.clone())),
            None => list.first = Some(node.clone()),
        }
        list.last = Some(node.clone());
        trace!("added condition waiter");
        node
    }

    fn unlink_cancelled(&self) {
        let mut list = self.waiters.lock();
        Self::unlink_cancelled_locked(&mut list);
    }

    /// Drop every node no longer in CONDITION status from the list.
    fn unlink_cancelled_locked(list: &mut WaiterList) {
        let mut trail: Option<Arc<Node>> = None;
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            let next = node.cond_next();
            if node.status() != status::CONDITION {
                node.set_cond_next(None);
                match &trail {
                    Some(t) => t.set_cond_next(next.clone()),
                    None => list.first = next.clone(),
                }
                if next.is_none() {
                    list.last = trail.clone();
                }
            } else {
                trail = Some(node.clone());
            }
            cursor = next;
        }
    }

    /// Record the full hold level and release it in one step. Failure means
    /// the caller lost ownership between the check and the release.
    fn fully_release(&self, node: &Arc<Node>) -> Result<usize, ConditionError> {
        let saved = self.sync.state().get();
        if self.sync.release(saved) {
            Ok(saved)
        } else {
            node.set_status(status::CANCELLED);
            Err(ConditionError::NotOwner)
        }
    }

    fn check_interrupt(&self, node: &Arc<Node>) -> InterruptMode {
        if interrupt::interrupted() {
            if self.sync.transfer_after_cancelled_wait(node) {
                InterruptMode::Throw
            } else {
                InterruptMode::Reassert
            }
        } else {
            InterruptMode::None
        }
    }

    fn report(&self, mode: InterruptMode) -> Result<(), ConditionError> {
        match mode {
            InterruptMode::Throw => Err(ConditionError::Interrupted),
            InterruptMode::Reassert => {
                interrupt::set_interrupted();
                Ok(())
            }
            InterruptMode::None => Ok(()),
        }
    }

    // ---- introspection helpers (ownership already verified) -------------

    fn any_waiter(&self) -> bool {
        let list = self.waiters.lock();
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            if node.status() == status::CONDITION {
                return true;
            }
            cursor = node.cond_next();
        }
        false
    }

    fn waiter_count(&self) -> usize {
        let list = self.waiters.lock();
        let mut n = 0;
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            if node.status() == status::CONDITION {
                n += 1;
            }
            cursor = node.cond_next();
        }
        n
    }

    fn waiting_thread_ids(&self) -> Vec<ThreadId> {
        let list = self.waiters.lock();
        let mut out = Vec::new();
        let mut cursor = list.first.clone();
        while let Some(node) = cursor {
            if node.status() == status::CONDITION {
                if let Some(w) = node.waiter() {
                    out.push(w.thread_id());
                }
            }
            cursor = node.cond_next();
        }
        out
    }
}
