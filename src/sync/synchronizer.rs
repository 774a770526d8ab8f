/*!
 * Synchronizer Core
 *
 * Generic acquire/release protocols for blocking primitives built on a
 * single state word and an intrusive wait queue. Concrete primitives plug
 * in through the `SyncOps` hook set; the core handles enqueueing, parking,
 * interruption (immediate for interruptible entry points, deferred and
 * re-asserted for uninterruptible ones), relative and absolute timeouts,
 * cancellation cleanup, and shared wake propagation.
 *
 * Fast path: a successful hook call returns without touching the queue and
 * without allocating.
 */

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::core::errors::Interrupted;
use crate::core::{interrupt, park};
use crate::sync::node::{ptr_of, status, Mode, Node};
use crate::sync::queue::WaitQueue;
use crate::sync::state::StateWord;

/// Read-only window the hooks get into the synchronizer.
///
/// Exposes the state word plus the queue introspection a fairness policy
/// needs; fair vs barging behavior lives entirely in the concrete
/// primitive's `try_acquire`, never in the core.
pub struct SyncView<'a> {
    state: &'a StateWord,
    queue: &'a WaitQueue,
}

impl<'a> SyncView<'a> {
    #[inline]
    pub fn state(&self) -> &StateWord {
        self.state
    }

    /// Whether any thread has waited longer than the current one.
    ///
    /// A fair `try_acquire` returns false when this is true, refusing to
    /// barge past queued waiters.
    pub fn has_queued_predecessors(&self) -> bool {
        self.queue.has_queued_predecessors(interrupt::current_token())
    }

    pub fn has_queued_threads(&self) -> bool {
        self.queue.has_queued()
    }

    pub fn first_queued_thread(&self) -> Option<ThreadId> {
        self.queue.first_queued_thread()
    }
}

/// Hook set a concrete primitive implements to define its semantics.
///
/// Exclusive-only primitives implement the first two; shared-only
/// primitives the second two. The defaults panic, mirroring the contract
/// that invoking an unsupported mode is a programming error.
pub trait SyncOps: Send + Sync + 'static {
    /// Attempt exclusive acquisition. Must be side-effect free on failure.
    fn try_acquire(&self, view: &SyncView<'_>, arg: usize) -> bool {
        let _ = (view, arg);
        unimplemented!("exclusive acquisition not supported by this synchronizer")
    }

    /// Attempt exclusive release. Returns true iff the synchronizer is now
    /// fully free and a successor should be woken. Returns false both for a
    /// partial release and for a caller that does not own the synchronizer;
    /// state must stay untouched in the latter case.
    fn try_release(&self, view: &SyncView<'_>, arg: usize) -> bool {
        let _ = (view, arg);
        unimplemented!("exclusive release not supported by this synchronizer")
    }

    /// Attempt shared acquisition. Negative = failure; zero = success with
    /// nothing left over; positive = success with surplus, so further shared
    /// waiters should be woken in a cascade.
    fn try_acquire_shared(&self, view: &SyncView<'_>, arg: usize) -> isize {
        let _ = (view, arg);
        unimplemented!("shared acquisition not supported by this synchronizer")
    }

    /// Attempt shared release. Returns true iff the state changed in a way
    /// that may unblock waiters.
    fn try_release_shared(&self, view: &SyncView<'_>, arg: usize) -> bool {
        let _ = (view, arg);
        unimplemented!("shared release not supported by this synchronizer")
    }

    /// Whether the calling thread holds exclusive ownership. Consulted by
    /// condition objects on every operation.
    fn is_held_exclusively(&self, view: &SyncView<'_>) -> bool {
        let _ = view;
        unimplemented!("exclusive ownership is not tracked by this synchronizer")
    }
}

/// Outcome of a queued wait.
enum WaitOutcome {
    /// Access granted; `interrupted` carries a deferred interrupt observed
    /// while waiting uninterruptibly.
    Granted { interrupted: bool },
    Interrupted,
    TimedOut,
}

/// Queue-backed blocking synchronizer, generic over its hook set.
///
/// Exactly one `Synchronizer` backs each concrete primitive instance.
/// Conditions are created from an `Arc<Synchronizer>` and are only valid
/// with their creator.
pub struct Synchronizer<O: SyncOps> {
    ops: O,
    state: StateWord,
    queue: WaitQueue,
}

impl<O: SyncOps> Synchronizer<O> {
    pub fn new(ops: O) -> Self {
        Self::with_state(ops, 0)
    }

    pub fn with_state(ops: O, initial: usize) -> Self {
        Self {
            ops,
            state: StateWord::new(initial),
            queue: WaitQueue::new(),
        }
    }

    #[inline]
    pub fn ops(&self) -> &O {
        &self.ops
    }

    #[inline]
    pub fn state(&self) -> &StateWord {
        &self.state
    }

    #[inline]
    pub(crate) fn view(&self) -> SyncView<'_> {
        SyncView {
            state: &self.state,
            queue: &self.queue,
        }
    }

    #[inline]
    pub fn is_held_exclusively(&self) -> bool {
        self.ops.is_held_exclusively(&self.view())
    }

    /// One shot at the exclusive hook, no queue interaction.
    #[inline]
    pub fn try_acquire(&self, arg: usize) -> bool {
        self.ops.try_acquire(&self.view(), arg)
    }

    /// One shot at the shared hook, no queue interaction.
    #[inline]
    pub fn try_acquire_shared_now(&self, arg: usize) -> bool {
        self.ops.try_acquire_shared(&self.view(), arg) >= 0
    }

    // ---- exclusive mode ----------------------------------------------

    /// Acquire exclusively, ignoring interrupts.
    ///
    /// An interrupt delivered while waiting is recorded and re-asserted on
    /// the thread after the acquisition succeeds; it is never swallowed.
    pub fn acquire(&self, arg: usize) {
        if self.ops.try_acquire(&self.view(), arg) {
            return;
        }
        let node = self.enqueue_waiter(Mode::Exclusive);
        match self.acquire_node(&node, arg, false, None) {
            WaitOutcome::Granted { interrupted } => {
                if interrupted {
                    interrupt::set_interrupted();
                }
            }
            // Uninterruptible, untimed waits can only end in a grant.
            _ => unreachable!("untimed uninterruptible acquire ended without a grant"),
        }
    }

    /// Acquire exclusively, failing fast on interruption.
    pub fn acquire_interruptibly(&self, arg: usize) -> Result<(), Interrupted> {
        if interrupt::interrupted() {
            return Err(Interrupted);
        }
        if self.ops.try_acquire(&self.view(), arg) {
            return Ok(());
        }
        let node = self.enqueue_waiter(Mode::Exclusive);
        match self.acquire_node(&node, arg, true, None) {
            WaitOutcome::Granted { .. } => Ok(()),
            WaitOutcome::Interrupted => Err(Interrupted),
            WaitOutcome::TimedOut => unreachable!("untimed acquire timed out"),
        }
    }

    /// Acquire exclusively within `timeout`. `Ok(false)` means the budget
    /// elapsed; the elapsed time is a monotonic lower bound.
    pub fn try_acquire_for(&self, arg: usize, timeout: Duration) -> Result<bool, Interrupted> {
        self.try_acquire_until(arg, Instant::now() + timeout)
    }

    /// Acquire exclusively before an absolute deadline.
    pub fn try_acquire_until(&self, arg: usize, deadline: Instant) -> Result<bool, Interrupted> {
        if interrupt::interrupted() {
            return Err(Interrupted);
        }
        if self.ops.try_acquire(&self.view(), arg) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        let node = self.enqueue_waiter(Mode::Exclusive);
        match self.acquire_node(&node, arg, true, Some(deadline)) {
            WaitOutcome::Granted { .. } => Ok(true),
            WaitOutcome::Interrupted => Err(Interrupted),
            WaitOutcome::TimedOut => Ok(false),
        }
    }

    /// Release in exclusive mode. Wakes the next waiter when the hook
    /// reports the synchronizer fully free.
    pub fn release(&self, arg: usize) -> bool {
        if self.ops.try_release(&self.view(), arg) {
            if let Some(h) = self.queue.head() {
                if h.status() != status::WAITING {
                    self.queue.unpark_successor(&h);
                }
            }
            return true;
        }
        false
    }

    // ---- shared mode --------------------------------------------------

    /// Acquire in shared mode, ignoring interrupts (deferred re-assert).
    pub fn acquire_shared(&self, arg: usize) {
        if self.ops.try_acquire_shared(&self.view(), arg) >= 0 {
            return;
        }
        let node = self.enqueue_waiter(Mode::Shared);
        match self.acquire_node(&node, arg, false, None) {
            WaitOutcome::Granted { interrupted } => {
                if interrupted {
                    interrupt::set_interrupted();
                }
            }
            _ => unreachable!("untimed uninterruptible acquire ended without a grant"),
        }
    }

    /// Acquire in shared mode, failing fast on interruption.
    pub fn acquire_shared_interruptibly(&self, arg: usize) -> Result<(), Interrupted> {
        if interrupt::interrupted() {
            return Err(Interrupted);
        }
        if self.ops.try_acquire_shared(&self.view(), arg) >= 0 {
            return Ok(());
        }
        let node = self.enqueue_waiter(Mode::Shared);
        match self.acquire_node(&node, arg, true, None) {
            WaitOutcome::Granted { .. } => Ok(()),
            WaitOutcome::Interrupted => Err(Interrupted),
            WaitOutcome::TimedOut => unreachable!("untimed acquire timed out"),
        }
    }

    pub fn try_acquire_shared_for(
        &self,
        arg: usize,
        timeout: Duration,
    ) -> Result<bool, Interrupted> {
        self.try_acquire_shared_until(arg, Instant::now() + timeout)
    }

    pub fn try_acquire_shared_until(
        &self,
        arg: usize,
        deadline: Instant,
    ) -> Result<bool, Interrupted> {
        if interrupt::interrupted() {
            return Err(Interrupted);
        }
        if self.ops.try_acquire_shared(&self.view(), arg) >= 0 {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        let node = self.enqueue_waiter(Mode::Shared);
        match self.acquire_node(&node, arg, true, Some(deadline)) {
            WaitOutcome::Granted { .. } => Ok(true),
            WaitOutcome::Interrupted => Err(Interrupted),
            WaitOutcome::TimedOut => Ok(false),
        }
    }

    /// Release in shared mode. Always attempts to propagate, since several
    /// waiters may need awakening.
    pub fn release_shared(&self, arg: usize) -> bool {
        if self.ops.try_release_shared(&self.view(), arg) {
            self.propagate_shared_release();
            return true;
        }
        false
    }

    // ---- introspection (weakly consistent) ----------------------------

    pub fn has_queued_threads(&self) -> bool {
        self.queue.has_queued()
    }

    /// Whether any thread has ever contended on this synchronizer.
    pub fn has_contended(&self) -> bool {
        self.queue.has_contended()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_threads(&self) -> Vec<ThreadId> {
        self.queue.queued_threads()
    }

    pub fn is_queued(&self, thread: ThreadId) -> bool {
        self.queue.is_queued(thread)
    }

    pub fn first_queued_thread(&self) -> Option<ThreadId> {
        self.queue.first_queued_thread()
    }

    pub fn has_queued_predecessors(&self) -> bool {
        self.queue.has_queued_predecessors(interrupt::current_token())
    }

    // ---- queued wait loop ---------------------------------------------

    fn enqueue_waiter(&self, mode: Mode) -> Arc<Node> {
        let node = Node::new(mode, Some(interrupt::current_state()), status::WAITING);
        self.queue.enqueue(&node);
        node
    }

    /// Transfer an already-enqueued condition node (signal path).
    pub(crate) fn enqueue_transferred(&self, node: &Arc<Node>) -> Arc<Node> {
        self.queue.enqueue(node)
    }

    /// The wait loop for a node already sitting in the queue.
    ///
    /// When the node's predecessor is the head, retries the hook; on
    /// success promotes the node to head (propagating in shared mode) and
    /// returns. Otherwise arranges for a wakeup signal and parks. Wakes
    /// re-check interruption and the deadline; timed waits are always
    /// interruptible. Cancellation on interrupt/timeout leaves the queue
    /// consistent and never strands a successor.
    fn acquire_node(
        &self,
        node: &Arc<Node>,
        arg: usize,
        interruptible: bool,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        let mut interrupted = false;
        loop {
            let pred = self.live_pred(node);
            let at_front = self
                .queue
                .head()
                .map_or(false, |h| Arc::ptr_eq(&h, &pred));
            if at_front {
                match node.mode() {
                    Mode::Exclusive => {
                        if self.ops.try_acquire(&self.view(), arg) {
                            self.queue.set_head(node);
                            return WaitOutcome::Granted { interrupted };
                        }
                    }
                    Mode::Shared => {
                        let surplus = self.ops.try_acquire_shared(&self.view(), arg);
                        if surplus >= 0 {
                            self.set_head_and_propagate(node, surplus);
                            return WaitOutcome::Granted { interrupted };
                        }
                    }
                }
            }

            if self.should_park(&pred, node) {
                match deadline {
                    None => park::park(),
                    Some(d) => {
                        if Instant::now() >= d {
                            self.cancel(node);
                            return WaitOutcome::TimedOut;
                        }
                        park::park_until(d);
                    }
                }
            }

            if interrupt::interrupted() {
                if interruptible {
                    self.cancel(node);
                    return WaitOutcome::Interrupted;
                }
                // Deferred: remembered here, re-asserted by the caller.
                interrupted = true;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    self.cancel(node);
                    return WaitOutcome::TimedOut;
                }
            }
        }
    }

    /// Uninterruptible reacquire used by condition waits. Returns whether a
    /// deferred interrupt was observed while waiting.
    pub(crate) fn acquire_transferred(&self, node: &Arc<Node>, arg: usize) -> bool {
        matches!(
            self.acquire_node(node, arg, false, None),
            WaitOutcome::Granted { interrupted: true }
        )
    }

    /// Current predecessor, re-derived from the head if the back-link died.
    fn live_pred(&self, node: &Arc<Node>) -> Arc<Node> {
        match node.prev() {
            Some(p) => p,
            None => self.queue.fix_prev(node),
        }
    }

    /// Decide whether the node may park: true only once its (live)
    /// predecessor promises a wakeup signal. Splices out cancelled
    /// predecessors along the way.
    fn should_park(&self, pred: &Arc<Node>, node: &Arc<Node>) -> bool {
        let s = pred.status();
        if s == status::SIGNAL {
            return true;
        }
        if s > 0 {
            // Skip over cancelled predecessors and retry.
            let mut p = pred.clone();
            while p.is_cancelled() {
                p = match p.prev() {
                    Some(pp) => pp,
                    None => self.queue.fix_prev(node),
                };
            }
            node.set_prev(&p);
            p.set_next(Some(node.clone()));
            false
        } else {
            // WAITING or PROPAGATE: request a signal, then loop to re-check
            // before actually parking.
            pred.cas_status(s, status::SIGNAL);
            false
        }
    }

    /// Promote a shared node to head and cascade the wakeup while surplus
    /// remains visible.
    fn set_head_and_propagate(&self, node: &Arc<Node>, surplus: isize) {
        let old_head = self.queue.head();
        self.queue.set_head(node);

        let must_propagate = surplus > 0
            || old_head.as_ref().map_or(true, |h| h.status() < 0)
            || self.queue.head().map_or(true, |h| h.status() < 0);
        if must_propagate {
            if node.next().map_or(true, |n| n.is_shared()) {
                self.propagate_shared_release();
            }
        }
    }

    /// Wake from the head unconditionally, looping while the head keeps
    /// moving under us so no released permit strands a waiter.
    fn propagate_shared_release(&self) {
        loop {
            let head = self.queue.head();
            if let (Some(h), Some(t)) = (head.clone(), self.queue.tail()) {
                if !Arc::ptr_eq(&h, &t) {
                    let s = h.status();
                    if s == status::SIGNAL {
                        if !h.cas_status(status::SIGNAL, status::WAITING) {
                            continue;
                        }
                        self.queue.unpark_successor(&h);
                    } else if s == status::WAITING
                        && !h.cas_status(status::WAITING, status::PROPAGATE)
                    {
                        continue;
                    }
                }
            }
            if ptr_of(&self.queue.head()) == ptr_of(&head) {
                break;
            }
        }
    }

    /// Remove a node whose thread gave up (interrupt or timeout).
    ///
    /// Marks it cancelled, splices it out where safe, and wakes a successor
    /// whenever this node might have been the one responsible for relaying
    /// the signal. Relative order of the remaining waiters is preserved.
    fn cancel(&self, node: &Arc<Node>) {
        debug!("cancelling queued waiter");
        node.clear_waiter();

        // Skip already-cancelled predecessors.
        let mut pred = self.live_pred(node);
        while pred.is_cancelled() {
            pred = match pred.prev() {
                Some(pp) => pp,
                None => self.queue.fix_prev(node),
            };
            node.set_prev(&pred);
        }
        let pred_next = pred.next();

        node.set_status(status::CANCELLED);

        let is_tail = self
            .queue
            .tail()
            .map_or(false, |t| Arc::ptr_eq(&t, node));
        if is_tail && self.queue.cas_tail(&Some(node.clone()), Some(pred.clone())) {
            pred.cas_next(&pred_next, None);
            return;
        }

        let pred_is_head = self
            .queue
            .head()
            .map_or(false, |h| Arc::ptr_eq(&h, &pred));
        let ps = pred.status();
        let pred_will_signal = ps == status::SIGNAL
            || (ps <= 0 && pred.cas_status(ps, status::SIGNAL));
        if !pred_is_head && pred_will_signal && pred.waiter().is_some() {
            // Splice: the live predecessor will signal our successor.
            if let Some(next) = node.next() {
                if !next.is_cancelled() {
                    pred.cas_next(&pred_next, Some(next));
                }
            }
        } else {
            // We might have been the relay; wake a successor directly.
            self.queue.unpark_successor(node);
        }
    }

    // ---- condition support ---------------------------------------------

    /// Whether a condition node has been transferred onto the main queue.
    pub(crate) fn on_sync_queue(&self, node: &Arc<Node>) -> bool {
        if node.status() == status::CONDITION {
            return false;
        }
        if node.next().is_some() {
            return true;
        }
        self.queue.contains(node)
    }

    /// Move a condition node onto the main queue (signal path). False means
    /// the wait was already cancelled and the node should be skipped.
    pub(crate) fn transfer_for_signal(&self, node: &Arc<Node>) -> bool {
        if !node.cas_status(status::CONDITION, status::WAITING) {
            return false;
        }
        trace!("transferring condition waiter to acquire queue");
        let pred = self.enqueue_transferred(node);
        let s = pred.status();
        if s > 0 || !pred.cas_status(s, status::SIGNAL) {
            // Predecessor cannot relay the signal; wake the thread so it
            // finishes the transfer through the ordinary acquire path.
            node.unpark_waiter();
        }
        true
    }

    /// Transfer after an interrupted or timed-out condition wait. True means
    /// the cancellation won (no signal arrived first).
    pub(crate) fn transfer_after_cancelled_wait(&self, node: &Arc<Node>) -> bool {
        if node.cas_status(status::CONDITION, status::WAITING) {
            self.enqueue_transferred(node);
            return true;
        }
        // A signal raced with the cancellation; let it finish the enqueue.
        while !self.on_sync_queue(node) {
            std::thread::yield_now();
        }
        false
    }
}
