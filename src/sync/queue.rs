/*!
 * Wait Queue
 *
 * Intrusive doubly-linked list of waiting threads with lock-free CAS
 * enqueue at the tail and a lazily constructed sentinel head. Cancelled
 * nodes are skipped during traversal and spliced out opportunistically by
 * whichever thread walks past them; no global cleanup pass exists.
 *
 * Nothing in this module blocks. All waiting happens by parking the thread
 * through `core::park`; the queue only decides *who* to unpark.
 *
 * Read-only traversals (length, membership, thread snapshots) are weakly
 * consistent under concurrent modification. This is a documented
 * relaxation, not a bug: introspection is for monitoring, never for
 * synchronization control.
 */

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::trace;

use crate::core::spinwait::Backoff;
use crate::sync::node::{ptr_of, Node};

pub(crate) struct WaitQueue {
    head: ArcSwapOption<Node>,
    tail: ArcSwapOption<Node>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            head: ArcSwapOption::empty(),
            tail: ArcSwapOption::empty(),
        }
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<Arc<Node>> {
        self.head.load_full()
    }

    #[inline]
    pub(crate) fn tail(&self) -> Option<Arc<Node>> {
        self.tail.load_full()
    }

    /// Append `node` as the new tail, returning its predecessor.
    ///
    /// The back-link is set before the tail CAS so a node visible through
    /// `tail` always has a live predecessor; the forward link is set after
    /// winning, which leaves the usual short window where the node is
    /// reachable only through `tail`.
    pub(crate) fn enqueue(&self, node: &Arc<Node>) -> Arc<Node> {
        let mut backoff = Backoff::new();
        loop {
            let Some(tail) = self.tail.load_full() else {
                self.try_init();
                continue;
            };
            node.set_prev(&tail);
            if self.cas_tail(&Some(tail.clone()), Some(node.clone())) {
                tail.set_next(Some(node.clone()));
                trace!(status = node.status(), "enqueued wait node");
                return tail;
            }
            backoff.spin();
        }
    }

    /// Lazily install the sentinel head on first contention.
    ///
    /// Split into two idempotent CAS steps so a thread that observes a head
    /// without a tail helps finish the other thread's initialization.
    fn try_init(&self) {
        match self.head.load_full() {
            None => {
                let sentinel = Node::sentinel();
                let _ = self
                    .head
                    .compare_and_swap(&None::<Arc<Node>>, Some(sentinel));
            }
            Some(h) => {
                let _ = self.tail.compare_and_swap(&None::<Arc<Node>>, Some(h));
            }
        }
    }

    pub(crate) fn cas_tail(&self, expect: &Option<Arc<Node>>, update: Option<Arc<Node>>) -> bool {
        let prev = self.tail.compare_and_swap(expect, update);
        ptr_of(&prev) == ptr_of(expect)
    }

    /// Promote a granted node to be the new sentinel head.
    ///
    /// Clears its waiter and back-link; the old sentinel is reclaimed by
    /// losing its last strong reference.
    pub(crate) fn set_head(&self, node: &Arc<Node>) {
        node.clear_waiter();
        node.clear_prev();
        self.head.store(Some(node.clone()));
    }

    /// Wake `node`'s first non-cancelled successor, if any.
    ///
    /// Clears a negative status first so the releasing thread and the woken
    /// thread cannot both skip the signal. If the forward link is missing or
    /// cancelled, scans backwards from the tail; a dead back-link terminates
    /// the scan with the best candidate found so far (weak consistency; the
    /// cancel path guarantees someone else is unparked in that case).
    pub(crate) fn unpark_successor(&self, node: &Arc<Node>) {
        let s = node.status();
        if s < 0 {
            node.cas_status(s, 0);
        }

        let mut successor = node.next();
        if successor.as_ref().map_or(true, |n| n.is_cancelled()) {
            successor = None;
            let mut cursor = self.tail();
            while let Some(c) = cursor {
                if Arc::ptr_eq(&c, node) {
                    break;
                }
                if !c.is_cancelled() {
                    successor = Some(c.clone());
                }
                cursor = c.prev();
            }
        }

        if let Some(s) = successor {
            trace!("unparking queue successor");
            s.unpark_waiter();
        }
    }

    /// Whether any live (non-cancelled, still-owned) node is queued.
    pub(crate) fn has_queued(&self) -> bool {
        let mut cursor = self.tail();
        while let Some(c) = cursor {
            if !c.is_cancelled() && c.waiter().is_some() {
                return true;
            }
            cursor = c.prev();
        }
        false
    }

    /// Whether the queue has ever been contended (sentinel installed).
    #[inline]
    pub(crate) fn has_contended(&self) -> bool {
        self.head.load().is_some()
    }

    /// Approximate number of threads waiting in the queue.
    pub(crate) fn len(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.tail();
        while let Some(c) = cursor {
            if c.waiter().is_some() {
                n += 1;
            }
            cursor = c.prev();
        }
        n
    }

    /// Snapshot of queued threads, in no particular order.
    pub(crate) fn queued_threads(&self) -> Vec<ThreadId> {
        let mut out = Vec::new();
        let mut cursor = self.tail();
        while let Some(c) = cursor {
            if let Some(w) = c.waiter() {
                out.push(w.thread_id());
            }
            cursor = c.prev();
        }
        out
    }

    pub(crate) fn is_queued(&self, thread: ThreadId) -> bool {
        let mut cursor = self.tail();
        while let Some(c) = cursor {
            if c.waiter().map_or(false, |w| w.thread_id() == thread) {
                return true;
            }
            cursor = c.prev();
        }
        false
    }

    /// Thread of the longest-waiting node, if any.
    pub(crate) fn first_queued_thread(&self) -> Option<ThreadId> {
        let head = self.head()?;
        let mut cursor = head.next();
        while let Some(c) = cursor {
            if let Some(w) = c.waiter() {
                return Some(w.thread_id());
            }
            cursor = c.next();
        }
        None
    }

    /// Whether a thread other than `token`'s owner is queued ahead of it.
    ///
    /// Fair acquire policies consult this to refuse barging.
    pub(crate) fn has_queued_predecessors(&self, token: u64) -> bool {
        let (Some(head), Some(tail)) = (self.head(), self.tail()) else {
            return false;
        };
        if Arc::ptr_eq(&head, &tail) {
            return false;
        }
        match head.next() {
            Some(first) => first.waiter().map_or(true, |w| w.token() != token),
            // Enqueue in flight: someone won the tail CAS but has not
            // linked forward yet, and it is not us or we would be `first`.
            None => true,
        }
    }

    /// Whether `node` has been transferred onto this queue.
    ///
    /// Walks forward over the strong `next` chain; the tail identity check
    /// covers the window where a fresh node is reachable only through `tail`.
    pub(crate) fn contains(&self, node: &Arc<Node>) -> bool {
        if let Some(t) = self.tail() {
            if Arc::ptr_eq(&t, node) {
                return true;
            }
        }
        let mut cursor = self.head();
        while let Some(c) = cursor {
            if Arc::ptr_eq(&c, node) {
                return true;
            }
            cursor = c.next();
        }
        false
    }

    /// Re-derive a live predecessor for `node` after its weak back-link
    /// died, walking forward from the sentinel. Falls back to the sentinel
    /// itself when every intermediate node is gone or cancelled.
    pub(crate) fn fix_prev(&self, node: &Arc<Node>) -> Arc<Node> {
        let mut best = match self.head() {
            Some(h) => h,
            // Unreachable for an enqueued node, but stay safe.
            None => {
                self.try_init();
                return self.fix_prev(node);
            }
        };
        let mut cursor = best.next();
        while let Some(c) = cursor {
            if Arc::ptr_eq(&c, node) {
                break;
            }
            if !c.is_cancelled() {
                best = c.clone();
            }
            cursor = c.next();
        }
        node.set_prev(&best);
        best
    }
}
