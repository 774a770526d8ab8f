/*!
 * Wait Node
 *
 * One blocked thread in the main acquire queue or a condition wait list.
 * Links are shared-ownership references with an explicit weak back-link:
 * the strong `next` chain (rooted at the queue head) keeps queued nodes
 * alive, the weak `prev` link avoids reference cycles, and `cond_next`
 * carries the singly-linked condition list. A waiter handle is attached
 * while the owning thread may need waking and cleared on cancellation or
 * promotion to head.
 */

use arc_swap::{ArcSwapOption, ArcSwapWeak};
use std::ptr;
use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::{Arc, Weak};

use crate::core::interrupt::InterruptState;

/// Node status values.
///
/// Negative values mean "this node (or its successor) still needs a wakeup";
/// the single positive value marks a cancelled node that traversals skip.
pub(crate) mod status {
    /// Default: enqueued and waiting.
    pub const WAITING: i8 = 0;
    /// Cancelled by interrupt or timeout; skipped and lazily spliced out.
    pub const CANCELLED: i8 = 1;
    /// Successor needs an unpark when this node releases or cancels.
    pub const SIGNAL: i8 = -1;
    /// Parked on a condition wait list, not yet transferred.
    pub const CONDITION: i8 = -2;
    /// Shared release in flight; propagate the wakeup to the next head.
    pub const PROPAGATE: i8 = -3;
}

/// Acquisition mode a node waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Exclusive,
    Shared,
}

pub(crate) struct Node {
    mode: Mode,
    status: AtomicI8,
    waiter: ArcSwapOption<InterruptState>,
    prev: ArcSwapWeak<Node>,
    next: ArcSwapOption<Node>,
    cond_next: ArcSwapOption<Node>,
}

/// Raw pointer identity of an optional node, for CAS success checks.
#[inline]
pub(crate) fn ptr_of(node: &Option<Arc<Node>>) -> *const Node {
    node.as_ref().map_or(ptr::null(), Arc::as_ptr)
}

impl Node {
    pub(crate) fn new(
        mode: Mode,
        waiter: Option<Arc<InterruptState>>,
        initial_status: i8,
    ) -> Arc<Self> {
        Arc::new(Self {
            mode,
            status: AtomicI8::new(initial_status),
            waiter: ArcSwapOption::new(waiter),
            prev: ArcSwapWeak::new(Weak::new()),
            next: ArcSwapOption::empty(),
            cond_next: ArcSwapOption::empty(),
        })
    }

    /// Dummy node installed as the lazily-constructed queue head.
    pub(crate) fn sentinel() -> Arc<Self> {
        Self::new(Mode::Exclusive, None, status::WAITING)
    }

    #[inline]
    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub(crate) fn is_shared(&self) -> bool {
        self.mode == Mode::Shared
    }

    #[inline]
    pub(crate) fn status(&self) -> i8 {
        self.status.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_status(&self, value: i8) {
        self.status.store(value, Ordering::Release);
    }

    #[inline]
    pub(crate) fn cas_status(&self, expect: i8, update: i8) -> bool {
        self.status
            .compare_exchange(expect, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.status() > 0
    }

    /// Upgrade the weak back-link. `None` means the predecessor was already
    /// reclaimed (cancelled and dropped); callers re-derive it from the head.
    #[inline]
    pub(crate) fn prev(&self) -> Option<Arc<Node>> {
        self.prev.load().upgrade()
    }

    #[inline]
    pub(crate) fn set_prev(&self, node: &Arc<Node>) {
        self.prev.store(Arc::downgrade(node));
    }

    #[inline]
    pub(crate) fn clear_prev(&self) {
        self.prev.store(Weak::new());
    }

    #[inline]
    pub(crate) fn next(&self) -> Option<Arc<Node>> {
        self.next.load_full()
    }

    #[inline]
    pub(crate) fn set_next(&self, node: Option<Arc<Node>>) {
        self.next.store(node);
    }

    /// CAS the forward link; succeeds only against the expected identity.
    pub(crate) fn cas_next(&self, expect: &Option<Arc<Node>>, update: Option<Arc<Node>>) -> bool {
        let prev = self.next.compare_and_swap(expect, update);
        ptr_of(&prev) == ptr_of(expect)
    }

    #[inline]
    pub(crate) fn cond_next(&self) -> Option<Arc<Node>> {
        self.cond_next.load_full()
    }

    #[inline]
    pub(crate) fn set_cond_next(&self, node: Option<Arc<Node>>) {
        self.cond_next.store(node);
    }

    #[inline]
    pub(crate) fn waiter(&self) -> Option<Arc<InterruptState>> {
        self.waiter.load_full()
    }

    #[inline]
    pub(crate) fn clear_waiter(&self) {
        self.waiter.store(None);
    }

    /// Wake the owning thread, if one is still attached.
    #[inline]
    pub(crate) fn unpark_waiter(&self) {
        if let Some(w) = self.waiter.load_full() {
            w.unpark();
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("mode", &self.mode)
            .field("status", &self.status())
            .field("has_waiter", &self.waiter.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interrupt;

    #[test]
    fn test_status_transitions() {
        let n = Node::new(Mode::Exclusive, None, status::WAITING);
        assert!(!n.is_cancelled());
        assert!(n.cas_status(status::WAITING, status::SIGNAL));
        assert!(!n.cas_status(status::WAITING, status::CANCELLED));
        n.set_status(status::CANCELLED);
        assert!(n.is_cancelled());
    }

    #[test]
    fn test_weak_prev_drops_with_predecessor() {
        let a = Node::sentinel();
        let b = Node::new(Mode::Shared, None, status::WAITING);
        b.set_prev(&a);
        assert!(b.prev().is_some());
        drop(a);
        assert!(b.prev().is_none());
    }

    #[test]
    fn test_cas_next_identity() {
        let a = Node::sentinel();
        let b = Node::new(Mode::Exclusive, None, status::WAITING);
        let c = Node::new(Mode::Exclusive, None, status::WAITING);
        assert!(a.cas_next(&None, Some(b.clone())));
        assert!(!a.cas_next(&None, Some(c.clone())));
        assert!(a.cas_next(&Some(b.clone()), Some(c.clone())));
        assert!(Arc::ptr_eq(&a.next().unwrap(), &c));
    }

    #[test]
    fn test_waiter_clear_and_unpark() {
        let n = Node::new(
            Mode::Exclusive,
            Some(interrupt::current_state()),
            status::WAITING,
        );
        assert!(n.waiter().is_some());
        n.unpark_waiter(); // self-unpark: permit stored, harmless
        n.clear_waiter();
        assert!(n.waiter().is_none());
    }
}
