/*!
 * Interruption Facility
 *
 * The platform has no built-in thread interruption, so the crate models it
 * explicitly. Every thread lazily owns an interrupt cell (flag + parker
 * handle + process-unique token), initialized on first use in a thread-local
 * and exposed behind accessors so blocking code never touches the singleton
 * directly.
 *
 * Semantics mirror the usual contract:
 * - `interrupt()` on a handle sets the target's flag and unparks it
 * - `interrupted()` reads **and clears** the current thread's flag
 * - interruptible waits report the interrupt and leave the flag cleared;
 *   uninterruptible waits re-assert it via `set_interrupted()` on exit
 *
 * An interrupt is never silently dropped.
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Per-thread interrupt cell.
///
/// Shared with every wait node the owning thread parks on, so a single
/// `interrupt()` reaches the thread no matter which queue it sits in.
pub struct InterruptState {
    token: u64,
    thread: Thread,
    flag: AtomicBool,
}

impl InterruptState {
    fn for_current() -> Self {
        Self {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            thread: thread::current(),
            flag: AtomicBool::new(false),
        }
    }

    /// Process-unique token of the owning thread (stable for its lifetime).
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread.id()
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Deliver the stored unpark permit to the owning thread.
    #[inline]
    pub(crate) fn unpark(&self) {
        self.thread.unpark();
    }
}

thread_local! {
    static CURRENT: Arc<InterruptState> = Arc::new(InterruptState::for_current());
}

/// Cloneable, sendable handle used to interrupt another thread.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<InterruptState>,
}

impl InterruptHandle {
    /// Set the target thread's interrupt status and wake it if parked.
    pub fn interrupt(&self) {
        self.state.flag.store(true, Ordering::Release);
        self.state.thread.unpark();
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.state.is_interrupted()
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.state.thread_id()
    }

    #[inline]
    pub fn token(&self) -> u64 {
        self.state.token()
    }
}

/// Handle for the current thread, suitable for shipping to other threads.
pub fn current() -> InterruptHandle {
    InterruptHandle {
        state: current_state(),
    }
}

/// The current thread's interrupt cell (registered on wait nodes).
pub(crate) fn current_state() -> Arc<InterruptState> {
    CURRENT.with(Arc::clone)
}

/// Process-unique token of the current thread.
#[inline]
pub fn current_token() -> u64 {
    CURRENT.with(|s| s.token)
}

/// Read and clear the current thread's interrupt status.
#[inline]
pub fn interrupted() -> bool {
    CURRENT.with(|s| s.flag.swap(false, Ordering::AcqRel))
}

/// Read the current thread's interrupt status without clearing it.
#[inline]
pub fn is_interrupted() -> bool {
    CURRENT.with(|s| s.flag.load(Ordering::Acquire))
}

/// Re-assert the current thread's interrupt status (self-interrupt).
#[inline]
pub fn set_interrupted() {
    CURRENT.with(|s| s.flag.store(true, Ordering::Release));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_tokens_are_unique_per_thread() {
        let mine = current_token();
        let theirs = thread::spawn(current_token).join().unwrap();
        assert_ne!(mine, theirs);
        // Stable within a thread
        assert_eq!(mine, current_token());
    }

    #[test]
    fn test_interrupted_clears_flag() {
        set_interrupted();
        assert!(is_interrupted());
        assert!(interrupted());
        assert!(!is_interrupted());
        assert!(!interrupted());
    }

    #[test]
    fn test_interrupt_unparks_target() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            tx.send(current()).unwrap();
            while !interrupted() {
                thread::park();
            }
        });

        let target = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        target.interrupt();
        handle.join().unwrap();
    }
}
