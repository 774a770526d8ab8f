/*!
 * Thread Parking Facility
 *
 * Thin wrappers over the platform thread parker. The contract consumed by
 * the synchronizer core:
 * - an unpark permit delivered before park is stored, never lost
 * - spurious wakeups are allowed; every caller loops and re-checks
 * - unparking is useful at most once until the target parks again
 *
 * Unparking happens through the waiter's handle (see `core::interrupt`),
 * never through this module.
 */

use std::thread;
use std::time::{Duration, Instant};

/// Block the current thread until unparked.
#[inline]
pub fn park() {
    thread::park();
}

/// Block the current thread until unparked or the timeout elapses.
#[inline]
pub fn park_timeout(timeout: Duration) {
    thread::park_timeout(timeout);
}

/// Block the current thread until unparked or the absolute deadline passes.
///
/// Returns immediately if the deadline is already behind us.
#[inline]
pub fn park_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::park_timeout(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_stored_permit_is_not_lost() {
        // Unpark before park: the park call must return immediately.
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let me = thread::current();
            me.unpark();
            park();
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_park_timeout_elapses() {
        let start = Instant::now();
        park_timeout(Duration::from_millis(50));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_park_until_past_deadline_returns() {
        // A deadline in the past must not block.
        park_until(Instant::now() - Duration::from_millis(1));
    }
}
