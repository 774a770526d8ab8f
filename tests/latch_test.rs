/*!
 * Countdown Latch Integration Tests
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parkway::CountDownLatch;

#[test]
fn test_all_waiters_release_on_final_count() {
    let latch = Arc::new(CountDownLatch::new(3));
    let released = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..5)
        .map(|_| {
            let latch = Arc::clone(&latch);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                latch.wait().unwrap();
                released.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    latch.count_down();
    latch.count_down();
    thread::sleep(Duration::from_millis(20));
    // Nobody gets through until the count reaches zero
    assert_eq!(released.load(Ordering::SeqCst), 0);

    latch.count_down();
    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), 5);
    assert_eq!(latch.count(), 0);
}

#[test]
fn test_wait_on_open_latch_returns_immediately() {
    let latch = CountDownLatch::new(0);
    latch.wait().unwrap();
    assert_eq!(latch.count(), 0);
}

#[test]
fn test_extra_count_down_is_a_no_op() {
    let latch = CountDownLatch::new(1);
    latch.count_down();
    latch.count_down();
    assert_eq!(latch.count(), 0);
    latch.wait().unwrap();
}

#[test]
fn test_timed_wait_observes_timeout() {
    let latch = CountDownLatch::new(1);
    let start = Instant::now();
    assert_eq!(latch.wait_for(Duration::from_millis(60)), Ok(false));
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(latch.count(), 1);
}

#[test]
fn test_timed_wait_succeeds_when_opened() {
    let latch = Arc::new(CountDownLatch::new(1));
    let waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.wait_for(Duration::from_secs(10)))
    };
    thread::sleep(Duration::from_millis(20));
    latch.count_down();
    assert_eq!(waiter.join().unwrap(), Ok(true));
}
