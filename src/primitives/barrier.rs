/*!
 * Cyclic Barrier
 *
 * Reusable rendezvous point for a fixed party count, built from a
 * `ReentrantLock` and one condition. Each cycle is a generation: the last
 * arriver trips the barrier, runs the optional action, and rolls the
 * generation so the barrier can be reused. An interrupt or timeout on any
 * waiter breaks the current generation for every co-waiter.
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tracing::{debug, trace};

use crate::core::errors::{BarrierError, ConditionError};
use crate::core::interrupt;
use crate::primitives::mutex::{LockOps, ReentrantLock};
use crate::sync::Condition;

/// One barrier cycle. Swapped out whole when the barrier trips or resets so
/// that threads parked on an old cycle can tell it ended.
struct Generation {
    broken: AtomicBool,
}

impl Generation {
    fn new() -> Self {
        Self {
            broken: AtomicBool::new(false),
        }
    }
}

type BarrierAction = Box<dyn Fn() + Send + Sync>;

/// Barrier that releases all parties once the last one arrives, then resets
/// itself for the next cycle.
pub struct CyclicBarrier {
    lock: ReentrantLock,
    trip: Condition<LockOps>,
    parties: usize,
    /// Arrivals still awaited in the current generation. Only touched while
    /// `lock` is held.
    count: AtomicUsize,
    generation: ArcSwap<Generation>,
    action: Option<BarrierAction>,
}

impl CyclicBarrier {
    /// New barrier for `parties` threads.
    ///
    /// # Panics
    /// Panics if `parties` is zero.
    pub fn new(parties: usize) -> Self {
        Self::build(parties, None)
    }

    /// New barrier that runs `action` on the tripping thread before any
    /// waiter is released.
    pub fn with_action(parties: usize, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self::build(parties, Some(Box::new(action)))
    }

    fn build(parties: usize, action: Option<BarrierAction>) -> Self {
        assert!(parties > 0, "barrier requires at least one party");
        let lock = ReentrantLock::new();
        let trip = lock.new_condition();
        Self {
            lock,
            trip,
            parties,
            count: AtomicUsize::new(parties),
            generation: ArcSwap::from_pointee(Generation::new()),
            action,
        }
    }

    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Arrive and block until all parties have arrived.
    ///
    /// Returns the arrival index: `parties() - 1` for the first arriver down
    /// to `0` for the one that trips the barrier.
    pub fn wait(&self) -> Result<usize, BarrierError> {
        self.do_wait(None)
    }

    /// Arrive and block at most `timeout`. Timing out breaks the barrier.
    pub fn wait_for(&self, timeout: Duration) -> Result<usize, BarrierError> {
        self.do_wait(Some(Instant::now() + timeout))
    }

    pub fn wait_until(&self, deadline: Instant) -> Result<usize, BarrierError> {
        self.do_wait(Some(deadline))
    }

    fn do_wait(&self, deadline: Option<Instant>) -> Result<usize, BarrierError> {
        let _guard = self.lock.guard();
        let generation = self.generation.load_full();

        if generation.broken.load(Ordering::Relaxed) {
            return Err(BarrierError::Broken);
        }
        if interrupt::interrupted() {
            self.break_generation();
            return Err(BarrierError::Interrupted);
        }

        let index = self.count.load(Ordering::Relaxed) - 1;
        self.count.store(index, Ordering::Relaxed);

        if index == 0 {
            // Tripping thread: run the action and roll the generation. The
            // unwind guard breaks the barrier if the action panics, so
            // co-waiters are not left parked forever.
            let mut unwind = BreakOnUnwind {
                barrier: self,
                armed: true,
            };
            if let Some(action) = &self.action {
                action();
            }
            self.next_generation();
            unwind.armed = false;
            return Ok(0);
        }

        loop {
            let mut timed_out = false;
            let outcome = match deadline {
                None => self.trip.wait().map(|()| true),
                Some(at) => self.trip.wait_until(at),
            };
            match outcome {
                Ok(signalled) => timed_out = !signalled,
                Err(ConditionError::Interrupted) => {
                    if Arc::ptr_eq(&generation, &self.generation.load_full())
                        && !generation.broken.load(Ordering::Relaxed)
                    {
                        self.break_generation();
                        return Err(BarrierError::Interrupted);
                    }
                    // Interrupt landed after this generation already ended;
                    // keep the status for a later interruption point.
                    interrupt::set_interrupted();
                }
                // NotOwner/ForeignCondition cannot occur: the guard is held
                // and the condition belongs to this barrier's lock.
                Err(_) => return Err(BarrierError::Broken),
            }

            if generation.broken.load(Ordering::Relaxed) {
                return Err(BarrierError::Broken);
            }
            if !Arc::ptr_eq(&generation, &self.generation.load_full()) {
                return Ok(index);
            }
            if timed_out {
                self.break_generation();
                return Err(BarrierError::Timeout);
            }
        }
    }

    /// Break the current generation and start a new one. Threads waiting
    /// when `reset` is called observe `BarrierError::Broken`.
    pub fn reset(&self) {
        let _guard = self.lock.guard();
        self.break_generation();
        self.next_generation();
    }

    /// Whether the current generation is broken.
    pub fn is_broken(&self) -> bool {
        let _guard = self.lock.guard();
        self.generation.load().broken.load(Ordering::Relaxed)
    }

    /// Parties currently blocked in `wait`.
    pub fn number_waiting(&self) -> usize {
        let _guard = self.lock.guard();
        self.parties - self.count.load(Ordering::Relaxed)
    }

    /// Caller must hold `lock`.
    fn break_generation(&self) {
        debug!(parties = self.parties, "breaking barrier generation");
        self.generation
            .load()
            .broken
            .store(true, Ordering::Relaxed);
        self.count.store(self.parties, Ordering::Relaxed);
        let _ = self.trip.signal_all();
    }

    /// Caller must hold `lock`.
    fn next_generation(&self) {
        trace!(parties = self.parties, "barrier tripped, starting next generation");
        let _ = self.trip.signal_all();
        self.count.store(self.parties, Ordering::Relaxed);
        self.generation.store(Arc::new(Generation::new()));
    }
}

impl std::fmt::Debug for CyclicBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclicBarrier")
            .field("parties", &self.parties)
            .finish_non_exhaustive()
    }
}

struct BreakOnUnwind<'a> {
    barrier: &'a CyclicBarrier,
    armed: bool,
}

impl Drop for BreakOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.barrier.break_generation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_party_trips_immediately() {
        let barrier = CyclicBarrier::new(1);
        assert_eq!(barrier.wait(), Ok(0));
        // Reusable: second cycle trips the same way
        assert_eq!(barrier.wait(), Ok(0));
        assert!(!barrier.is_broken());
    }

    #[test]
    fn test_action_runs_on_trip() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let barrier = CyclicBarrier::with_action(1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        barrier.wait().unwrap();
        barrier.wait().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_breaks_barrier() {
        let barrier = CyclicBarrier::new(2);
        assert_eq!(
            barrier.wait_for(Duration::from_millis(50)),
            Err(BarrierError::Timeout)
        );
        assert!(barrier.is_broken());
        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }

    #[test]
    fn test_reset_restores_broken_barrier() {
        let barrier = CyclicBarrier::new(2);
        let _ = barrier.wait_for(Duration::from_millis(10));
        assert!(barrier.is_broken());
        barrier.reset();
        assert!(!barrier.is_broken());
        assert_eq!(barrier.number_waiting(), 0);
    }

    #[test]
    #[should_panic(expected = "at least one party")]
    fn test_zero_parties_rejected() {
        let _ = CyclicBarrier::new(0);
    }
}
