/*!
 * Parkway
 *
 * Blocking synchronization primitives over a single-word-of-state
 * synchronizer framework. A `Synchronizer` pairs an atomic state word with a
 * FIFO queue of parked threads; a `SyncOps` implementation supplies the
 * acquire/release policy and the framework supplies queuing, parking,
 * cancellation, timeouts and condition waits. `ReentrantLock`,
 * `CountDownLatch`, `CyclicBarrier` and `Semaphore` are built on it.
 *
 * Interruption is explicit: a thread's waits can be broken from outside
 * through the `InterruptHandle` obtained from `interrupt::current`.
 * Interruptible entry points return `Err(Interrupted)` with the status
 * cleared; uninterruptible ones complete and re-assert the status.
 */

pub mod core;
pub mod primitives;
pub mod sync;

pub use crate::core::errors::{BarrierError, ConditionError, Interrupted, LockError};
pub use crate::core::interrupt::{self, InterruptHandle};
pub use crate::sync::{Condition, Mode, StateWord, SyncOps, SyncView, Synchronizer};

pub use crate::primitives::{CountDownLatch, CyclicBarrier, LockGuard, ReentrantLock, Semaphore};
