/*!
 * Synchronizer Framework
 *
 * A reusable core for building blocking, interruptible, timed, fair and
 * unfair synchronization primitives: one atomically-updated state word, an
 * intrusive CAS-linked wait queue, a generic acquire/release protocol
 * driven by pluggable hooks, and per-instance condition objects.
 *
 * # Architecture
 *
 * Concrete primitives (`primitives::*`) implement `SyncOps` to define what
 * the state word means; the `Synchronizer` owns queueing, parking, wakeup,
 * interruption and timeout. Exclusive mode grants to exactly one thread at
 * a time; shared mode cascades wakeups while surplus remains.
 */

mod condition;
mod node;
mod queue;
mod state;
mod synchronizer;

pub use condition::Condition;
pub use node::Mode;
pub use state::StateWord;
pub use synchronizer::{SyncOps, SyncView, Synchronizer};
