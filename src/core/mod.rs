/*!
 * Core Facilities
 *
 * Ambient support consumed by the synchronizer: the thread parking facility,
 * the explicit interruption model, bounded spin backoff for CAS loops, and
 * the central error taxonomy.
 */

pub mod errors;
pub mod interrupt;
pub mod park;
pub mod spinwait;

pub use errors::{BarrierError, ConditionError, Interrupted, LockError};
pub use interrupt::InterruptHandle;
pub use spinwait::Backoff;
