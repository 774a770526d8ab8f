/*!
 * Synchronization Primitives
 * Concrete lock, latch, barrier and semaphore built on the synchronizer core
 */

pub mod barrier;
pub mod latch;
pub mod mutex;
pub mod semaphore;

pub use barrier::CyclicBarrier;
pub use latch::CountDownLatch;
pub use mutex::{LockGuard, LockOps, ReentrantLock};
pub use semaphore::Semaphore;
