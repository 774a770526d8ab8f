/*!
 * Error Types
 * Centralized error handling for the synchronizer core and the primitives
 * layered on top of it
 */

use thiserror::Error;

/// The waiting thread was interrupted.
///
/// Interruptible entry points return this and clear the thread's interrupt
/// status; uninterruptible entry points never return it and instead re-assert
/// the status after the operation completes. An interrupt is never dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("thread interrupted while waiting")]
pub struct Interrupted;

/// Lock misuse errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("current thread does not hold the lock")]
    NotOwner,
}

/// Condition protocol violations and wait failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionError {
    /// Illegal state: the calling thread does not hold exclusive ownership
    /// of the owning synchronizer.
    #[error("current thread does not hold the owning synchronizer")]
    NotOwner,

    /// Illegal argument: the condition was created by a different
    /// synchronizer instance.
    #[error("condition is not associated with this synchronizer")]
    ForeignCondition,

    #[error("thread interrupted while waiting on condition")]
    Interrupted,
}

impl From<Interrupted> for ConditionError {
    fn from(_: Interrupted) -> Self {
        ConditionError::Interrupted
    }
}

/// Barrier wait failures
///
/// A single waiter's interruption or timeout breaks the barrier for every
/// co-waiter: the failing thread gets `Interrupted`/`Timeout`, everyone else
/// gets `Broken`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierError {
    #[error("barrier was broken while waiting")]
    Broken,

    #[error("thread interrupted while waiting at barrier")]
    Interrupted,

    #[error("timed out waiting at barrier")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_converts_to_condition_error() {
        let err: ConditionError = Interrupted.into();
        assert_eq!(err, ConditionError::Interrupted);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Interrupted.to_string(), "thread interrupted while waiting");
        assert_eq!(
            LockError::NotOwner.to_string(),
            "current thread does not hold the lock"
        );
        assert_eq!(
            BarrierError::Broken.to_string(),
            "barrier was broken while waiting"
        );
    }
}
