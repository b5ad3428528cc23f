//! Errors reported by [`SharedTimedMutex`](crate::SharedTimedMutex).

/// Illegal usage of a [`SharedTimedMutex`](crate::SharedTimedMutex).
///
/// Returned synchronously by the release methods; the lock state is left untouched. Timed
/// acquisitions that expire are not errors, they resolve to `false`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// [`release_exclusive`](crate::SharedTimedMutex::release_exclusive) was called while no
    /// exclusive lock was held.
    #[error("the mutex is not locked exclusively")]
    NotHeldExclusive,
    /// [`release_shared`](crate::SharedTimedMutex::release_shared) was called while no shared
    /// lock was held.
    #[error("the mutex is not locked in shared mode")]
    NotHeldShared,
}
