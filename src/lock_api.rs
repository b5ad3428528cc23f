//! Implementations of locking traits from the [`lock_api`](https://crates.io/crates/lock_api) crate.

use std::time::{Duration, Instant};

use super::SharedTimedMutex;
use crate::config::Config;

/// A mutual exclusion primitive for protecting shared data of type `T`.
///
/// # Examples
///
/// ```
/// use stlock::Mutex;
///
/// let mutex: Mutex<usize> = Mutex::new(0);
/// ```
pub type Mutex<T> = lock_api::Mutex<SharedTimedMutex, T>;

/// An RAII implementation of a scoped mutex.
///
/// # Examples
///
/// ```
/// use stlock::{Mutex, MutexGuard};
///
/// let mutex: Mutex<usize> = Mutex::new(0);
/// let mut guard: MutexGuard<usize> = mutex.lock();
/// *guard += 1;
/// drop(guard);
///
/// assert_eq!(*mutex.try_lock().unwrap(), 1);
/// ```
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, SharedTimedMutex, T>;

/// Acquires a mutex, asynchronously.
///
/// # Examples
///
/// ```
/// use stlock::{Mutex, MutexGuard, lock_async};
///
/// let mutex: Mutex<usize> = Mutex::new(0);
///
/// async {
///     let mut guard: MutexGuard<usize> = lock_async(&mutex).await;
/// };
/// ```
pub async fn lock_async<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    unsafe {
        mutex.raw().acquire_exclusive_async().await;
        mutex.make_guard_unchecked()
    }
}

/// Tries to acquire a mutex asynchronously, giving up after `timeout`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stlock::{Mutex, try_lock_for};
///
/// let mutex: Mutex<usize> = Mutex::new(0);
///
/// async {
///     let guard = try_lock_for(&mutex, Duration::from_millis(10)).await;
///     assert!(guard.is_some());
/// };
/// ```
pub async fn try_lock_for<T>(mutex: &Mutex<T>, timeout: Duration) -> Option<MutexGuard<'_, T>> {
    let raw = unsafe { mutex.raw() };
    if raw.try_acquire_exclusive_for(timeout).await {
        unsafe { Some(mutex.make_guard_unchecked()) }
    } else {
        None
    }
}

/// A reader-writer lock for protecting shared data of type `T`.
///
/// # Examples
///
/// ```
/// use stlock::RwLock;
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// ```
pub type RwLock<T> = lock_api::RwLock<SharedTimedMutex, T>;

/// An RAII implementation of a scoped read lock.
///
/// # Examples
///
/// ```
/// use stlock::{RwLock, RwLockReadGuard};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// let guard: RwLockReadGuard<usize> = rwlock.read();
/// assert_eq!(*guard, 0);
/// ```
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, SharedTimedMutex, T>;

/// An RAII implementation of a scoped write lock.
///
/// # Examples
///
/// ```
/// use stlock::{RwLock, RwLockWriteGuard};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// let mut guard: RwLockWriteGuard<usize> = rwlock.write();
/// *guard += 1;
/// drop(guard);
///
/// assert_eq!(*rwlock.read(), 1);
/// ```
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, SharedTimedMutex, T>;

/// Locks the [`RwLock`] with shared read access, asynchronously.
///
/// # Examples
///
/// ```
/// use stlock::{RwLock, RwLockReadGuard, read_async};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     let guard: RwLockReadGuard<usize> = read_async(&rwlock).await;
/// };
/// ```
pub async fn read_async<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    unsafe {
        rwlock.raw().acquire_shared_async().await;
        rwlock.make_read_guard_unchecked()
    }
}

/// Locks the [`RwLock`] with exclusive write access, asynchronously.
///
/// # Examples
///
/// ```
/// use stlock::{RwLock, RwLockWriteGuard, write_async};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     let guard: RwLockWriteGuard<usize> = write_async(&rwlock).await;
/// };
/// ```
pub async fn write_async<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    unsafe {
        rwlock.raw().acquire_exclusive_async().await;
        rwlock.make_write_guard_unchecked()
    }
}

/// Tries to lock the [`RwLock`] with shared read access asynchronously, giving up after
/// `timeout`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stlock::{RwLock, try_read_for};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     let guard = try_read_for(&rwlock, Duration::from_millis(10)).await;
///     assert_eq!(guard.map(|g| *g), Some(0));
/// };
/// ```
pub async fn try_read_for<T>(
    rwlock: &RwLock<T>,
    timeout: Duration,
) -> Option<RwLockReadGuard<'_, T>> {
    let raw = unsafe { rwlock.raw() };
    if raw.try_acquire_shared_for(timeout).await {
        unsafe { Some(rwlock.make_read_guard_unchecked()) }
    } else {
        None
    }
}

/// Tries to lock the [`RwLock`] with shared read access asynchronously, giving up at
/// `deadline`.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use stlock::{RwLock, try_read_until};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     let deadline = Instant::now() + Duration::from_millis(10);
///     assert!(try_read_until(&rwlock, deadline).await.is_some());
/// };
/// ```
pub async fn try_read_until<T>(
    rwlock: &RwLock<T>,
    deadline: Instant,
) -> Option<RwLockReadGuard<'_, T>> {
    let raw = unsafe { rwlock.raw() };
    if raw.try_acquire_shared_until(deadline).await {
        unsafe { Some(rwlock.make_read_guard_unchecked()) }
    } else {
        None
    }
}

/// Tries to lock the [`RwLock`] with exclusive write access asynchronously, giving up after
/// `timeout`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stlock::{RwLock, try_write_for};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     if let Some(mut guard) = try_write_for(&rwlock, Duration::from_millis(10)).await {
///         *guard += 1;
///     }
/// };
/// ```
pub async fn try_write_for<T>(
    rwlock: &RwLock<T>,
    timeout: Duration,
) -> Option<RwLockWriteGuard<'_, T>> {
    let raw = unsafe { rwlock.raw() };
    if raw.try_acquire_exclusive_for(timeout).await {
        unsafe { Some(rwlock.make_write_guard_unchecked()) }
    } else {
        None
    }
}

/// Tries to lock the [`RwLock`] with exclusive write access asynchronously, giving up at
/// `deadline`.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use stlock::{RwLock, try_write_until};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
///
/// async {
///     let deadline = Instant::now() + Duration::from_millis(10);
///     assert!(try_write_until(&rwlock, deadline).await.is_some());
/// };
/// ```
pub async fn try_write_until<T>(
    rwlock: &RwLock<T>,
    deadline: Instant,
) -> Option<RwLockWriteGuard<'_, T>> {
    let raw = unsafe { rwlock.raw() };
    if raw.try_acquire_exclusive_until(deadline).await {
        unsafe { Some(rwlock.make_write_guard_unchecked()) }
    } else {
        None
    }
}

unsafe impl<C: Config> lock_api::RawMutex for SharedTimedMutex<C> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SharedTimedMutex::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock(&self) {
        self.acquire_exclusive_sync();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_acquire_exclusive()
    }

    #[inline]
    unsafe fn unlock(&self) {
        let released = self.release_exclusive();
        debug_assert!(released.is_ok());
    }

    #[inline]
    fn is_locked(&self) -> bool {
        !self.is_free()
    }
}

unsafe impl<C: Config> lock_api::RawMutexFair for SharedTimedMutex<C> {
    #[inline]
    unsafe fn unlock_fair(&self) {
        let released = self.release_exclusive();
        debug_assert!(released.is_ok());
    }
}

unsafe impl<C: Config> lock_api::RawMutexTimed for SharedTimedMutex<C> {
    type Duration = Duration;
    type Instant = Instant;

    #[inline]
    fn try_lock_for(&self, timeout: Self::Duration) -> bool {
        self.try_acquire_exclusive_for_sync(timeout)
    }

    #[inline]
    fn try_lock_until(&self, deadline: Self::Instant) -> bool {
        self.try_acquire_exclusive_until_sync(deadline)
    }
}

unsafe impl<C: Config> lock_api::RawRwLock for SharedTimedMutex<C> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SharedTimedMutex::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock_shared(&self) {
        self.acquire_shared_sync();
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_acquire_shared()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        let released = self.release_shared();
        debug_assert!(released.is_ok());
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.acquire_exclusive_sync();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_acquire_exclusive()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        let released = self.release_exclusive();
        debug_assert!(released.is_ok());
    }

    #[inline]
    fn is_locked(&self) -> bool {
        !self.is_free()
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        self.is_exclusive()
    }
}

unsafe impl<C: Config> lock_api::RawRwLockFair for SharedTimedMutex<C> {
    #[inline]
    unsafe fn unlock_shared_fair(&self) {
        let released = self.release_shared();
        debug_assert!(released.is_ok());
    }

    #[inline]
    unsafe fn unlock_exclusive_fair(&self) {
        let released = self.release_exclusive();
        debug_assert!(released.is_ok());
    }
}

unsafe impl<C: Config> lock_api::RawRwLockTimed for SharedTimedMutex<C> {
    type Duration = Duration;
    type Instant = Instant;

    #[inline]
    fn try_lock_shared_for(&self, timeout: Self::Duration) -> bool {
        self.try_acquire_shared_for_sync(timeout)
    }

    #[inline]
    fn try_lock_shared_until(&self, deadline: Self::Instant) -> bool {
        self.try_acquire_shared_until_sync(deadline)
    }

    #[inline]
    fn try_lock_exclusive_for(&self, timeout: Self::Duration) -> bool {
        self.try_acquire_exclusive_for_sync(timeout)
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Self::Instant) -> bool {
        self.try_acquire_exclusive_until_sync(deadline)
    }
}
