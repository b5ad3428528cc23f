//! [`SharedTimedMutex`] is a fair shared/exclusive lock with timed acquisition for both
//! synchronous and asynchronous operations.

use std::fmt;
use std::future::{Future, poll_fn};
use std::marker::PhantomData;
use std::pin::{Pin, pin};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
#[cfg(not(feature = "loom"))]
use std::thread::{current, park, park_timeout};

#[cfg(feature = "loom")]
use loom::sync::{Mutex, MutexGuard};
#[cfg(feature = "loom")]
use loom::thread::{current, park};
#[cfg(not(feature = "loom"))]
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::config::{Config, DefaultConfig};
use crate::error::Error;
use crate::opcode::Opcode;
use crate::wait_queue::{Monitor, Token, WaitQueue};

/// [`SharedTimedMutex`] is a fair shared/exclusive lock with timed acquisition for both
/// synchronous and asynchronous operations.
///
/// The locking semantics is similar to [`RwLock`](std::sync::RwLock), however,
/// [`SharedTimedMutex`] only provides low-level locking and releasing methods, hence forcing the
/// user to manage the scope of acquired locks and resources to protect. Scoped guards are
/// available through [`RwLock`](crate::RwLock) and [`Mutex`](crate::Mutex).
///
/// Requests that cannot be granted immediately wait in arrival order regardless of their mode;
/// a release grants either a leading run of shared requests or a single exclusive request.
pub struct SharedTimedMutex<C: Config = DefaultConfig> {
    /// Lock counters and the wait queue.
    state: Mutex<State>,
    /// Clock and timer.
    _config: PhantomData<C>,
}

/// Lock counters and the wait queue.
#[derive(Debug, Default)]
struct State {
    /// Number of shared locks held.
    shared_count: usize,
    /// `1` if an exclusive lock is held.
    exclusive_count: usize,
    /// Requests that could not be granted on arrival.
    wait_queue: WaitQueue,
}

/// Awaits the grant of a wait queue entry.
///
/// Dropping a [`WaitEntry`] before it completes withdraws the request: the entry is removed, or
/// the lock is released on behalf of the waiter if the entry was granted without being polled.
struct WaitEntry<'m, C: Config> {
    /// The lock the entry was pushed into.
    mutex: &'m SharedTimedMutex<C>,
    /// Operation type.
    opcode: Opcode,
    /// `None` once the outcome has been delivered.
    token: Option<Token>,
}

impl<C: Config> SharedTimedMutex<C> {
    /// Creates a new [`SharedTimedMutex`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// static LOCK: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(LOCK.try_acquire_shared());
    /// assert!(LOCK.release_shared().is_ok());
    /// ```
    #[cfg(not(feature = "loom"))]
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            _config: PhantomData,
        }
    }

    /// Creates a new [`SharedTimedMutex`].
    #[cfg(feature = "loom")]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            _config: PhantomData,
        }
    }

    /// Returns `true` if the lock is currently free.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    /// assert!(lock.is_free());
    ///
    /// assert!(lock.try_acquire_exclusive());
    /// assert!(!lock.is_free());
    /// ```
    #[inline]
    pub fn is_free(&self) -> bool {
        let state = self.lock_state();
        state.shared_count == 0 && state.exclusive_count == 0
    }

    /// Returns `true` if an exclusive lock is currently held.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    /// assert!(!lock.is_exclusive());
    ///
    /// assert!(lock.try_acquire_exclusive());
    /// assert!(lock.is_exclusive());
    /// assert!(!lock.is_shared());
    /// ```
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        self.lock_state().exclusive_count != 0
    }

    /// Returns `true` if shared locks are currently held.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    /// assert!(!lock.is_shared());
    ///
    /// assert!(lock.try_acquire_shared());
    /// assert!(lock.is_shared());
    /// assert!(!lock.is_exclusive());
    /// ```
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.lock_state().shared_count != 0
    }

    /// Returns the number of shared locks currently held.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_shared());
    /// assert!(lock.try_acquire_shared());
    /// assert_eq!(lock.shared_count(), 2);
    /// ```
    #[inline]
    pub fn shared_count(&self) -> usize {
        self.lock_state().shared_count
    }

    /// Returns the number of requests waiting for the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    /// assert_eq!(lock.waiter_count(), 0);
    /// ```
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.lock_state().wait_queue.len()
    }

    /// Acquires an exclusive lock asynchronously.
    ///
    /// The request joins the wait queue when the future is first polled. Dropping the future
    /// before it completes withdraws the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     lock.acquire_exclusive_async().await;
    ///     assert!(lock.is_exclusive());
    ///     assert!(!lock.is_shared());
    /// };
    /// ```
    #[inline]
    pub async fn acquire_exclusive_async(&self) {
        self.acquire_async(Opcode::Exclusive).await;
    }

    /// Acquires an exclusive lock synchronously.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// lock.acquire_exclusive_sync();
    ///
    /// assert!(lock.is_exclusive());
    /// assert!(!lock.try_acquire_shared());
    /// ```
    #[inline]
    pub fn acquire_exclusive_sync(&self) {
        if let Some(token) = self.try_grant_or_enqueue(Opcode::Exclusive) {
            self.wait_sync(token, None);
        }
    }

    /// Tries to acquire an exclusive lock without waiting.
    ///
    /// Returns `false` if the lock was not free.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_exclusive());
    /// assert!(!lock.try_acquire_shared());
    /// assert!(!lock.try_acquire_exclusive());
    /// ```
    #[inline]
    pub fn try_acquire_exclusive(&self) -> bool {
        self.lock_state().try_grant(Opcode::Exclusive, false)
    }

    /// Tries to acquire an exclusive lock asynchronously, giving up after `timeout`.
    ///
    /// Returns `false` if the lock was not granted within `timeout`; the request is then
    /// withdrawn and will never be granted.
    ///
    /// # Panics
    ///
    /// With [`DefaultConfig`], panics if the lock is contended and the future is polled outside a
    /// Tokio runtime with the time driver enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     assert!(lock.try_acquire_exclusive_for(Duration::from_millis(10)).await);
    ///     assert!(!lock.try_acquire_exclusive_for(Duration::from_millis(10)).await);
    /// };
    /// ```
    #[inline]
    pub async fn try_acquire_exclusive_for(&self, timeout: Duration) -> bool {
        self.try_acquire_for_async(Opcode::Exclusive, timeout).await
    }

    /// Tries to acquire an exclusive lock asynchronously, giving up at `deadline`.
    ///
    /// A deadline in the past is treated as a zero timeout.
    ///
    /// # Panics
    ///
    /// With [`DefaultConfig`], panics if the lock is contended and the future is polled outside a
    /// Tokio runtime with the time driver enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     let deadline = Instant::now() + Duration::from_millis(10);
    ///     assert!(lock.try_acquire_exclusive_until(deadline).await);
    /// };
    /// ```
    #[inline]
    pub async fn try_acquire_exclusive_until(&self, deadline: Instant) -> bool {
        let timeout = deadline.saturating_duration_since(C::now());
        self.try_acquire_for_async(Opcode::Exclusive, timeout).await
    }

    /// Tries to acquire an exclusive lock synchronously, giving up after `timeout`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_shared());
    /// assert!(!lock.try_acquire_exclusive_for_sync(Duration::from_millis(1)));
    /// assert!(lock.release_shared().is_ok());
    /// assert!(lock.try_acquire_exclusive_for_sync(Duration::from_millis(1)));
    /// ```
    #[inline]
    pub fn try_acquire_exclusive_for_sync(&self, timeout: Duration) -> bool {
        self.try_acquire_until_sync(Opcode::Exclusive, Instant::now().checked_add(timeout))
    }

    /// Tries to acquire an exclusive lock synchronously, giving up at `deadline`.
    ///
    /// `deadline` is compared against [`Instant::now`], not [`Config::now`]; a deadline derived
    /// from a paused Tokio clock does not mean the same point in time here.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Instant;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_exclusive_until_sync(Instant::now()));
    /// assert!(!lock.try_acquire_exclusive_until_sync(Instant::now()));
    /// ```
    #[inline]
    pub fn try_acquire_exclusive_until_sync(&self, deadline: Instant) -> bool {
        self.try_acquire_until_sync(Opcode::Exclusive, Some(deadline))
    }

    /// Releases an exclusive lock.
    ///
    /// Waiting requests at the head of the wait queue are granted: either every shared request
    /// before the first exclusive one, or the exclusive one if it is at the head.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHeldExclusive`] if no exclusive lock was held; the lock state is left
    /// untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::{Error, SharedTimedMutex};
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// lock.acquire_exclusive_sync();
    ///
    /// assert!(lock.release_exclusive().is_ok());
    /// assert_eq!(lock.release_exclusive(), Err(Error::NotHeldExclusive));
    ///
    /// assert!(lock.try_acquire_shared());
    /// assert_eq!(lock.release_exclusive(), Err(Error::NotHeldExclusive));
    /// ```
    #[inline]
    pub fn release_exclusive(&self) -> Result<(), Error> {
        self.release(Opcode::Exclusive)
    }

    /// Acquires a shared lock asynchronously.
    ///
    /// The shared lock is not granted immediately if other requests are waiting, even when the
    /// lock is currently shared.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     lock.acquire_shared_async().await;
    ///     assert!(!lock.is_exclusive());
    ///     assert!(lock.is_shared());
    /// };
    /// ```
    #[inline]
    pub async fn acquire_shared_async(&self) {
        self.acquire_async(Opcode::Shared).await;
    }

    /// Acquires a shared lock synchronously.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// lock.acquire_shared_sync();
    ///
    /// assert!(lock.is_shared());
    /// assert!(!lock.try_acquire_exclusive());
    /// ```
    #[inline]
    pub fn acquire_shared_sync(&self) {
        if let Some(token) = self.try_grant_or_enqueue(Opcode::Shared) {
            self.wait_sync(token, None);
        }
    }

    /// Tries to acquire a shared lock without waiting.
    ///
    /// Returns `false` if an exclusive lock is held. Waiting requests are not taken into
    /// account.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_shared());
    /// assert!(lock.try_acquire_shared());
    /// assert!(!lock.try_acquire_exclusive());
    /// ```
    #[inline]
    pub fn try_acquire_shared(&self) -> bool {
        self.lock_state().try_grant(Opcode::Shared, false)
    }

    /// Tries to acquire a shared lock asynchronously, giving up after `timeout`.
    ///
    /// # Panics
    ///
    /// With [`DefaultConfig`], panics if the lock is contended and the future is polled outside a
    /// Tokio runtime with the time driver enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     assert!(lock.try_acquire_shared_for(Duration::from_millis(10)).await);
    ///     assert!(lock.try_acquire_shared_for(Duration::from_millis(10)).await);
    ///     assert_eq!(lock.shared_count(), 2);
    /// };
    /// ```
    #[inline]
    pub async fn try_acquire_shared_for(&self, timeout: Duration) -> bool {
        self.try_acquire_for_async(Opcode::Shared, timeout).await
    }

    /// Tries to acquire a shared lock asynchronously, giving up at `deadline`.
    ///
    /// # Panics
    ///
    /// With [`DefaultConfig`], panics if the lock is contended and the future is polled outside a
    /// Tokio runtime with the time driver enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// async {
    ///     let deadline = Instant::now() + Duration::from_millis(10);
    ///     assert!(lock.try_acquire_shared_until(deadline).await);
    /// };
    /// ```
    #[inline]
    pub async fn try_acquire_shared_until(&self, deadline: Instant) -> bool {
        let timeout = deadline.saturating_duration_since(C::now());
        self.try_acquire_for_async(Opcode::Shared, timeout).await
    }

    /// Tries to acquire a shared lock synchronously, giving up after `timeout`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_exclusive());
    /// assert!(!lock.try_acquire_shared_for_sync(Duration::from_millis(1)));
    /// ```
    #[inline]
    pub fn try_acquire_shared_for_sync(&self, timeout: Duration) -> bool {
        self.try_acquire_until_sync(Opcode::Shared, Instant::now().checked_add(timeout))
    }

    /// Tries to acquire a shared lock synchronously, giving up at `deadline`.
    ///
    /// `deadline` is compared against [`Instant::now`], not [`Config::now`]; a deadline derived
    /// from a paused Tokio clock does not mean the same point in time here.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Instant;
    ///
    /// use stlock::SharedTimedMutex;
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// assert!(lock.try_acquire_shared_until_sync(Instant::now()));
    /// assert!(lock.try_acquire_shared_until_sync(Instant::now()));
    /// ```
    #[inline]
    pub fn try_acquire_shared_until_sync(&self, deadline: Instant) -> bool {
        self.try_acquire_until_sync(Opcode::Shared, Some(deadline))
    }

    /// Releases a shared lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHeldShared`] if no shared lock was held; the lock state is left
    /// untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use stlock::{Error, SharedTimedMutex};
    ///
    /// let lock: SharedTimedMutex = SharedTimedMutex::new();
    ///
    /// lock.acquire_shared_sync();
    /// lock.acquire_shared_sync();
    ///
    /// assert!(lock.release_shared().is_ok());
    ///
    /// assert!(!lock.try_acquire_exclusive());
    /// assert!(lock.release_shared().is_ok());
    ///
    /// assert_eq!(lock.release_shared(), Err(Error::NotHeldShared));
    /// assert!(lock.try_acquire_exclusive());
    /// ```
    #[inline]
    pub fn release_shared(&self) -> Result<(), Error> {
        self.release(Opcode::Shared)
    }

    /// Locks the internal state.
    #[cfg(not(feature = "loom"))]
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Locks the internal state.
    #[cfg(feature = "loom")]
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Grants the lock if possible, otherwise pushes a wait queue entry.
    ///
    /// Returns the token of the wait queue entry if the lock was not granted.
    fn try_grant_or_enqueue(&self, opcode: Opcode) -> Option<Token> {
        let mut state = self.lock_state();
        if state.try_grant(opcode, true) {
            return None;
        }
        let token = state.wait_queue.push(opcode);
        trace!(token, ?opcode, waiters = state.wait_queue.len(), "enqueued");
        Some(token)
    }

    /// Acquires the lock asynchronously.
    async fn acquire_async(&self, opcode: Opcode) {
        if let Some(token) = self.try_grant_or_enqueue(opcode) {
            WaitEntry::new(self, opcode, token).await;
        }
    }

    /// Races the grant of the lock against a timer.
    async fn try_acquire_for_async(&self, opcode: Opcode, timeout: Duration) -> bool {
        let Some(token) = self.try_grant_or_enqueue(opcode) else {
            return true;
        };
        let mut wait_entry = WaitEntry::new(self, opcode, token);
        let mut sleep = pin!(C::sleep(timeout));
        poll_fn(|cx| {
            if Pin::new(&mut wait_entry).poll(cx).is_ready() {
                return Poll::Ready(true);
            }
            if sleep.as_mut().poll(cx).is_ready() {
                return Poll::Ready(wait_entry.expire());
            }
            Poll::Pending
        })
        .await
    }

    /// Acquires the lock synchronously, giving up at `deadline` if one is supplied.
    fn try_acquire_until_sync(&self, opcode: Opcode, deadline: Option<Instant>) -> bool {
        match self.try_grant_or_enqueue(opcode) {
            Some(token) => self.wait_sync(token, deadline),
            None => true,
        }
    }

    /// Parks the current thread until the entry is granted or `deadline` is reached.
    ///
    /// Returns `false` if the entry expired.
    fn wait_sync(&self, token: Token, deadline: Option<Instant>) -> bool {
        loop {
            let mut state = self.lock_state();
            if !state.wait_queue.register_thread(token, current()) {
                return true;
            }
            let Some(deadline) = deadline else {
                drop(state);
                park();
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                state.wait_queue.remove(token);
                debug!(token, "expired");
                let wakeups = state.advance();
                drop(state);
                wake_all(wakeups);
                return false;
            }
            drop(state);
            park_timeout(deadline - now);
        }
    }

    /// Releases the lock and grants waiting requests.
    fn release(&self, opcode: Opcode) -> Result<(), Error> {
        let mut state = self.lock_state();
        if let Err(error) = state.release(opcode) {
            debug!(?opcode, %error, "release rejected");
            return Err(error);
        }
        let wakeups = state.advance();
        drop(state);
        wake_all(wakeups);
        Ok(())
    }

    /// Withdraws a request whose waiter no longer observes the outcome.
    fn withdraw(&self, opcode: Opcode, token: Token) {
        let mut state = self.lock_state();
        if state.wait_queue.remove(token).is_some() {
            debug!(token, ?opcode, "withdrawn");
        } else {
            // The entry was granted, but the waiter never took ownership.
            let released = state.release(opcode);
            debug_assert!(released.is_ok());
            debug!(token, ?opcode, "released unobserved grant");
        }
        let wakeups = state.advance();
        drop(state);
        wake_all(wakeups);
    }
}

impl<C: Config> Default for SharedTimedMutex<C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> fmt::Debug for SharedTimedMutex<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SharedTimedMutex")
            .field("shared_count", &state.shared_count)
            .field("exclusive_count", &state.exclusive_count)
            .field("waiters", &state.wait_queue.len())
            .finish()
    }
}

impl State {
    /// Creates a free [`State`].
    #[inline]
    const fn new() -> Self {
        Self {
            shared_count: 0,
            exclusive_count: 0,
            wait_queue: WaitQueue::new(),
        }
    }

    /// Grants the lock if the counters allow it.
    ///
    /// A fair request is not granted while other requests are waiting.
    fn try_grant(&mut self, opcode: Opcode, fair: bool) -> bool {
        if !opcode.can_grant(self.shared_count, self.exclusive_count)
            || (fair && !self.wait_queue.is_empty())
        {
            return false;
        }
        self.grant(opcode);
        true
    }

    /// Charges the lock to the counters.
    fn grant(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::Exclusive => self.exclusive_count += 1,
            Opcode::Shared => self.shared_count += 1,
        }
        debug_assert!(self.shared_count == 0 || self.exclusive_count == 0);
        debug_assert!(self.exclusive_count <= 1);
    }

    /// Returns a lock to the counters.
    fn release(&mut self, opcode: Opcode) -> Result<(), Error> {
        if !opcode.can_release(self.shared_count, self.exclusive_count) {
            return Err(match opcode {
                Opcode::Exclusive => Error::NotHeldExclusive,
                Opcode::Shared => Error::NotHeldShared,
            });
        }
        match opcode {
            Opcode::Exclusive => self.exclusive_count -= 1,
            Opcode::Shared => self.shared_count -= 1,
        }
        Ok(())
    }

    /// Grants entries at the head of the wait queue as long as the counters allow it.
    ///
    /// Returns the monitors of the granted entries; they must be woken after the state is
    /// unlocked.
    fn advance(&mut self) -> Vec<Monitor> {
        let mut wakeups = Vec::new();
        while let Some(opcode) = self.wait_queue.front() {
            if !opcode.can_grant(self.shared_count, self.exclusive_count) {
                break;
            }
            let Some((token, entry)) = self.wait_queue.pop_front() else {
                break;
            };
            let opcode = entry.opcode();
            self.grant(opcode);
            trace!(token, ?opcode, shared_count = self.shared_count, "granted");
            if let Some(monitor) = entry.into_monitor() {
                wakeups.push(monitor);
            }
            if opcode.ends_run() {
                break;
            }
        }
        debug_assert!(
            self.wait_queue
                .front()
                .is_none_or(|opcode| !opcode.can_grant(self.shared_count, self.exclusive_count))
        );
        wakeups
    }
}

impl<'m, C: Config> WaitEntry<'m, C> {
    /// Creates a new [`WaitEntry`] for a pushed entry.
    #[inline]
    const fn new(mutex: &'m SharedTimedMutex<C>, opcode: Opcode, token: Token) -> Self {
        Self {
            mutex,
            opcode,
            token: Some(token),
        }
    }

    /// Gives up waiting.
    ///
    /// Returns `true` if the entry had been granted before it could be removed.
    fn expire(&mut self) -> bool {
        let Some(token) = self.token.take() else {
            return true;
        };
        let mut state = self.mutex.lock_state();
        if state.wait_queue.remove(token).is_none() {
            return true;
        }
        debug!(token, opcode = ?self.opcode, "expired");
        let wakeups = state.advance();
        drop(state);
        wake_all(wakeups);
        false
    }
}

impl<C: Config> Future for WaitEntry<'_, C> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(token) = this.token else {
            return Poll::Ready(());
        };
        if this
            .mutex
            .lock_state()
            .wait_queue
            .register_waker(token, cx.waker())
        {
            return Poll::Pending;
        }
        this.token = None;
        Poll::Ready(())
    }
}

impl<C: Config> Drop for WaitEntry<'_, C> {
    #[inline]
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.mutex.withdraw(self.opcode, token);
        }
    }
}

/// Wakes up granted waiters.
#[inline]
fn wake_all(wakeups: Vec<Monitor>) {
    if !wakeups.is_empty() {
        trace!(waiters = wakeups.len(), "wake");
    }
    wakeups.into_iter().for_each(Monitor::wake);
}

/// `loom` does not model timeouts.
#[cfg(feature = "loom")]
#[inline]
fn park_timeout(_timeout: Duration) {
    loom::thread::yield_now();
}
