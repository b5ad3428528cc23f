//! [`Config`] defines the clock and timer used by timed acquisitions.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// [`Config`] defines the clock and timer used by timed acquisitions.
///
/// Timed acquisitions race a grant against the future returned by [`Config::sleep`]; dropping
/// that future must cancel the timer.
pub trait Config: fmt::Debug + Default + Send + Sync + 'static {
    /// Returns the current time of the clock that deadlines are measured against.
    #[inline]
    #[must_use]
    fn now() -> Instant {
        Instant::now()
    }

    /// Returns a future that completes once `duration` has elapsed.
    fn sleep(duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Default configuration: the [`tokio`] timer and clock.
///
/// Timed asynchronous acquisitions must be awaited inside a [`tokio`] runtime with the time
/// driver enabled. The clock follows `tokio::time::pause` and `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct DefaultConfig;

impl Config for DefaultConfig {
    #[inline]
    fn now() -> Instant {
        tokio::time::Instant::now().into_std()
    }

    #[inline]
    fn sleep(duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
