#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![doc = include_str!("../README.md")]

pub mod config;
pub use config::{Config, DefaultConfig};

pub mod error;
pub use error::Error;

pub mod shared_timed_mutex;
pub use shared_timed_mutex::SharedTimedMutex;

#[cfg(all(feature = "lock_api", not(feature = "loom")))]
mod lock_api;
#[cfg(all(feature = "lock_api", not(feature = "loom")))]
pub use self::lock_api::{
    Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, lock_async, read_async,
    try_lock_for, try_read_for, try_read_until, try_write_for, try_write_until, write_async,
};

mod opcode;
mod wait_queue;

#[cfg(test)]
mod tests;
