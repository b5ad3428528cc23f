//! Wait queue implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::task::Waker;
#[cfg(not(feature = "loom"))]
use std::thread::Thread;

#[cfg(feature = "loom")]
use loom::thread::Thread;

use crate::opcode::Opcode;

/// Identifies a wait queue entry.
///
/// Tokens are issued in strictly increasing order, therefore the order of tokens is the arrival
/// order of entries.
pub(crate) type Token = u64;

/// Fair wait queue for [`SharedTimedMutex`](crate::SharedTimedMutex).
///
/// Entries are pushed at the tail and granted from the head; an entry can also be removed from
/// anywhere in the queue by its token when the waiter gives up.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    /// Entries ordered by token.
    entries: BTreeMap<Token, Entry>,
    /// The token that will be assigned to the next entry.
    next_token: Token,
}

/// Wait queue entry.
#[derive(Debug)]
pub(crate) struct Entry {
    /// Operation type.
    opcode: Opcode,
    /// Resumes the waiter once the entry is granted.
    ///
    /// `None` until the waiter has been polled or parked for the first time.
    monitor: Option<Monitor>,
}

/// Resumes a waiter.
pub(crate) enum Monitor {
    /// Wakes an executor.
    Async(Waker),
    /// Unparks a thread.
    Sync(Thread),
}

impl WaitQueue {
    /// Creates an empty [`WaitQueue`].
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_token: 0,
        }
    }

    /// Returns `true` if no entries are waiting.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of waiting entries.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Pushes a new entry at the tail and returns its token.
    pub(crate) fn push(&mut self, opcode: Opcode) -> Token {
        let token = self.next_token;
        self.next_token += 1;
        self.entries.insert(
            token,
            Entry {
                opcode,
                monitor: None,
            },
        );
        token
    }

    /// Returns the operation type of the head entry.
    #[inline]
    pub(crate) fn front(&self) -> Option<Opcode> {
        self.entries.first_key_value().map(|(_, entry)| entry.opcode)
    }

    /// Pops the head entry.
    #[inline]
    pub(crate) fn pop_front(&mut self) -> Option<(Token, Entry)> {
        self.entries.pop_first()
    }

    /// Removes the entry associated with the token.
    ///
    /// Returns `None` if the entry was already removed.
    #[inline]
    pub(crate) fn remove(&mut self, token: Token) -> Option<Entry> {
        self.entries.remove(&token)
    }

    /// Installs the waker to resume the waiting task.
    ///
    /// Returns `false` if the entry is no longer in the queue.
    pub(crate) fn register_waker(&mut self, token: Token, waker: &Waker) -> bool {
        let Some(entry) = self.entries.get_mut(&token) else {
            return false;
        };
        match &mut entry.monitor {
            Some(Monitor::Async(current)) if current.will_wake(waker) => (),
            monitor => *monitor = Some(Monitor::Async(waker.clone())),
        }
        true
    }

    /// Installs the thread to unpark.
    ///
    /// Returns `false` if the entry is no longer in the queue.
    pub(crate) fn register_thread(&mut self, token: Token, thread: Thread) -> bool {
        let Some(entry) = self.entries.get_mut(&token) else {
            return false;
        };
        entry.monitor = Some(Monitor::Sync(thread));
        true
    }
}

impl Entry {
    /// Returns the operation type.
    #[inline]
    pub(crate) const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Takes the monitor out of the entry.
    #[inline]
    pub(crate) fn into_monitor(self) -> Option<Monitor> {
        self.monitor
    }
}

impl Monitor {
    /// Resumes the waiter.
    #[inline]
    pub(crate) fn wake(self) {
        match self {
            Monitor::Async(waker) => waker.wake(),
            Monitor::Sync(thread) => thread.unpark(),
        }
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Monitor::Async(_) => f.write_str("Async"),
            Monitor::Sync(_) => f.write_str("Sync"),
        }
    }
}
