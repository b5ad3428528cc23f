//! Lock acquisition modes.

/// Operation types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Opcode {
    /// Acquires exclusive ownership.
    Exclusive,
    /// Acquires shared ownership.
    Shared,
}

impl Opcode {
    /// Checks if the resource expressed in `self` can be granted from the supplied counters.
    #[inline]
    pub(crate) const fn can_grant(self, shared_count: usize, exclusive_count: usize) -> bool {
        match self {
            Opcode::Exclusive => shared_count == 0 && exclusive_count == 0,
            Opcode::Shared => exclusive_count == 0,
        }
    }

    /// Checks if the resource expressed in `self` can be released from the supplied counters.
    #[inline]
    pub(crate) const fn can_release(self, shared_count: usize, exclusive_count: usize) -> bool {
        match self {
            Opcode::Exclusive => exclusive_count == 1,
            Opcode::Shared => shared_count != 0,
        }
    }

    /// Returns `true` if granting `self` ends a hand-off run.
    ///
    /// A run of shared waiters may be granted together, whereas an exclusive waiter is always
    /// the last one granted.
    #[inline]
    pub(crate) const fn ends_run(self) -> bool {
        matches!(self, Opcode::Exclusive)
    }
}
