//! The per-thread error register: a monotone bitmask a step can only ever
//! add bits to. Once set, a bit is cleared only by a fresh `commit`/`abort`
//! cycle starting the next step clean — there is no `clear` operation a
//! program can call on itself.

use bitflags::bitflags;

bitflags! {
    /// Bits are grouped by how a host should react: transient bits suggest
    /// retrying the step from a checkpoint, data-semantic bits indicate a
    /// program logic error against the value model, and
    /// [`ErrorFlags::UNRECOVERABLE`] means the thread is dead and every
    /// other bit in the register is now just diagnostic context.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ErrorFlags: u32 {
        /// The thread cannot continue; any further operation is a no-op.
        const UNRECOVERABLE = 1 << 0;
        /// Commit lost an optimistic-concurrency race against another
        /// transaction and must retry.
        const CONFLICT      = 1 << 1;
        /// A `choice` loser or a `fork` whose origin aborted; the step is
        /// cooperatively cancelled.
        const UNCREATED      = 1 << 2;
        /// A resource quota (stack depth, step count, memory) was hit.
        const QUOTA          = 1 << 3;
        /// The host explicitly requested cancellation.
        const CLIENT         = 1 << 4;
        /// An operator was applied to operands of the wrong shape.
        const ERROR_OP       = 1 << 5;
        /// A linear (sealed, single-owner) value was used more than once.
        const LINEARITY      = 1 << 6;
        /// A sealed value was observed or operated on without unsealing.
        const DATA_SEALED    = 1 << 7;
        /// A namespace lookup resolved to nothing.
        const NAME_UNDEF     = 1 << 8;
        /// An ephemeral (host-owned, non-`Copy`) resource outlived its scope.
        const EPHEMERALITY   = 1 << 9;
        /// An operation not permitted inside (or outside) an atomic section.
        const ATOMICITY      = 1 << 10;
        /// A program `assert` failed.
        const ASSERT         = 1 << 11;
        /// A value had the wrong shape for the operator applied to it.
        const DATA_TYPE      = 1 << 12;
        /// A value had the wrong cardinality (arity mismatch on data).
        const DATA_QTY       = 1 << 13;
        /// A queue/bag read or pop requested more than was available.
        const UNDERFLOW      = 1 << 14;
        /// A stack operator expected more items than were present.
        const ARITY          = 1 << 15;
    }
}

impl ErrorFlags {
    /// Once set, the thread is dead: no further step can make progress.
    pub fn is_fatal(self) -> bool {
        self.contains(ErrorFlags::UNRECOVERABLE)
    }

    /// Suggests the step should simply be retried, not that the program is
    /// wrong: conflicts and cooperative cancellation.
    pub fn is_transient(self) -> bool {
        self.intersects(ErrorFlags::CONFLICT | ErrorFlags::UNCREATED)
    }

    /// Indicates the running program violated a value-model invariant
    /// rather than hitting a scheduling condition.
    pub fn is_data_semantic(self) -> bool {
        self.intersects(
            ErrorFlags::ERROR_OP
                | ErrorFlags::LINEARITY
                | ErrorFlags::DATA_SEALED
                | ErrorFlags::NAME_UNDEF
                | ErrorFlags::EPHEMERALITY
                | ErrorFlags::ATOMICITY
                | ErrorFlags::ASSERT
                | ErrorFlags::DATA_TYPE
                | ErrorFlags::DATA_QTY
                | ErrorFlags::UNDERFLOW
                | ErrorFlags::ARITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_register_has_no_category() {
        let f = ErrorFlags::empty();
        assert!(!f.is_fatal());
        assert!(!f.is_transient());
        assert!(!f.is_data_semantic());
    }

    #[test]
    fn conflict_is_transient_not_fatal() {
        let f = ErrorFlags::CONFLICT;
        assert!(f.is_transient());
        assert!(!f.is_fatal());
        assert!(!f.is_data_semantic());
    }

    #[test]
    fn unrecoverable_is_fatal() {
        assert!(ErrorFlags::UNRECOVERABLE.is_fatal());
    }

    #[test]
    fn bits_accumulate_monotonically() {
        let mut f = ErrorFlags::empty();
        f |= ErrorFlags::ASSERT;
        f |= ErrorFlags::CONFLICT;
        assert!(f.contains(ErrorFlags::ASSERT));
        assert!(f.contains(ErrorFlags::CONFLICT));
        assert!(f.is_data_semantic());
        assert!(f.is_transient());
    }

    #[test]
    fn data_semantic_bits_classified() {
        assert!(ErrorFlags::DATA_TYPE.is_data_semantic());
        assert!(ErrorFlags::UNDERFLOW.is_data_semantic());
        assert!(ErrorFlags::ARITY.is_data_semantic());
        assert!(!ErrorFlags::QUOTA.is_data_semantic());
    }
}
