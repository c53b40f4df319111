//! The register access-mode conflict table.
//!
//! Two accesses to the same register, made from different concurrently-open
//! transactions, conflict — and force one of the transactions to abort at
//! commit — unless the table below says otherwise. `write` and `swap`
//! conflict with every access, including themselves, since both blindly
//! replace the committed value. Queue and bag access modes are deliberately
//! designed so that a read and a write of the same discipline do not
//! conflict: a queue-read only contends with the front of the queue, a
//! queue-write only with the back, and bag reads/writes never target the
//! same physical item by construction. Queue and bag disciplines never
//! legitimately mix on the same register, so a queue/bag cross-pair is
//! treated as a conflict rather than left undefined.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    Swap,
    QueueRead,
    QueueWrite,
    BagRead,
    BagWrite,
}

/// Whether two accesses to the same register, from different open
/// transactions, conflict. Exactly the table in spec.md §4.C.
pub fn conflicts(a: AccessMode, b: AccessMode) -> bool {
    use AccessMode::*;
    match (a, b) {
        (Write, _) | (_, Write) | (Swap, _) | (_, Swap) => true,

        (Read, Read) => false,
        (Read, QueueRead) | (QueueRead, Read) => true,
        (Read, QueueWrite) | (QueueWrite, Read) => false,
        (Read, BagRead) | (BagRead, Read) => true,
        (Read, BagWrite) | (BagWrite, Read) => false,

        (QueueRead, QueueRead) => true,
        (QueueRead, QueueWrite) | (QueueWrite, QueueRead) => false,
        (QueueWrite, QueueWrite) => false,

        // ok*: two bag-reads never logically conflict, but the store must
        // still guarantee they claim distinct physical items (registers.rs).
        (BagRead, BagRead) => false,
        (BagRead, BagWrite) | (BagWrite, BagRead) => false,
        (BagWrite, BagWrite) => false,

        (QueueRead, BagRead) | (BagRead, QueueRead) => true,
        (QueueRead, BagWrite) | (BagWrite, QueueRead) => true,
        (QueueWrite, BagRead) | (BagRead, QueueWrite) => true,
        (QueueWrite, BagWrite) | (BagWrite, QueueWrite) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AccessMode::*;

    #[test]
    fn plain_reads_never_conflict() {
        assert!(!conflicts(Read, Read));
    }

    #[test]
    fn plain_write_modes_conflict() {
        assert!(conflicts(Read, Write));
        assert!(conflicts(Write, Swap));
        assert!(conflicts(Write, Write));
        assert!(conflicts(Swap, Swap));
    }

    #[test]
    fn queue_read_write_do_not_conflict() {
        assert!(!conflicts(QueueRead, QueueWrite));
        assert!(!conflicts(QueueWrite, QueueRead));
    }

    #[test]
    fn queue_read_read_conflicts() {
        assert!(conflicts(QueueRead, QueueRead));
    }

    #[test]
    fn queue_write_write_does_not_conflict() {
        assert!(!conflicts(QueueWrite, QueueWrite));
    }

    #[test]
    fn bag_read_write_do_not_conflict() {
        assert!(!conflicts(BagRead, BagWrite));
    }

    #[test]
    fn bag_read_read_does_not_conflict() {
        assert!(!conflicts(BagRead, BagRead));
    }

    #[test]
    fn bag_write_write_does_not_conflict() {
        assert!(!conflicts(BagWrite, BagWrite));
    }

    #[test]
    fn read_does_not_conflict_with_queue_or_bag_write() {
        assert!(!conflicts(Read, QueueWrite));
        assert!(!conflicts(Read, BagWrite));
    }

    #[test]
    fn read_conflicts_with_queue_or_bag_read() {
        assert!(conflicts(Read, QueueRead));
        assert!(conflicts(Read, BagRead));
    }

    #[test]
    fn queue_and_bag_disciplines_always_conflict() {
        assert!(conflicts(QueueRead, BagRead));
        assert!(conflicts(QueueWrite, BagWrite));
        assert!(conflicts(QueueRead, BagWrite));
        assert!(conflicts(QueueWrite, BagRead));
    }
}
