//! Register store: the one place runtime state lives outside a value on a
//! thread's own stack.
//!
//! Registers are never pessimistically locked while a transaction is open.
//! Reads and writes touch a transaction-local working copy; conflicts are
//! only detected against other concurrently open transactions' recorded
//! accesses, checked in one short critical section at commit time — the
//! optimistic-concurrency mechanism that is this whole engine's reason to
//! exist. Grounded on the teacher's `channel.rs` registry (global map keyed
//! by id, lazily populated, per-entry atomic bookkeeping) generalized from a
//! channel registry to a register-version registry.

use crate::conflict::{self, AccessMode};
use dashmap::DashMap;
use glas_core::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterId {
    /// Freshly allocated, process-unique register (gensym-style).
    Fresh(u64),
    /// A register associated with a pair of other register identities —
    /// the mechanism backing per-key child registers.
    AssociativePair(Box<RegisterId>, Box<RegisterId>),
    /// A register named within the global, host-visible namespace.
    Global(Vec<u8>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("concurrent access conflict")]
    Conflict,
    #[error("queue/bag underflow: requested more items than available")]
    Underflow,
}

struct RegisterEntry {
    value: Value,
    version: u64,
    open: Vec<(u64, AccessMode)>,
}

impl Default for RegisterEntry {
    fn default() -> Self {
        RegisterEntry { value: Value::Leaf, version: 0, open: Vec::new() }
    }
}

pub struct RegisterStore {
    fresh_counter: AtomicU64,
    txn_counter: AtomicU64,
    entries: DashMap<RegisterId, RegisterEntry>,
    commit_lock: Mutex<()>,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterStore {
    pub fn new() -> Self {
        RegisterStore {
            fresh_counter: AtomicU64::new(0),
            txn_counter: AtomicU64::new(0),
            entries: DashMap::new(),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn fresh_register(&self) -> RegisterId {
        RegisterId::Fresh(self.fresh_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn begin(&self) -> Transaction<'_> {
        let id = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        crate::diagnostics::record_open();
        Transaction { store: self, id, touched: HashMap::new() }
    }

    fn committed_value(&self, r: &RegisterId) -> Value {
        self.entries.entry(r.clone()).or_default().value.clone()
    }
}

struct Touched {
    mode: AccessMode,
    working: Value,
    /// Set on the first touch of a `BagRead`: how many items already
    /// claimed by other currently-open bag-readers this read must skip past
    /// to land on a physical item none of them has claimed. Consumed (taken)
    /// by the first `bag_read` call on this register within the
    /// transaction; later calls in the same transaction just take the head
    /// of their own already-shifted working copy.
    bag_offset: Option<usize>,
}

pub struct Transaction<'s> {
    store: &'s RegisterStore,
    id: u64,
    touched: HashMap<RegisterId, Touched>,
}

impl<'s> Transaction<'s> {
    fn touch(&mut self, r: &RegisterId, mode: AccessMode) -> &mut Touched {
        if !self.touched.contains_key(r) {
            let base = self.store.committed_value(r);
            let mut entry = self.store.entries.entry(r.clone()).or_default();
            // Computed and the open record pushed under the same entry
            // lock, so two transactions racing to touch the same register
            // as bag-readers still claim distinct offsets.
            let bag_offset = (mode == AccessMode::BagRead)
                .then(|| entry.open.iter().filter(|(_, m)| *m == AccessMode::BagRead).count());
            entry.open.push((self.id, mode));
            drop(entry);
            self.touched.insert(r.clone(), Touched { mode, working: base, bag_offset });
        } else {
            let entry = self.touched.get_mut(r).unwrap();
            if entry.mode != mode {
                entry.mode = escalate(entry.mode, mode);
                if let Some(mut e) = self.store.entries.get_mut(r) {
                    if let Some(rec) = e.open.iter_mut().find(|(id, _)| *id == self.id) {
                        rec.1 = entry.mode;
                    }
                }
            }
        }
        self.touched.get_mut(r).unwrap()
    }

    pub fn read(&mut self, r: &RegisterId) -> Value {
        self.touch(r, AccessMode::Read).working.clone()
    }

    pub fn set(&mut self, r: &RegisterId, v: Value) {
        self.touch(r, AccessMode::Write).working = v;
    }

    pub fn swap(&mut self, r: &RegisterId, v: Value) -> Value {
        let t = self.touch(r, AccessMode::Swap);
        std::mem::replace(&mut t.working, v)
    }

    /// Remove `n` items from the front of the queue; `Underflow` if fewer
    /// are present.
    pub fn queue_read(&mut self, r: &RegisterId, n: usize) -> Result<Value, RegisterError> {
        let t = self.touch(r, AccessMode::QueueRead);
        let (prefix, suffix) = glas_core::rope::split_at(&t.working, n);
        if glas_core::rope::length(&prefix) < n {
            return Err(RegisterError::Underflow);
        }
        t.working = suffix;
        Ok(prefix)
    }

    /// Undo a `queue_read`: push `items` back onto the front.
    pub fn queue_unread(&mut self, r: &RegisterId, items: Value) {
        let t = self.touch(r, AccessMode::QueueRead);
        t.working = glas_core::rope::append(&items, &t.working);
    }

    pub fn queue_write(&mut self, r: &RegisterId, items: Value) {
        let t = self.touch(r, AccessMode::QueueWrite);
        t.working = glas_core::rope::append(&t.working, &items);
    }

    /// Take one item from the bag, or `Underflow` if empty. Skips past any
    /// items already claimed by other concurrently open bag-readers, so N
    /// transactions bag-reading in parallel claim N distinct items rather
    /// than racing for the same head.
    pub fn bag_read(&mut self, r: &RegisterId) -> Result<Value, RegisterError> {
        let t = self.touch(r, AccessMode::BagRead);
        let offset = t.bag_offset.take().unwrap_or(0);
        let (claimed, remainder) = glas_core::rope::split_at(&t.working, offset);
        match glas_core::rope::uncons(&remainder) {
            Some((head, rest)) => {
                t.working = glas_core::rope::append(&claimed, &rest);
                Ok(head)
            }
            None => Err(RegisterError::Underflow),
        }
    }

    pub fn bag_write(&mut self, r: &RegisterId, item: Value) {
        let t = self.touch(r, AccessMode::BagWrite);
        t.working = glas_core::rope::append(&t.working, &glas_core::rope::singleton(item));
    }

    /// Validate against every other concurrently open transaction and, if
    /// clean, apply all staged writes atomically.
    pub fn commit(self) -> Result<(), RegisterError> {
        let _guard = self.store.commit_lock.lock().unwrap();
        for (r, t) in &self.touched {
            let entry = self.store.entries.get(r).expect("touched registers are always present");
            for (other_id, other_mode) in &entry.open {
                if *other_id != self.id && conflict::conflicts(t.mode, *other_mode) {
                    drop(entry);
                    self.release();
                    crate::diagnostics::record_conflict();
                    crate::diagnostics::record_abort();
                    return Err(RegisterError::Conflict);
                }
            }
        }
        for (r, t) in &self.touched {
            let mut entry = self.store.entries.get_mut(r).unwrap();
            entry.value = t.working.clone();
            entry.version += 1;
        }
        self.release();
        crate::diagnostics::record_commit();
        Ok(())
    }

    pub fn abort(self) {
        self.release();
        crate::diagnostics::record_abort();
    }

    fn release(&self) {
        for r in self.touched.keys() {
            if let Some(mut entry) = self.store.entries.get_mut(r) {
                entry.open.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

fn escalate(a: AccessMode, b: AccessMode) -> AccessMode {
    use AccessMode::*;
    match (a, b) {
        (Read, Write) | (Write, Read) | (Read, Swap) | (Swap, Read) | (Write, Swap) | (Swap, Write) => Swap,
        _ => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_of_unset_register_is_leaf() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut txn = store.begin();
        assert_eq!(txn.read(&r), Value::Leaf);
        txn.commit().unwrap();
    }

    #[test]
    fn write_then_read_in_new_transaction() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut t1 = store.begin();
        t1.set(&r, Value::from_u64(42));
        t1.commit().unwrap();

        let mut t2 = store.begin();
        assert_eq!(t2.read(&r), Value::from_u64(42));
        t2.commit().unwrap();
    }

    #[test]
    fn concurrent_writes_conflict() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut t1 = store.begin();
        let mut t2 = store.begin();
        t1.set(&r, Value::from_u64(1));
        t2.set(&r, Value::from_u64(2));
        t1.commit().unwrap();
        assert_eq!(t2.commit(), Err(RegisterError::Conflict));
    }

    #[test]
    fn concurrent_reads_do_not_conflict() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut t1 = store.begin();
        let mut t2 = store.begin();
        let _ = t1.read(&r);
        let _ = t2.read(&r);
        t1.commit().unwrap();
        t2.commit().unwrap();
    }

    #[test]
    fn queue_read_and_write_do_not_conflict_concurrently() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut seed = store.begin();
        seed.queue_write(&r, glas_core::rope::singleton(Value::from_u64(1)));
        seed.commit().unwrap();

        let mut reader = store.begin();
        let mut writer = store.begin();
        let item = reader.queue_read(&r, 1).unwrap();
        assert_eq!(glas_core::rope::length(&item), 1);
        writer.queue_write(&r, glas_core::rope::singleton(Value::from_u64(2)));
        reader.commit().unwrap();
        writer.commit().unwrap();
    }

    #[test]
    fn queue_underflow_errors() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut t = store.begin();
        assert_eq!(t.queue_read(&r, 3), Err(RegisterError::Underflow));
    }

    #[test]
    fn bag_read_bag_read_both_commit_with_distinct_items() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut seed = store.begin();
        seed.bag_write(&r, Value::from_u64(9));
        seed.bag_write(&r, Value::from_u64(10));
        seed.commit().unwrap();

        let mut t1 = store.begin();
        let mut t2 = store.begin();
        let a = t1.bag_read(&r).unwrap();
        let b = t2.bag_read(&r).unwrap();
        assert_ne!(a, b);
        t1.commit().unwrap();
        t2.commit().unwrap();
    }

    #[test]
    fn bag_read_underflows_once_all_items_are_claimed() {
        let store = RegisterStore::new();
        let r = store.fresh_register();
        let mut seed = store.begin();
        seed.bag_write(&r, Value::from_u64(9));
        seed.commit().unwrap();

        let mut t1 = store.begin();
        let mut t2 = store.begin();
        assert!(t1.bag_read(&r).is_ok());
        assert_eq!(t2.bag_read(&r), Err(RegisterError::Underflow));
    }
}
