//! The step engine: a thread's data stack, namespace, checkpoints, and the
//! open/committing/aborting transaction lifecycle built over
//! [`crate::registers::Transaction`].
//!
//! Grounded structurally on the teacher's strand lifecycle bookkeeping in
//! `scheduler.rs` — a lock-free slot per live unit of work, atomic
//! lifecycle counters, `Once`-guarded global init — generalized here from
//! "strand alive/dead" to a step's OPEN/COMMITTING/ABORTING states. The
//! teacher's per-strand `bumpalo` arena, reset when a strand exits, becomes
//! a per-step arena here, reset on commit or abort instead.

pub mod checkpoint;
pub mod error;
pub mod step;

use crate::namespace::Namespace;
use crate::registers::{RegisterId, RegisterStore};
use checkpoint::CheckpointStack;
use error::ErrorFlags;
use glas_core::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Can be overridden via `GLAS_STEP_TIMEOUT_MS`; `0` disables the timeout.
const DEFAULT_STEP_TIMEOUT_MS: u64 = 0;

fn parse_timeout_ms(val: Option<String>) -> u64 {
    match val.as_deref() {
        Some("") | None => DEFAULT_STEP_TIMEOUT_MS,
        Some(s) => s.parse().unwrap_or(DEFAULT_STEP_TIMEOUT_MS),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Open,
    Committing,
    Aborting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attachment {
    Attached,
    Detached,
}

type CommitHook = Box<dyn FnOnce() + Send>;
type AbortHook = Box<dyn FnOnce() + Send>;

static THREAD_IDS: AtomicU64 = AtomicU64::new(0);

/// One logical thread of execution: a data stack plus stash, a namespace
/// chain, a checkpoint stack, and the bookkeeping needed to commit or abort
/// against the shared [`RegisterStore`].
pub struct Thread {
    id: u64,
    store: Arc<RegisterStore>,
    namespace: Arc<Namespace>,
    stack: Vec<Value>,
    stash: Vec<Value>,
    checkpoints: CheckpointStack,
    errors: ErrorFlags,
    phase: Phase,
    atomic_depth: u32,
    on_commit: Vec<CommitHook>,
    on_abort: Vec<AbortHook>,
    attachment: Attachment,
    debug_name: Option<String>,
    step_deadline: Option<Instant>,
    checkpoint_deadline: Option<Instant>,
    /// Scratch arena for transient, step-local allocation — reset on every
    /// commit/abort rather than held until the thread itself drops,
    /// mirroring the teacher's per-strand arena reset-on-exit discipline.
    arena: bumpalo::Bump,
}

impl Thread {
    pub fn new(store: Arc<RegisterStore>, namespace: Arc<Namespace>) -> Thread {
        Thread {
            id: THREAD_IDS.fetch_add(1, Ordering::Relaxed),
            store,
            namespace,
            stack: Vec::new(),
            stash: Vec::new(),
            checkpoints: CheckpointStack::new(),
            errors: ErrorFlags::empty(),
            phase: Phase::Open,
            atomic_depth: 0,
            on_commit: Vec::new(),
            on_abort: Vec::new(),
            attachment: Attachment::Attached,
            debug_name: None,
            step_deadline: None,
            checkpoint_deadline: None,
            arena: bumpalo::Bump::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_debug_name(&mut self, name: impl Into<String>) {
        self.debug_name = Some(name.into());
    }

    pub fn errors(&self) -> ErrorFlags {
        self.errors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn raise(&mut self, flags: ErrorFlags) {
        self.errors |= flags;
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic_depth > 0
    }

    pub fn enter_atomic(&mut self) {
        self.atomic_depth += 1;
    }

    pub fn exit_atomic(&mut self) {
        self.atomic_depth = self.atomic_depth.saturating_sub(1);
    }

    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Option<Value> {
        match self.stack.pop() {
            Some(v) => Some(v),
            None => {
                self.raise(ErrorFlags::ARITY);
                None
            }
        }
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Move `n` items between stack and stash, preserving their relative
    /// order. `n > 0` moves the top `n` stack items onto the stash; `n < 0`
    /// moves the top `|n|` stash items back onto the stack; `n == 0` is a
    /// no-op. Raises `ARITY` if fewer than the requested count are
    /// available on the source side.
    pub fn stash_transfer(&mut self, n: i32) {
        if n > 0 {
            let n = n as usize;
            if self.stack.len() < n {
                self.raise(ErrorFlags::ARITY);
                return;
            }
            let at = self.stack.len() - n;
            let moved = self.stack.split_off(at);
            self.stash.extend(moved);
        } else if n < 0 {
            let n = n.unsigned_abs() as usize;
            if self.stash.len() < n {
                self.raise(ErrorFlags::ARITY);
                return;
            }
            let at = self.stash.len() - n;
            let moved = self.stash.split_off(at);
            self.stack.extend(moved);
        }
    }

    /// Apply a compact stack-shuffle pattern `"<left>-<right>"` (e.g.
    /// `"abc-abcabc"`): pop one item per character of `left`, top of stack
    /// first, binding each to its single-character name; then push one
    /// value per character of `right`, left to right, from those bindings.
    /// A name may appear on the right as many times as needed, but a name
    /// bound to a linear value may appear at most once there. Raises
    /// `DATA_TYPE` for a malformed pattern (no `-`, or a left name repeated
    /// on the left), `ARITY` if the stack holds fewer items than `left`
    /// names, `NAME_UNDEF` if a right-hand name was never bound on the
    /// left, and `LINEARITY` if a linear binding is reused on the right.
    pub fn move_pattern(&mut self, pattern: &str) {
        let Some((left, right)) = pattern.split_once('-') else {
            self.raise(ErrorFlags::DATA_TYPE);
            return;
        };
        let mut left_names = std::collections::HashSet::new();
        if !left.chars().all(|c| left_names.insert(c)) {
            self.raise(ErrorFlags::DATA_TYPE);
            return;
        }
        if self.stack.len() < left.chars().count() {
            self.raise(ErrorFlags::ARITY);
            return;
        }
        let mut bound = std::collections::HashMap::new();
        for name in left.chars() {
            bound.insert(name, self.stack.pop().expect("length checked above"));
        }
        let mut linear_used = std::collections::HashSet::new();
        let mut produced = Vec::with_capacity(right.len());
        for name in right.chars() {
            let Some(v) = bound.get(&name) else {
                self.raise(ErrorFlags::NAME_UNDEF);
                return;
            };
            if v.is_linear() && !linear_used.insert(name) {
                self.raise(ErrorFlags::LINEARITY);
                return;
            }
            produced.push(v.clone());
        }
        self.stack.extend(produced);
    }

    /// Non-destructively read the top of the data stack as a signed
    /// integer no wider than `width_bits` (8, 16, 32, or 64). Raises
    /// `ARITY` on an empty stack and `DATA_TYPE` if the top isn't an
    /// integer encoding or its magnitude doesn't fit the requested width.
    pub fn peek_int(&mut self, width_bits: u32) -> Option<i64> {
        let Some(top) = self.stack.last() else {
            self.raise(ErrorFlags::ARITY);
            return None;
        };
        let Some(n) = top.to_i64() else {
            self.raise(ErrorFlags::DATA_TYPE);
            return None;
        };
        let fits = match width_bits {
            8 => i8::try_from(n).is_ok(),
            16 => i16::try_from(n).is_ok(),
            32 => i32::try_from(n).is_ok(),
            64 => true,
            _ => false,
        };
        if !fits {
            self.raise(ErrorFlags::DATA_TYPE);
            return None;
        }
        Some(n)
    }

    /// Scratch arena for allocation that does not need to outlive the
    /// current step. Reset on every commit and abort, never grown across
    /// a boundary that might never arrive.
    pub fn arena(&self) -> &bumpalo::Bump {
        &self.arena
    }

    pub fn set_namespace(&mut self, ns: Arc<Namespace>) {
        self.namespace = ns;
    }

    /// Register an action to run once this step (or the atomic section
    /// containing it) commits successfully, grouped into FIFO queues by the
    /// caller-supplied `queue` tag.
    pub fn on_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    /// Register an action to run if this step aborts, LIFO — the most
    /// recently registered hook runs first, mirroring how checkpoint-scoped
    /// cleanup should unwind.
    pub fn on_abort(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_abort.push(Box::new(hook));
    }

    pub fn checkpoint_push(&mut self) {
        self.checkpoints.push(&self.stack, &self.stash);
    }

    pub fn checkpoint_save(&mut self) -> Result<(), ThreadError> {
        self.checkpoints.save(&self.stack, &self.stash).map_err(ThreadError::Checkpoint)
    }

    pub fn checkpoint_drop(&mut self) -> Result<(), ThreadError> {
        self.checkpoints.drop_top().map_err(ThreadError::Checkpoint)
    }

    pub fn checkpoint_load(&mut self) -> Result<(), ThreadError> {
        let (stack, stash) = self.checkpoints.load().map_err(ThreadError::Checkpoint)?;
        self.stack = stack;
        self.stash = stash;
        Ok(())
    }

    pub fn step_timeout(&mut self) {
        let ms = parse_timeout_ms(std::env::var("GLAS_STEP_TIMEOUT_MS").ok());
        self.step_deadline = if ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(ms)) };
    }

    pub fn checkpoint_timeout(&mut self) {
        let ms = parse_timeout_ms(std::env::var("GLAS_CHECKPOINT_TIMEOUT_MS").ok());
        self.checkpoint_deadline = if ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(ms)) };
    }

    /// Best-effort: only checked at commit/abort boundaries, not preemptively.
    fn deadline_exceeded(&self) -> bool {
        self.step_deadline.is_some_and(|d| Instant::now() > d) || self.checkpoint_deadline.is_some_and(|d| Instant::now() > d)
    }

    pub fn detach(&mut self) {
        self.attachment = Attachment::Detached;
    }

    pub fn is_attached(&self) -> bool {
        self.attachment == Attachment::Attached
    }

    /// Open a register transaction for the current step.
    pub fn begin_registers(&self) -> crate::registers::Transaction<'_> {
        self.store.begin()
    }

    /// Commit the step: run the conflict check, apply writes, then run the
    /// commit hooks in registration order. On conflict the step returns to
    /// OPEN with `CONFLICT` raised and no hooks run.
    pub fn commit(&mut self, txn: crate::registers::Transaction<'_>) -> Result<(), ThreadError> {
        if self.errors.is_fatal() {
            return Err(ThreadError::Unrecoverable);
        }
        if self.is_atomic() {
            self.raise(ErrorFlags::ATOMICITY);
            txn.abort();
            tracing::debug!(thread = self.id, "commit refused: inside an atomic section");
            return Err(ThreadError::Atomicity);
        }
        if !self.errors.is_empty() {
            txn.abort();
            tracing::debug!(thread = self.id, errors = ?self.errors, "commit refused: pending errors");
            return Err(ThreadError::ErrorsPending);
        }
        self.phase = Phase::Committing;
        if self.deadline_exceeded() {
            tracing::warn!(thread = self.id, "step exceeded its timeout at commit");
        }
        match txn.commit() {
            Ok(()) => {
                self.phase = Phase::Open;
                for hook in self.on_commit.drain(..) {
                    hook();
                }
                self.on_abort.clear();
                self.arena.reset();
                tracing::debug!(thread = self.id, "commit");
                Ok(())
            }
            Err(crate::registers::RegisterError::Conflict) => {
                self.phase = Phase::Open;
                self.raise(ErrorFlags::CONFLICT);
                self.arena.reset();
                tracing::debug!(thread = self.id, "commit conflict");
                Err(ThreadError::Conflict)
            }
            Err(crate::registers::RegisterError::Underflow) => {
                self.phase = Phase::Open;
                self.raise(ErrorFlags::UNDERFLOW);
                self.arena.reset();
                Err(ThreadError::Underflow)
            }
        }
    }

    /// Abort the step: discard register writes and run abort hooks LIFO.
    pub fn abort(&mut self, txn: crate::registers::Transaction<'_>) {
        self.phase = Phase::Aborting;
        txn.abort();
        self.phase = Phase::Open;
        for hook in self.on_abort.drain(..).rev() {
            hook();
        }
        self.on_commit.clear();
        self.arena.reset();
        tracing::debug!(thread = self.id, "abort");
    }

    /// Tentatively fork this thread's state for a `choice` child or a
    /// pipeline stage: the clone shares nothing with the origin except the
    /// register store and namespace, so state changes on one side never
    /// leak to the other before a winner commits.
    pub fn fork(&self) -> Thread {
        Thread {
            id: THREAD_IDS.fetch_add(1, Ordering::Relaxed),
            store: self.store.clone(),
            namespace: self.namespace.clone(),
            stack: self.stack.clone(),
            stash: self.stash.clone(),
            checkpoints: CheckpointStack::new(),
            errors: ErrorFlags::empty(),
            phase: Phase::Open,
            atomic_depth: self.atomic_depth,
            on_commit: Vec::new(),
            on_abort: Vec::new(),
            attachment: Attachment::Attached,
            debug_name: self.debug_name.clone(),
            step_deadline: None,
            checkpoint_deadline: None,
            arena: bumpalo::Bump::new(),
        }
    }

    pub fn fresh_register(&self) -> RegisterId {
        self.store.fresh_register()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThreadError {
    #[error("thread is unrecoverable")]
    Unrecoverable,
    #[error("commit lost to a concurrent transaction")]
    Conflict,
    #[error("queue/bag underflow during commit")]
    Underflow,
    #[error("commit refused: thread is inside an atomic section")]
    Atomicity,
    #[error("commit refused: the error register is non-empty")]
    ErrorsPending,
    #[error(transparent)]
    Checkpoint(#[from] checkpoint::CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> Thread {
        Thread::new(Arc::new(RegisterStore::new()), Namespace::root())
    }

    #[test]
    fn fresh_thread_is_open_and_clean() {
        let t = thread();
        assert_eq!(t.phase(), Phase::Open);
        assert_eq!(t.errors(), ErrorFlags::empty());
    }

    #[test]
    fn pop_on_empty_stack_raises_arity() {
        let mut t = thread();
        assert!(t.pop().is_none());
        assert!(t.errors().contains(ErrorFlags::ARITY));
    }

    #[test]
    fn commit_runs_hooks_in_order() {
        let t = thread();
        let mut t = t;
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log2 = log.clone();
        t.on_commit(move || log2.lock().unwrap().push(1));
        let txn = t.begin_registers();
        t.commit(txn).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn abort_runs_hooks_lifo() {
        let mut t = thread();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        t.on_abort(move || l1.lock().unwrap().push(1));
        t.on_abort(move || l2.lock().unwrap().push(2));
        let txn = t.begin_registers();
        t.abort(txn);
        assert_eq!(*log.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn conflicting_commit_raises_conflict_and_stays_open() {
        let store = Arc::new(RegisterStore::new());
        let r = store.fresh_register();
        let mut t1 = Thread::new(store.clone(), Namespace::root());
        let mut t2 = Thread::new(store, Namespace::root());

        let mut txn1 = t1.begin_registers();
        txn1.set(&r, Value::from_u64(1));
        let mut txn2 = t2.begin_registers();
        txn2.set(&r, Value::from_u64(2));

        t1.commit(txn1).unwrap();
        let err = t2.commit(txn2).unwrap_err();
        assert_eq!(err, ThreadError::Conflict);
        assert_eq!(t2.phase(), Phase::Open);
        assert!(t2.errors().contains(ErrorFlags::CONFLICT));
    }

    #[test]
    fn checkpoint_round_trip() {
        let mut t = thread();
        t.push(Value::from_u64(1));
        t.checkpoint_push();
        t.push(Value::from_u64(2));
        t.checkpoint_load().unwrap();
        assert_eq!(t.pop(), Some(Value::from_u64(1)));
    }

    #[test]
    fn fork_copies_stack_but_not_hooks() {
        let mut t = thread();
        t.push(Value::from_u64(5));
        t.on_commit(|| {});
        let child = t.fork();
        assert_eq!(child.stack, vec![Value::from_u64(5)]);
        assert!(child.on_commit.is_empty());
    }

    #[test]
    fn commit_with_pending_error_is_refused() {
        let mut t = thread();
        t.raise(ErrorFlags::NAME_UNDEF);
        let txn = t.begin_registers();
        let err = t.commit(txn).unwrap_err();
        assert_eq!(err, ThreadError::ErrorsPending);
        assert_eq!(t.phase(), Phase::Open);
    }

    #[test]
    fn commit_inside_atomic_section_raises_atomicity() {
        let mut t = thread();
        t.enter_atomic();
        let txn = t.begin_registers();
        let err = t.commit(txn).unwrap_err();
        assert_eq!(err, ThreadError::Atomicity);
        assert!(t.errors().contains(ErrorFlags::ATOMICITY));
    }

    #[test]
    fn stash_transfer_round_trips_in_order() {
        let mut t = thread();
        t.push(Value::from_u64(1));
        t.push(Value::from_u64(2));
        t.push(Value::from_u64(3));
        t.stash_transfer(2);
        assert_eq!(t.stack, vec![Value::from_u64(1)]);
        assert_eq!(t.stash, vec![Value::from_u64(2), Value::from_u64(3)]);
        t.stash_transfer(-2);
        assert_eq!(t.stack, vec![Value::from_u64(1), Value::from_u64(2), Value::from_u64(3)]);
        assert!(t.stash.is_empty());
    }

    #[test]
    fn stash_transfer_underflow_raises_arity() {
        let mut t = thread();
        t.stash_transfer(1);
        assert!(t.errors().contains(ErrorFlags::ARITY));
    }

    #[test]
    fn move_pattern_reorders_and_duplicates() {
        let mut t = thread();
        t.push(Value::from_u64(1));
        t.push(Value::from_u64(2));
        t.push(Value::from_u64(3));
        t.move_pattern("abc-abcabc");
        // Left names bind top-of-stack first: a=3, b=2, c=1. Right then
        // produces that same sequence twice.
        assert_eq!(
            t.stack,
            vec![
                Value::from_u64(3),
                Value::from_u64(2),
                Value::from_u64(1),
                Value::from_u64(3),
                Value::from_u64(2),
                Value::from_u64(1),
            ]
        );
    }

    #[test]
    fn move_pattern_undefined_right_name_raises_name_undef() {
        let mut t = thread();
        t.push(Value::from_u64(1));
        t.move_pattern("a-z");
        assert!(t.errors().contains(ErrorFlags::NAME_UNDEF));
    }

    #[test]
    fn move_pattern_repeated_linear_name_raises_linearity() {
        let mut t = thread();
        let linear = Value::seal(glas_core::SealKey(1), Value::Leaf, true);
        t.push(linear);
        t.move_pattern("a-aa");
        assert!(t.errors().contains(ErrorFlags::LINEARITY));
    }

    #[test]
    fn peek_int_out_of_range_raises_data_type() {
        let mut t = thread();
        t.push(Value::from_u64(200));
        assert_eq!(t.peek_int(8), None);
        assert!(t.errors().contains(ErrorFlags::DATA_TYPE));
    }

    #[test]
    fn peek_int_in_range_is_nondestructive() {
        let mut t = thread();
        t.push(Value::from_u64(42));
        assert_eq!(t.peek_int(64), Some(42));
        assert_eq!(t.peek_int(64), Some(42));
        assert_eq!(t.stack.len(), 1);
    }

    #[test]
    fn arena_is_reset_on_commit() {
        let mut t = thread();
        t.arena().alloc(42u64);
        assert!(t.arena().allocated_bytes() > 0);
        let txn = t.begin_registers();
        t.commit(txn).unwrap();
        assert_eq!(t.arena().allocated_bytes(), 0);
    }
}
