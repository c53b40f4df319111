//! The host-facing `thread*` procedural API: lifecycle, namespace, call,
//! integer data, registers, and step operations over opaque `u64` handles.
//!
//! Handles are `u64` ids into a process-global registry rather than raw
//! pointers, the same indirection the teacher uses for its channel and
//! stack handles in `channel.rs`/`stack.rs` (`AtomicU64` id generator plus
//! a lock-guarded map) — it keeps the C surface free of pointer-lifetime
//! rules beyond "the id is valid until `glas_thread_exit`."
//!
//! Every function here is infallible at the ABI boundary: failures set the
//! calling thread's error register (readable via `glas_thread_errors`) or,
//! for calls with no thread context yet, the FFI error channel in
//! [`crate::ffi::error`]. Nothing panics across the boundary.

use crate::namespace::Namespace;
use crate::registers::RegisterStore;
use crate::thread::error::ErrorFlags;
use crate::thread::Thread;
use dashmap::DashMap;
use glas_core::Value;
use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static DashMap<u64, Mutex<Thread>> {
    static REGISTRY: OnceLock<DashMap<u64, Mutex<Thread>>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

fn shared_store() -> &'static Arc<RegisterStore> {
    static STORE: OnceLock<Arc<RegisterStore>> = OnceLock::new();
    STORE.get_or_init(|| Arc::new(RegisterStore::new()))
}

/// # Safety
/// `name` must be null or point to a valid, null-terminated, NUL-free byte
/// string (per the procedural API's naming convention).
unsafe fn read_name(name: *const c_char) -> Option<Vec<u8>> {
    if name.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(name) }.to_bytes().to_vec())
}

fn with_thread<R>(id: u64, f: impl FnOnce(&mut Thread) -> R) -> Option<R> {
    registry().get(&id).map(|entry| f(&mut entry.lock().unwrap()))
}

/// Create a fresh thread rooted at the shared default namespace. Returns a
/// handle, or `0` (never a valid handle, since ids start at 1) on failure.
#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_new() -> u64 {
    let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    let thread = Thread::new(shared_store().clone(), Namespace::root());
    registry().insert(id, Mutex::new(thread));
    id
}

/// Fork an existing thread's visible state into a fresh handle. Returns `0`
/// if `handle` is not a live thread.
#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_fork(handle: u64) -> u64 {
    let forked = match with_thread(handle, |t| t.fork()) {
        Some(t) => t,
        None => {
            super::error::set_last_error("glas_thread_fork: unknown thread handle");
            return 0;
        }
    };
    let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    registry().insert(id, Mutex::new(forked));
    id
}

/// Fork, then immediately detach the new handle (for fire-and-forget
/// background work that never reports back through `commit`).
#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_fork_detached(handle: u64) -> u64 {
    let id = glas_thread_fork(handle);
    if id != 0 {
        glas_thread_detach(id);
    }
    id
}

/// Retire a thread handle. Idempotent: exiting an unknown handle is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_exit(handle: u64) {
    registry().remove(&handle);
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_detach(handle: u64) {
    with_thread(handle, |t| t.detach());
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_is_attached(handle: u64) -> bool {
    with_thread(handle, |t| t.is_attached()).unwrap_or(false)
}

/// # Safety
/// `name` must be null or a valid, NUL-free, null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_set_debug_name(handle: u64, name: *const c_char) {
    let Some(bytes) = (unsafe { read_name(name) }) else { return };
    let name = String::from_utf8_lossy(&bytes).into_owned();
    with_thread(handle, |t| t.set_debug_name(name));
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_errors(handle: u64) -> u32 {
    with_thread(handle, |t| t.errors().bits()).unwrap_or(ErrorFlags::UNRECOVERABLE.bits())
}

// --- namespace: data definitions ------------------------------------------

/// Bind `name` to the integer value `data` in `handle`'s namespace. No-op
/// (silently) on an unknown handle or an unreadable name.
///
/// # Safety
/// `name` must be a valid, NUL-free, null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_def_int(handle: u64, name: *const c_char, data: i64) {
    let Some(bytes) = (unsafe { read_name(name) }) else { return };
    with_thread(handle, |t| {
        let ns = t.namespace().ns_data_def(bytes, Value::from_i64(data));
        t.set_namespace(ns);
    });
}

// --- call ------------------------------------------------------------------

/// # Safety
/// `name` must be a valid, NUL-free, null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_call(handle: u64, name: *const c_char) -> bool {
    let Some(bytes) = (unsafe { read_name(name) }) else {
        super::error::set_last_error("glas_thread_call: null name");
        return false;
    };
    match with_thread(handle, |t| {
        crate::thread::step::call(t, &bytes);
        t.errors().is_empty()
    }) {
        Some(ok) => ok,
        None => {
            super::error::set_last_error("glas_thread_call: unknown thread handle");
            false
        }
    }
}

// --- data stack: integers ----------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_push_int(handle: u64, value: i64) {
    with_thread(handle, |t| t.push(Value::from_i64(value)));
}

/// Pop the top of `handle`'s data stack as an integer, writing it to `*out`
/// and returning `true` on success. Returns `false` (leaving `*out`
/// untouched) if the stack is empty or the top value isn't an integer.
///
/// # Safety
/// `out` must point to a valid, writable `i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_pop_int(handle: u64, out: *mut i64) -> bool {
    if out.is_null() {
        return false;
    }
    let popped = with_thread(handle, |t| t.pop().and_then(|v| v.to_i64()));
    match popped.flatten() {
        Some(n) => {
            unsafe { *out = n };
            true
        }
        None => false,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_stash_transfer(handle: u64, n: i32) {
    with_thread(handle, |t| t.stash_transfer(n));
}

/// # Safety
/// `pattern` must be a valid, NUL-free, null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_move_pattern(handle: u64, pattern: *const c_char) {
    let Some(bytes) = (unsafe { read_name(pattern) }) else { return };
    let Ok(pattern) = std::str::from_utf8(&bytes) else {
        super::error::set_last_error("glas_thread_move_pattern: pattern is not valid UTF-8");
        return;
    };
    with_thread(handle, |t| t.move_pattern(pattern));
}

/// Non-destructively read the top of `handle`'s data stack as a signed
/// integer no wider than `width_bits`, writing it to `*out` and returning
/// `true` on success.
///
/// # Safety
/// `out` must point to a valid, writable `i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn glas_thread_peek_int(handle: u64, width_bits: u32, out: *mut i64) -> bool {
    if out.is_null() {
        return false;
    }
    match with_thread(handle, |t| t.peek_int(width_bits)) {
        Some(Some(n)) => {
            unsafe { *out = n };
            true
        }
        _ => false,
    }
}

// --- step: commit / abort / checkpoints -------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_commit(handle: u64) -> bool {
    with_thread(handle, |t| {
        let txn = t.begin_registers();
        t.commit(txn).is_ok()
    })
    .unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_abort(handle: u64) {
    with_thread(handle, |t| {
        let txn = t.begin_registers();
        t.abort(txn);
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_checkpoint_push(handle: u64) {
    with_thread(handle, |t| t.checkpoint_push());
}

#[unsafe(no_mangle)]
pub extern "C" fn glas_thread_checkpoint_load(handle: u64) -> bool {
    with_thread(handle, |t| t.checkpoint_load().is_ok()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn lifecycle_round_trip() {
        let h = glas_thread_new();
        assert!(h != 0);
        assert!(glas_thread_is_attached(h));
        glas_thread_exit(h);
        assert!(!glas_thread_is_attached(h));
    }

    #[test]
    fn push_pop_int_round_trips() {
        let h = glas_thread_new();
        glas_thread_push_int(h, 42);
        let mut out: i64 = 0;
        assert!(unsafe { glas_thread_pop_int(h, &mut out) });
        assert_eq!(out, 42);
        glas_thread_exit(h);
    }

    #[test]
    fn pop_on_empty_stack_fails_without_panicking() {
        let h = glas_thread_new();
        let mut out: i64 = 0;
        assert!(!unsafe { glas_thread_pop_int(h, &mut out) });
        assert!(glas_thread_errors(h) & ErrorFlags::ARITY.bits() != 0);
        glas_thread_exit(h);
    }

    #[test]
    fn calling_a_data_def_pushes_a_copy() {
        let h = glas_thread_new();
        let name = CString::new("k").unwrap();
        unsafe { glas_thread_def_int(h, name.as_ptr(), 7) };
        glas_thread_push_int(h, 1);
        assert!(unsafe { glas_thread_call(h, name.as_ptr()) });
        let mut out: i64 = 0;
        assert!(unsafe { glas_thread_pop_int(h, &mut out) });
        assert_eq!(out, 7);
        assert!(unsafe { glas_thread_pop_int(h, &mut out) });
        assert_eq!(out, 1);
        glas_thread_exit(h);
    }

    #[test]
    fn callback_def_call_succeeds() {
        let h = glas_thread_new();
        with_thread(h, |t| {
            let ns = t.namespace().ns_cb_def(b"k".to_vec(), crate::namespace::ast::Ast::data(Value::from_i64(99)));
            t.set_namespace(ns);
        });
        glas_thread_push_int(h, 1);
        let name = CString::new("k").unwrap();
        assert!(unsafe { glas_thread_call(h, name.as_ptr()) });
        glas_thread_exit(h);
    }

    #[test]
    fn stash_transfer_and_move_pattern_round_trip() {
        let h = glas_thread_new();
        glas_thread_push_int(h, 1);
        glas_thread_push_int(h, 2);
        glas_thread_stash_transfer(h, 1);
        glas_thread_stash_transfer(h, -1);
        let name = CString::new("ab-abab").unwrap();
        unsafe { glas_thread_move_pattern(h, name.as_ptr()) };
        let mut out: i64 = 0;
        assert!(unsafe { glas_thread_pop_int(h, &mut out) });
        assert_eq!(out, 1);
        glas_thread_exit(h);
    }

    #[test]
    fn peek_int_respects_requested_width() {
        let h = glas_thread_new();
        glas_thread_push_int(h, 200);
        let mut out: i64 = 0;
        assert!(!unsafe { glas_thread_peek_int(h, 8, &mut out) });
        assert!(unsafe { glas_thread_peek_int(h, 64, &mut out) });
        assert_eq!(out, 200);
        glas_thread_exit(h);
    }

    #[test]
    fn commit_with_no_registers_succeeds() {
        let h = glas_thread_new();
        assert!(glas_thread_commit(h));
        glas_thread_exit(h);
    }

    #[test]
    fn unknown_handle_operations_are_inert() {
        assert!(!glas_thread_is_attached(999_999));
        assert!(!glas_thread_commit(999_999));
        assert_eq!(glas_thread_fork(999_999), 0);
    }
}
