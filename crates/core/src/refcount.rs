//! Opaque refcounted handles to host/foreign-owned buffers.
//!
//! A [`Refcount`] wraps a foreign object plus the two function pointers that
//! manage its lifetime, mirroring how [`Value`] elsewhere wraps only
//! self-describing data. The handle is always pre-incremented before it
//! crosses an API boundary into this crate's care, so acquiring one here
//! never itself calls `update`; only `clone` (increment) and `Drop`
//! (decrement) do.

use std::sync::atomic::{AtomicIsize, Ordering};

/// `incr` is `true` on acquire, `false` on release; the callback must be
/// safe to invoke from any thread, since values move freely between worker
/// threads. `None` marks a non-managed object: a bare pointer the host
/// handed over with no lifecycle to track.
pub type RefUpdate = unsafe extern "C" fn(obj: *mut std::ffi::c_void, incr: bool);

pub struct Refcount {
    update: Option<RefUpdate>,
    obj: *mut std::ffi::c_void,
    // Local duplicate of the external count, used only for debug assertions
    // and diagnostics dumps; the authoritative count lives with the host.
    local: AtomicIsize,
}

// The host guarantees `update` is safe to call concurrently from any thread;
// `obj` is never dereferenced here, only passed back opaquely.
unsafe impl Send for Refcount {}
unsafe impl Sync for Refcount {}

impl Refcount {
    /// Take ownership of an already-incremented handle.
    ///
    /// # Safety
    /// `obj` must remain valid for at least as long as this `Refcount` (and
    /// any of its clones) are alive, and `update` must accept being called
    /// from arbitrary threads, including concurrently.
    pub unsafe fn from_raw(update: Option<RefUpdate>, obj: *mut std::ffi::c_void) -> Self {
        Refcount { update, obj, local: AtomicIsize::new(1) }
    }

    /// Wrap a bare, non-managed pointer: no incref/decref ever fires.
    pub fn unmanaged(obj: *mut std::ffi::c_void) -> Self {
        Refcount { update: None, obj, local: AtomicIsize::new(1) }
    }

    pub fn as_ptr(&self) -> *mut std::ffi::c_void {
        self.obj
    }

    pub fn is_managed(&self) -> bool {
        self.update.is_some()
    }

    pub fn local_count(&self) -> isize {
        self.local.load(Ordering::Relaxed)
    }
}

impl Clone for Refcount {
    fn clone(&self) -> Self {
        self.local.fetch_add(1, Ordering::Relaxed);
        if let Some(update) = self.update {
            unsafe { update(self.obj, true) };
        }
        Refcount { update: self.update, obj: self.obj, local: AtomicIsize::new(self.local.load(Ordering::Relaxed)) }
    }
}

impl Drop for Refcount {
    fn drop(&mut self) {
        self.local.fetch_sub(1, Ordering::Relaxed);
        if let Some(update) = self.update {
            unsafe { update(self.obj, false) };
        }
    }
}

impl std::fmt::Debug for Refcount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refcount").field("obj", &self.obj).field("local", &self.local_count()).finish()
    }
}
