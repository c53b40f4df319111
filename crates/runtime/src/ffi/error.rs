//! Thread-local FFI error channel.
//!
//! The host-facing C API never panics across the FFI boundary or returns a
//! `Result`; instead a call fails by setting bits in the thread's error
//! register (see [`crate::thread::error`]) and, for calls that have no
//! natural place to report a human-readable string, by stashing one here.
//!
//! Note the pointer-lifetime warning on [`glas_last_error_message`]: it is
//! only valid until the next call into this channel on the same thread.

use std::cell::RefCell;
use std::ffi::CString;
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
    static ERROR_CSTRING: RefCell<Option<CString>> = const { RefCell::new(None) };
}

pub fn set_last_error(msg: impl Into<String>) {
    ERROR_CSTRING.with(|cs| *cs.borrow_mut() = None);
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg.into()));
}

pub fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

pub fn has_last_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
    ERROR_CSTRING.with(|e| *e.borrow_mut() = None);
}

pub fn format_panic_payload(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Check for a pending error message (FFI-safe).
#[unsafe(no_mangle)]
pub extern "C" fn glas_has_error() -> bool {
    has_last_error()
}

/// Get the last error message as a C string pointer.
///
/// Returns null if no error is pending.
///
/// # Pointer lifetime
/// The returned pointer is valid only until the next call to
/// `set_last_error`, `glas_last_error_message`, `glas_take_error_message`, or
/// `glas_clear_error`. Callers must copy the string immediately.
#[unsafe(no_mangle)]
pub extern "C" fn glas_last_error_message() -> *const i8 {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(msg) => cache_cstring(msg),
        None => ptr::null(),
    })
}

/// Take (and clear) the last error message as a C string.
#[unsafe(no_mangle)]
pub extern "C" fn glas_take_error_message() -> *const i8 {
    match take_last_error() {
        Some(msg) => cache_cstring(&msg),
        None => ptr::null(),
    }
}

fn cache_cstring(msg: &str) -> *const i8 {
    let safe_msg: String = msg.chars().map(|c| if c == '\0' { '?' } else { c }).collect();
    ERROR_CSTRING.with(|cs| {
        let cstring = CString::new(safe_msg).expect("null bytes already replaced");
        let ptr = cstring.as_ptr();
        *cs.borrow_mut() = Some(cstring);
        ptr
    })
}

/// Clear any pending error.
#[unsafe(no_mangle)]
pub extern "C" fn glas_clear_error() {
    clear_last_error();
}
