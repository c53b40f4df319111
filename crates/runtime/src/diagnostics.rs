//! SIGQUIT diagnostics dump.
//!
//! Grounded on the teacher's `diagnostics.rs`/`watchdog.rs` pair: a
//! `Once`-guarded signal handler installed on first use, writing a
//! best-effort snapshot to stderr so a stuck production process can be
//! inspected without attaching a debugger. Generalized here from a strand
//! registry dump to the register-store/thread counters this runtime
//! actually tracks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

static INSTALL: Once = Once::new();
static OPEN_TRANSACTIONS: AtomicU64 = AtomicU64::new(0);
static COMMITS: AtomicU64 = AtomicU64::new(0);
static ABORTS: AtomicU64 = AtomicU64::new(0);
static CONFLICTS: AtomicU64 = AtomicU64::new(0);

pub fn record_open() {
    OPEN_TRANSACTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_commit() {
    OPEN_TRANSACTIONS.fetch_sub(1, Ordering::Relaxed);
    COMMITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_abort() {
    OPEN_TRANSACTIONS.fetch_sub(1, Ordering::Relaxed);
    ABORTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_conflict() {
    CONFLICTS.fetch_add(1, Ordering::Relaxed);
}

pub fn dump_diagnostics() {
    eprintln!(
        "glas-runtime diagnostics: open={} commits={} aborts={} conflicts={}",
        OPEN_TRANSACTIONS.load(Ordering::Relaxed),
        COMMITS.load(Ordering::Relaxed),
        ABORTS.load(Ordering::Relaxed),
        CONFLICTS.load(Ordering::Relaxed),
    );
}

#[cfg(all(unix, feature = "diagnostics"))]
pub fn install() {
    INSTALL.call_once(|| {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        if signal_hook::flag::register(signal_hook::consts::SIGQUIT, flag.clone()).is_ok() {
            std::thread::spawn(move || loop {
                std::thread::sleep(std::time::Duration::from_millis(200));
                if flag.swap(false, Ordering::Relaxed) {
                    dump_diagnostics();
                }
            });
        }
    });
}

#[cfg(not(all(unix, feature = "diagnostics")))]
pub fn install() {
    INSTALL.call_once(|| {});
}
