//! Binary loading and the virtual filesystem intercept hook.
//!
//! Grounded on the teacher's `file.rs` stack-based file-slurp operations,
//! reduced here to the one operation the runtime core actually needs: read
//! a whole binary resource given a URI. Everything above that (module
//! resolution, front-end compilation) is out of scope for this crate.
//!
//! The actual read goes through raw `libc` file-descriptor calls on Unix,
//! the same fd-level style the teacher uses for its own stdout writes in
//! `io.rs`, rather than through `std::fs::read`'s buffered path.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

#[cfg(unix)]
fn read_whole_file(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains a nul byte"))?;

    // SAFETY: c_path is a valid, nul-terminated C string for the duration of
    // the call; fd is checked for -1 before any further libc calls use it.
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        // SAFETY: fd is open and owned by this call; chunk is a valid
        // writable buffer of the given length.
        let n = unsafe { libc::read(fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len()) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n as usize]);
    }
    unsafe { libc::close(fd) };
    Ok(buf)
}

#[cfg(not(unix))]
fn read_whole_file(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

/// The default loader: `file://` URIs and bare paths resolve to a direct
/// filesystem read. No other scheme is understood at this layer — a host
/// wanting `https://` or an in-memory package store installs a
/// [`LoaderIntercept`] instead of extending this function.
pub fn rt_load_binary_default(uri: &str) -> Result<Vec<u8>, LoadError> {
    let path = match uri.strip_prefix("file://") {
        Some(rest) => Path::new(rest),
        None if uri.contains("://") => {
            let scheme = uri.split("://").next().unwrap_or(uri);
            return Err(LoadError::UnsupportedScheme(scheme.to_string()));
        }
        None => Path::new(uri),
    };
    read_whole_file(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}

/// A host-supplied virtual filesystem layer. `virtualize_path` lets a host
/// rewrite a relative reference before it's resolved against the calling
/// module's own location (so a module loaded from a virtual root keeps
/// resolving its own relative imports against that root); `try_load_binary`
/// is given first refusal on every load and falls back to
/// [`rt_load_binary_default`] by returning `None`.
pub trait LoaderIntercept: Send + Sync {
    fn virtualize_path(&self, base: &str, relative: &str) -> String {
        let _ = base;
        relative.to_string()
    }

    fn try_load_binary(&self, uri: &str) -> Option<Result<Vec<u8>, LoadError>> {
        let _ = uri;
        None
    }
}

/// The identity intercept: defers everything to [`rt_load_binary_default`].
pub struct PassthroughLoader;

impl LoaderIntercept for PassthroughLoader {}

pub fn rt_loader_intercept(vfs: &dyn LoaderIntercept, uri: &str) -> Result<Vec<u8>, LoadError> {
    match vfs.try_load_binary(uri) {
        Some(result) => result,
        None => rt_load_binary_default(uri),
    }
}
