//! Default runtime configuration discovery and logging setup.
//!
//! Grounded on the teacher's `args.rs` env/argv reading pattern, adapted
//! from CLI flag parsing to locating a single config file by a fixed
//! search order: `$GLAS_CONF`, then a platform config directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Install a `tracing` subscriber reading its filter from `GLAS_LOG`
/// (falling back to `info` for this crate), mirroring the teacher's
/// `tracing_subscriber::fmt()` + `EnvFilter` setup in its LSP entry point.
/// Safe to call more than once — only the first call installs anything.
pub fn init_logging() {
    LOGGING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("GLAS_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("glas_runtime=info"));
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    });
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlasConfig {
    /// Mirrors into the namespace at `%env.*`, one entry per variable.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Resolve the config file path without touching the filesystem, so the
/// search order is independently testable: `$GLAS_CONF` if set, else
/// `$HOME/.config/glas/conf.glas` on Unix or `%AppData%\glas\conf.glas` on
/// Windows.
pub fn resolve_conf_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("GLAS_CONF") {
        if !explicit.is_empty() {
            return Some(PathBuf::from(explicit));
        }
    }
    if cfg!(windows) {
        std::env::var("AppData").ok().map(|appdata| PathBuf::from(appdata).join("glas").join("conf.glas"))
    } else {
        std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".config").join("glas").join("conf.glas"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no config path could be determined")]
    NoConfigPath,
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config as glas source: not yet supported by this runtime")]
    Unparseable,
}

/// Load the default config, or an empty one if no config file exists at the
/// resolved path — a missing config is not an error, an unreadable or
/// malformed one is.
pub fn init_default() -> Result<GlasConfig, InitError> {
    let Some(path) = resolve_conf_path() else { return Err(InitError::NoConfigPath) };
    if !path.exists() {
        return Ok(GlasConfig::default());
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| InitError::Read(path.clone(), e))?;
    toml::from_str(&raw).map_err(|_| InitError::Unparseable)
}
