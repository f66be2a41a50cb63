use std::path::PathBuf;

use crate::error::{Error, Result};

/// User-local config directory for this tool, created on first use.
pub fn config_dir() -> Result<PathBuf> {
    user_dir(dirs::config_dir(), "config")
}

/// User-local cache directory for this tool, created on first use.
pub fn cache_dir() -> Result<PathBuf> {
    user_dir(dirs::cache_dir(), "cache")
}

fn user_dir(base: Option<PathBuf>, what: &str) -> Result<PathBuf> {
    let base = base.ok_or_else(|| Error::not_found(format!("user {what} directory not available")))?;
    let dir = base.join("zfs-rewind");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
