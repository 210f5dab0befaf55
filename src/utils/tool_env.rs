//! Tool location: env var → .env in the input dir.

use log::debug;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

fn from_env(key: &str) -> Option<PathBuf> {
    let s = std::env::var(key).ok()?;
    let s = s.trim();
    (!s.is_empty()).then(|| PathBuf::from(s))
}

/// Look up the converter executable: `BALLOONPIPE_TOOL` from the environment, then from `.env` in `dir`.
pub fn tool_from_env(dir: &Path) -> Option<PathBuf> {
    let key = PackagePaths::get().tool_env_var();
    if let Some(p) = from_env(key) {
        debug!("Tool from environment: {}", p.display());
        return Some(p);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        if let Some(p) = from_env(key) {
            debug!("Tool from {}: {}", env_path.display(), p.display());
            return Some(p);
        }
    }
    None
}
