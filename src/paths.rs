//! Run-directory layout helpers (§5, §6). The original's directory
//! creation helper called `os.path.exists()` with no argument — a
//! `TypeError` waiting to happen — so every nested directory is created
//! with a single `create_dir_all` instead of walking path components by
//! hand.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

use crate::error::{AlertMagnetError, Result};

/// Ensures `path` (and any missing parents) exists.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| AlertMagnetError::filesystem(path.display().to_string(), e))
}

/// Lists immediate subdirectories of `directory_path`, sorted oldest
/// first by creation time (falling back to name order on platforms
/// without a reliable `created()` time).
fn run_directories(directory_path: &Path) -> Result<Vec<PathBuf>> {
    if !directory_path.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs: Vec<(PathBuf, SystemTime)> = std::fs::read_dir(directory_path)
        .map_err(|e| AlertMagnetError::filesystem(directory_path.display().to_string(), e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let created = e
                .metadata()
                .and_then(|m| m.created().or_else(|_| m.modified()))
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((e.path(), created))
        })
        .collect();

    dirs.sort_by_key(|(path, created)| (*created, path.clone()));
    Ok(dirs.into_iter().map(|(path, _)| path).collect())
}

/// Deletes every run directory under `directory_path` except the `keep`
/// most recently created ones (§5 "purges run directories older than
/// the last two").
pub fn purge_old_runs(directory_path: &Path, keep: usize) -> Result<()> {
    let dirs = run_directories(directory_path)?;
    if dirs.len() <= keep {
        return Ok(());
    }

    let to_remove = &dirs[..dirs.len() - keep];
    for dir in to_remove {
        info!(path = %dir.display(), "purging stale run directory");
        std::fs::remove_dir_all(dir)
            .map_err(|e| AlertMagnetError::filesystem(dir.display().to_string(), e))?;
    }
    Ok(())
}
