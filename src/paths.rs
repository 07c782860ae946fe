//! Centralized path utilities for the application.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Name of the metadata file written into every backup snapshot.
pub const BACKUP_METADATA_FILE: &str = "backup.toml";

/// Get the root data directory for the application (~/.freeserver).
#[allow(clippy::expect_used)]
pub fn get_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot find home directory");
    home.join(".freeserver")
}

/// Get the path to the config file.
pub fn config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Default install location of the updatable file set.
pub fn default_install_dir() -> PathBuf {
    get_data_dir().join("install")
}

/// Default directory holding backup snapshots.
pub fn default_backups_dir() -> PathBuf {
    get_data_dir().join("backups")
}

/// Ensure the directory holding `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::io(e.to_string()))?;
    }
    Ok(())
}

/// Get the snapshot directory for a version (e.g., backups/backup_v1.1).
pub fn get_backup_dir(backups_dir: &Path, version: &str) -> PathBuf {
    backups_dir.join(format!("backup_v{}", version))
}

/// First unused snapshot directory for a version. Existing snapshots are
/// never reused; later ones get a `~N` suffix (e.g., backup_v1.1~2).
pub fn next_backup_dir(backups_dir: &Path, version: &str) -> PathBuf {
    let base = get_backup_dir(backups_dir, version);
    if !base.exists() {
        return base;
    }
    (2u32..)
        .map(|n| backups_dir.join(format!("backup_v{}~{}", version, n)))
        .find(|dir| !dir.exists())
        .unwrap_or(base)
}

/// Recover the version from a snapshot directory name.
pub fn version_from_backup_dir(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?.strip_prefix("backup_v")?;
    let version = match name.rsplit_once('~') {
        Some((version, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => version,
        _ => name,
    };
    (!version.is_empty()).then(|| version.to_string())
}
