use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::{next_backup_dir, version_from_backup_dir, BACKUP_METADATA_FILE};
use crate::update::UpdatePlan;
use crate::validation::validate_version_tag;

/// Backup metadata stored in backup.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub created_at: String,
    pub version: String,
    /// Plan files that existed and were copied into the snapshot.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub metadata: BackupMetadata,
}

/// Snapshot every plan file that currently exists in `install_dir`.
///
/// Snapshots are never overwritten or deleted here. A second snapshot of the
/// same version goes into a fresh sibling directory.
pub fn create_snapshot(
    install_dir: &Path,
    backups_dir: &Path,
    version: &str,
    plan: &UpdatePlan,
) -> Result<PathBuf> {
    validate_version_tag(version)?;

    fs::create_dir_all(backups_dir)
        .map_err(|e| AppError::backup(format!("Failed to create backups dir: {}", e)))?;
    let backup_dir = next_backup_dir(backups_dir, version);
    fs::create_dir(&backup_dir)
        .map_err(|e| AppError::backup(format!("Failed to create backup dir: {}", e)))?;

    let mut copied = Vec::new();
    for file in plan.files() {
        let src = install_dir.join(file);
        if !src.is_file() {
            continue;
        }
        fs::copy(&src, backup_dir.join(file))
            .map_err(|e| AppError::backup(format!("Failed to back up {}: {}", file, e)))?;
        copied.push(file.clone());
    }

    let metadata = BackupMetadata {
        created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        version: version.to_string(),
        files: copied,
    };
    let metadata_toml = toml::to_string_pretty(&metadata)
        .map_err(|e| AppError::backup(format!("Failed to serialize metadata: {}", e)))?;
    fs::write(backup_dir.join(BACKUP_METADATA_FILE), metadata_toml)
        .map_err(|e| AppError::backup(format!("Failed to write metadata: {}", e)))?;

    log::info!(
        "Backed up {} files to {:?}",
        metadata.files.len(),
        backup_dir
    );
    Ok(backup_dir)
}

/// Copy every file of a snapshot back over `install_dir`.
pub fn restore_snapshot(backup_dir: &Path, install_dir: &Path) -> Result<usize> {
    fs::create_dir_all(install_dir)
        .map_err(|e| AppError::backup(format!("Failed to create install dir: {}", e)))?;

    let mut restored = 0;
    for entry in fs::read_dir(backup_dir)
        .map_err(|e| AppError::backup(format!("Failed to read snapshot: {}", e)))?
    {
        let entry = entry.map_err(|e| AppError::backup(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name();
        if name == BACKUP_METADATA_FILE {
            continue;
        }

        fs::copy(&path, install_dir.join(&name))
            .map_err(|e| AppError::backup(format!("Failed to restore {:?}: {}", name, e)))?;
        restored += 1;
    }

    Ok(restored)
}

/// Manually restore the newest snapshot taken while `version` was installed.
pub fn restore_backup(backups_dir: &Path, install_dir: &Path, version: &str) -> Result<usize> {
    validate_version_tag(version)?;

    let Some(backup) = list_backups(backups_dir)?
        .into_iter()
        .find(|b| b.metadata.version == version)
    else {
        return Err(AppError::backup(format!("No backup for version {}", version)));
    };

    let restored = restore_snapshot(&backup.path, install_dir)?;
    log::info!("Restored {} files from {:?}", restored, backup.path);
    Ok(restored)
}

pub fn read_backup_metadata(backup_dir: &Path) -> Result<BackupMetadata> {
    let content = fs::read_to_string(backup_dir.join(BACKUP_METADATA_FILE))
        .map_err(|e| AppError::backup(format!("Failed to read metadata: {}", e)))?;
    toml::from_str(&content)
        .map_err(|e| AppError::backup(format!("Failed to parse metadata: {}", e)))
}

/// List all snapshots, newest first.
pub fn list_backups(backups_dir: &Path) -> Result<Vec<BackupInfo>> {
    if !backups_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();

    for entry in fs::read_dir(backups_dir)
        .map_err(|e| AppError::backup(format!("Failed to read backups dir: {}", e)))?
    {
        let entry = entry.map_err(|e| AppError::backup(e.to_string()))?;
        let path = entry.path();

        if !path.is_dir() || version_from_backup_dir(&path).is_none() {
            continue;
        }

        match read_backup_metadata(&path) {
            Ok(metadata) => backups.push(BackupInfo { path, metadata }),
            Err(e) => log::warn!("Skipping snapshot {:?}: {}", path, e),
        }
    }

    // Sort by created_at descending
    backups.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));

    Ok(backups)
}
