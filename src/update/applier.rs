//! Backup → download-replace → verify → cleanup, with rollback.
//!
//! The protocol is best effort, not transactional. Downloads are staged next
//! to the install directory and renamed into place only after every file
//! arrived, but a crash during the renames can still leave a mixed file set.
//! The snapshot taken in the first step is the recovery path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use super::{InstalledVersion, UpdatePlan};
use crate::backup::{create_snapshot, restore_snapshot};
use crate::download::download_file;
use crate::error::{AppError, Result};
use crate::remote::RemoteRepo;

#[derive(Debug, Clone)]
pub struct ApplierSettings {
    pub install_dir: PathBuf,
    pub backups_dir: PathBuf,
    /// File extensions of compiled leftovers removed after an update.
    pub stale_extensions: Vec<String>,
    /// Directory names removed wholesale after an update.
    pub stale_dirs: Vec<String>,
    pub download_timeout: Duration,
}

pub struct UpdateApplier {
    client: Client,
    repo: RemoteRepo,
    plan: UpdatePlan,
    installed_version: InstalledVersion,
    settings: ApplierSettings,
    in_progress: Mutex<()>,
}

impl UpdateApplier {
    pub fn new(
        client: Client,
        repo: RemoteRepo,
        plan: UpdatePlan,
        installed_version: impl Into<InstalledVersion>,
        settings: ApplierSettings,
    ) -> Self {
        Self {
            client,
            repo,
            plan,
            installed_version: installed_version.into(),
            settings,
            in_progress: Mutex::new(()),
        }
    }

    /// Version whose files are snapshotted by the next apply.
    pub fn installed_version(&self) -> String {
        self.installed_version.get()
    }

    pub fn settings(&self) -> &ApplierSettings {
        &self.settings
    }

    /// Install the remote file set. Returns `false` on any failure; if the
    /// snapshot was taken, the install directory has been rolled back.
    pub async fn apply_update(&self) -> bool {
        let Ok(_guard) = self.in_progress.try_lock() else {
            log::warn!("An update is already in progress");
            return false;
        };

        if self.plan.is_empty() {
            log::info!("Update plan is empty, nothing to do");
            return true;
        }

        let backup_dir = match create_snapshot(
            &self.settings.install_dir,
            &self.settings.backups_dir,
            &self.installed_version.get(),
            &self.plan,
        ) {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("Backup failed, install left untouched: {}", e);
                return false;
            }
        };

        match self.replace_and_verify().await {
            Ok(()) => {
                log::info!("Update installed, previous files kept in {:?}", backup_dir);
                true
            }
            Err(e) => {
                log::error!("Update failed: {}", e);
                self.rollback(&backup_dir);
                false
            }
        }
    }

    async fn replace_and_verify(&self) -> Result<()> {
        self.download_replace().await?;
        self.verify_installed()?;
        self.cleanup_stale()
    }

    async fn download_replace(&self) -> Result<()> {
        let install_dir = &self.settings.install_dir;
        fs::create_dir_all(install_dir)
            .map_err(|e| AppError::update(format!("Failed to create install dir: {}", e)))?;

        let staging = tempfile::Builder::new()
            .prefix(".update-")
            .tempdir_in(install_dir)
            .map_err(|e| AppError::update(format!("Failed to create staging dir: {}", e)))?;

        for file in self.plan.files() {
            let url = self.repo.file_url(file);
            download_file(
                &self.client,
                &url,
                &staging.path().join(file),
                self.settings.download_timeout,
            )
            .await?;
            log::debug!("Downloaded {}", file);
        }

        for file in self.plan.files() {
            fs::rename(staging.path().join(file), install_dir.join(file))
                .map_err(|e| AppError::update(format!("Failed to replace {}: {}", file, e)))?;
        }

        Ok(())
    }

    fn verify_installed(&self) -> Result<()> {
        let missing: Vec<String> = self
            .plan
            .files()
            .iter()
            .filter(|f| !self.settings.install_dir.join(f).is_file())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::missing_after_update(&missing))
        }
    }

    /// Remove compiled leftovers of the previous version. Failing to remove a
    /// single entry is only logged.
    fn cleanup_stale(&self) -> Result<()> {
        let install_dir = &self.settings.install_dir;
        let mut iter = WalkDir::new(install_dir).into_iter();

        while let Some(entry) = iter.next() {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_dir() && self.is_stale_dir(&entry.file_name().to_string_lossy())
            {
                iter.skip_current_dir();
                if let Err(e) = fs::remove_dir_all(path) {
                    log::warn!("Failed to remove {:?}: {}", path, e);
                }
                continue;
            }

            if entry.file_type().is_file() && self.is_stale_file(install_dir, path) {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove stale file {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    fn is_stale_dir(&self, name: &str) -> bool {
        self.settings.stale_dirs.iter().any(|d| d == name)
    }

    fn is_stale_file(&self, install_dir: &Path, path: &Path) -> bool {
        let stale_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.settings.stale_extensions.iter().any(|s| s == ext))
            .unwrap_or(false);
        // Never delete a file that was just installed.
        stale_ext && !self.plan.files().iter().any(|f| install_dir.join(f) == path)
    }

    fn rollback(&self, backup_dir: &Path) {
        match restore_snapshot(backup_dir, &self.settings.install_dir) {
            Ok(restored) => log::info!("Rolled back {} files from {:?}", restored, backup_dir),
            Err(e) => log::error!("Rollback from {:?} failed: {}", backup_dir, e),
        }
    }
}
