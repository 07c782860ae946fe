//! Operations invoked by a front end.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::backup::{self, BackupInfo};
use crate::config::{with_config_mut, AppConfig};
use crate::download::USER_AGENT;
use crate::error::{AppError, Result};
use crate::fetcher::{spawn_fetch, FetchSettings, Fetcher};
use crate::remote::RemoteRepo;
use crate::update::{
    spawn_apply, ApplierSettings, CheckerSettings, InstalledVersion, SchedulerHandle,
    SchedulerSettings, UpdateApplier, UpdateChecker, UpdatePlan, UpdateScheduler, UpdateState,
};

pub struct AppState {
    pub fetcher: Arc<Fetcher>,
    pub checker: Arc<UpdateChecker>,
    pub applier: Arc<UpdateApplier>,
    config_path: PathBuf,
    scheduler: SchedulerSettings,
}

/// What the presentation layer receives from a fetch.
#[derive(Debug, Clone, Serialize)]
pub struct ServerListing {
    /// Canonical `C: host port user pass` lines.
    pub lines: Vec<String>,
    /// Set when no source produced a valid server.
    pub empty: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatus {
    pub installed_version: String,
    pub available: bool,
    pub state: UpdateState,
}

impl AppState {
    pub fn from_config(config: &AppConfig, config_path: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        let fetcher = Fetcher::new(
            client.clone(),
            config.sources.clone(),
            FetchSettings {
                request_timeout: config.request_timeout(),
                join_timeout: config.join_timeout(),
            },
        )?;

        let update = &config.update;
        let repo = RemoteRepo::new(update.repo_url.as_str()).with_proxy(update.github_proxy.as_str());
        let plan = UpdatePlan::new(update.files.iter().cloned())?;
        let installed_version = InstalledVersion::new(update.installed_version.as_str());

        let checker = UpdateChecker::new(
            client.clone(),
            repo.clone(),
            plan.clone(),
            installed_version.clone(),
            CheckerSettings {
                interval: update.check_interval(),
                version_timeout: update.version_timeout(),
                probe_timeout: update.probe_timeout(),
            },
        );

        let applier = UpdateApplier::new(
            client,
            repo,
            plan,
            installed_version,
            ApplierSettings {
                install_dir: update.install_dir.clone(),
                backups_dir: update.backups_dir.clone(),
                stale_extensions: update.stale_extensions.clone(),
                stale_dirs: update.stale_dirs.clone(),
                download_timeout: update.download_timeout(),
            },
        );

        Ok(Self {
            fetcher: Arc::new(fetcher),
            checker: Arc::new(checker),
            applier: Arc::new(applier),
            config_path,
            scheduler: SchedulerSettings {
                startup_delay: update.startup_delay(),
                poll_interval: update.poll_interval(),
            },
        })
    }

    pub async fn fetch_servers(&self) -> ServerListing {
        let records = match spawn_fetch(Arc::clone(&self.fetcher)).await {
            Ok(records) => records,
            Err(e) => {
                log::error!("Fetch task failed: {}", e);
                Vec::new()
            }
        };
        ServerListing {
            empty: records.is_empty(),
            lines: records.iter().map(ToString::to_string).collect(),
        }
    }

    pub async fn check_update(&self) -> UpdateStatus {
        let available = self.checker.check().await;
        UpdateStatus {
            installed_version: self.checker.installed_version(),
            available,
            state: self.checker.state(),
        }
    }

    /// Apply the update found by the last check. The caller obtains user
    /// confirmation first. On success the new version becomes the installed
    /// version for later checks and applies, and is written to the config.
    pub async fn install_update(&self) -> Result<bool> {
        let Some(pending) = self.checker.pending_update() else {
            return Err(AppError::update("No validated update is pending"));
        };

        let installed = match spawn_apply(Arc::clone(&self.applier)).await {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("Update task failed: {}", e);
                false
            }
        };
        if !installed {
            return Ok(false);
        }

        let version = pending.latest_version;
        self.checker.mark_installed(&version);
        with_config_mut(&self.config_path, move |config| {
            config.update.installed_version = version;
            Ok(())
        })?;
        Ok(true)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        backup::list_backups(&self.applier.settings().backups_dir)
    }

    pub fn restore_backup(&self, version: &str) -> Result<usize> {
        let settings = self.applier.settings();
        backup::restore_backup(&settings.backups_dir, &settings.install_dir, version)
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        UpdateScheduler::start(Arc::clone(&self.checker), self.scheduler)
    }
}
