//! Remote version checks.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;

use super::{CheckPhase, InstalledVersion, UpdatePlan, UpdateState, VersionDescriptor};
use crate::download::{fetch_text, probe};
use crate::error::{AppError, Result};
use crate::remote::RemoteRepo;

#[derive(Debug, Clone, Copy)]
pub struct CheckerSettings {
    /// Minimum time between two successful checks.
    pub interval: Duration,
    pub version_timeout: Duration,
    pub probe_timeout: Duration,
}

pub struct UpdateChecker {
    client: Client,
    repo: RemoteRepo,
    plan: UpdatePlan,
    installed_version: InstalledVersion,
    settings: CheckerSettings,
    state: Mutex<UpdateState>,
}

impl UpdateChecker {
    pub fn new(
        client: Client,
        repo: RemoteRepo,
        plan: UpdatePlan,
        installed_version: impl Into<InstalledVersion>,
        settings: CheckerSettings,
    ) -> Self {
        Self {
            client,
            repo,
            plan,
            installed_version: installed_version.into(),
            settings,
            state: Mutex::new(UpdateState::default()),
        }
    }

    pub fn installed_version(&self) -> String {
        self.installed_version.get()
    }

    pub fn state(&self) -> UpdateState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The validated update found by the last check, if any.
    pub fn pending_update(&self) -> Option<VersionDescriptor> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.update_available().then(|| VersionDescriptor {
            latest_version: state.latest_version.clone(),
            changelog: state.changelog.clone(),
        })
    }

    /// Record `version` as installed. Later checks compare against it and a
    /// pending update for it is cleared.
    pub fn mark_installed(&self, version: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.installed_version.set(version);
        if state.phase == CheckPhase::Available && state.latest_version == version {
            state.phase = CheckPhase::Idle;
        }
    }

    /// Returns `true` only when a different remote version exists and every
    /// file of the update plan is reachable. Never fails; errors are logged
    /// and reported as "no update". A pending update survives a failed
    /// re-check and is only cleared by an equal remote version or
    /// [`mark_installed`](Self::mark_installed).
    pub async fn check(&self) -> bool {
        let Some(guard) = self.begin_check() else {
            return false;
        };
        let installed = self.installed_version.get();

        match self.run_check(&installed).await {
            // Installed while this check was in flight.
            Ok(Some(descriptor)) if descriptor.latest_version == self.installed_version.get() => {
                guard.finish(|state| state.phase = CheckPhase::Idle);
                false
            }
            Ok(Some(descriptor)) => {
                log::info!(
                    "Update available: {} -> {}",
                    installed,
                    descriptor.latest_version
                );
                guard.finish(|state| {
                    state.phase = CheckPhase::Available;
                    state.latest_version = descriptor.latest_version;
                    state.changelog = descriptor.changelog;
                    state.last_check = Some(Utc::now());
                });
                true
            }
            Ok(None) => {
                guard.finish(|state| state.phase = CheckPhase::Idle);
                false
            }
            Err(e) => {
                log::warn!("Update check error: {}", e);
                false
            }
        }
    }

    /// Move to `Checking` unless a check is in flight or the interval has
    /// not elapsed since the last successful check.
    fn begin_check(&self) -> Option<CheckGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.phase == CheckPhase::Checking {
            log::debug!("Update check already in progress");
            return None;
        }
        if let Some(last) = state.last_check {
            let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.settings.interval {
                log::debug!("Skipping update check, last check {:?} ago", elapsed);
                return None;
            }
        }
        let previous = state.phase;
        state.phase = CheckPhase::Checking;
        Some(CheckGuard {
            state: &self.state,
            previous,
            finished: false,
        })
    }

    async fn run_check(&self, installed: &str) -> Result<Option<VersionDescriptor>> {
        let url = self.repo.version_url();
        let payload = fetch_text(&self.client, &url, self.settings.version_timeout).await?;
        let descriptor = VersionDescriptor::parse(&payload)?;

        // Any difference counts, including an older remote version.
        if descriptor.latest_version == installed {
            log::debug!("Already on {}", installed);
            return Ok(None);
        }

        self.verify_remote_files().await?;
        Ok(Some(descriptor))
    }

    async fn verify_remote_files(&self) -> Result<()> {
        for file in self.plan.files() {
            let url = self.repo.file_url(file);
            probe(&self.client, &url, self.settings.probe_timeout)
                .await
                .map_err(|e| {
                    AppError::file_unreachable(file, e.detail("detail").unwrap_or_default())
                })?;
        }
        Ok(())
    }
}

/// Holds the `Checking` phase for one check. Dropping it without
/// [`finish`](Self::finish), on error or when the check future is cancelled,
/// restores the phase the check started from.
struct CheckGuard<'a> {
    state: &'a Mutex<UpdateState>,
    previous: CheckPhase,
    finished: bool,
}

impl CheckGuard<'_> {
    fn finish(mut self, update: impl FnOnce(&mut UpdateState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut state);
        self.finished = true;
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.phase == CheckPhase::Checking {
            state.phase = self.previous;
        }
    }
}
