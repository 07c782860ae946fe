//! Self-update: version checks, backup/replace/rollback, and scheduling.

mod applier;
mod checker;
mod scheduler;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::validation::validate_plan_file;

pub use applier::{ApplierSettings, UpdateApplier};
pub use checker::{CheckerSettings, UpdateChecker};
pub use scheduler::{
    spawn_apply, wait_for_notice, SchedulerHandle, SchedulerSettings, UpdateNotice, UpdateScheduler,
};

/// Changelog used when the descriptor has no second line.
pub const DEFAULT_CHANGELOG: &str = "Bug fixes and improvements";

/// Parsed remote `version.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDescriptor {
    pub latest_version: String,
    pub changelog: String,
}

impl VersionDescriptor {
    /// Line 1 is the version, line 2 the optional changelog.
    pub fn parse(payload: &str) -> Result<Self> {
        let mut lines = payload.trim().lines().map(str::trim);
        let latest_version = lines
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::version_descriptor("empty version descriptor"))?
            .to_string();
        let changelog = lines
            .next()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CHANGELOG)
            .to_string();
        Ok(Self {
            latest_version,
            changelog,
        })
    }
}

/// The ordered file set that makes up one installable version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    files: Vec<String>,
}

impl UpdatePlan {
    pub fn new<I, S>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: Vec<String> = files.into_iter().map(Into::into).collect();
        for file in &files {
            validate_plan_file(file)?;
        }
        Ok(Self { files })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The currently installed version, shared by a checker and an applier so
/// both follow a completed install.
#[derive(Debug, Clone, Default)]
pub struct InstalledVersion(Arc<RwLock<String>>);

impl InstalledVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(version.into())))
    }

    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, version: impl Into<String>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = version.into();
    }
}

impl From<&str> for InstalledVersion {
    fn from(version: &str) -> Self {
        Self::new(version)
    }
}

impl From<String> for InstalledVersion {
    fn from(version: String) -> Self {
        Self::new(version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    Idle,
    Checking,
    Available,
}

/// Update state owned by one [`UpdateChecker`].
#[derive(Debug, Clone, Serialize)]
pub struct UpdateState {
    pub phase: CheckPhase,
    pub last_check: Option<DateTime<Utc>>,
    pub latest_version: String,
    pub changelog: String,
}

impl UpdateState {
    pub fn update_available(&self) -> bool {
        self.phase == CheckPhase::Available
    }
}

impl Default for UpdateState {
    fn default() -> Self {
        Self {
            phase: CheckPhase::Idle,
            last_check: None,
            latest_version: String::new(),
            changelog: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_with_changelog() {
        let d = VersionDescriptor::parse("1.2\nFixed parser\n").unwrap();
        assert_eq!(d.latest_version, "1.2");
        assert_eq!(d.changelog, "Fixed parser");
    }

    #[test]
    fn descriptor_without_changelog_uses_default() {
        let d = VersionDescriptor::parse("1.2\r\n").unwrap();
        assert_eq!(d.latest_version, "1.2");
        assert_eq!(d.changelog, DEFAULT_CHANGELOG);
    }

    #[test]
    fn empty_descriptor_is_rejected() {
        assert!(VersionDescriptor::parse("  \n\n").is_err());
    }

    #[test]
    fn plan_rejects_paths() {
        assert!(UpdatePlan::new(["plugin.py", "../evil.py"]).is_err());
        let plan = UpdatePlan::new(["plugin.py", "ui.py"]).unwrap();
        assert_eq!(plan.files(), ["plugin.py", "ui.py"]);
        assert!(UpdatePlan::new(Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn installed_version_is_shared_between_clones() {
        let version = InstalledVersion::from("1.1");
        let other = version.clone();
        other.set("1.2");
        assert_eq!(version.get(), "1.2");
    }
}
