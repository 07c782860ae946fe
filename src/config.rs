use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::{default_backups_dir, default_install_dir, ensure_parent_dir};

const DEFAULT_SOURCE: &str = "https://raw.githubusercontent.com/levi-45/free-cccam/main/servers.txt";
const DEFAULT_REPO: &str =
    "https://raw.githubusercontent.com/levi-45/free-cccam/main/Levi45FreeServer/";

/// Load the config from `path`, writing the defaults first if it does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let config = AppConfig::default();
        save_config_to(path, &config)?;
        return Ok(config);
    }
    let content = fs::read_to_string(path).map_err(|e| AppError::config(e.to_string()))?;
    toml::from_str(&content).map_err(|e| AppError::config(e.to_string()))
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    ensure_parent_dir(path)?;
    let content = toml::to_string_pretty(config).map_err(|e| AppError::config(e.to_string()))?;
    fs::write(path, content).map_err(|e| AppError::config(e.to_string()))
}

/// Execute a read-modify-write operation on the config file at `path`.
pub fn with_config_mut<F, T>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut AppConfig) -> Result<T>,
{
    let mut config = load_config_from(path)?;
    let result = f(&mut config)?;
    save_config_to(path, &config)?;
    Ok(result)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
    #[serde(default)]
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
    /// Optional GitHub proxy prefix wrapped around every repository URL.
    #[serde(default)]
    pub github_proxy: String,
    #[serde(default = "default_installed_version")]
    pub installed_version: String,
    #[serde(default = "default_plan_files")]
    pub files: Vec<String>,
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,
    #[serde(default = "default_stale_extensions")]
    pub stale_extensions: Vec<String>,
    #[serde(default = "default_stale_dirs")]
    pub stale_dirs: Vec<String>,
    #[serde(default = "default_true")]
    pub auto_check: bool,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,
    #[serde(default = "default_version_timeout")]
    pub version_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<String> {
    vec![DEFAULT_SOURCE.to_string()]
}

fn default_request_timeout() -> u64 {
    15
}

fn default_join_timeout() -> u64 {
    30
}

fn default_repo_url() -> String {
    DEFAULT_REPO.to_string()
}

fn default_installed_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_plan_files() -> Vec<String> {
    ["plugin.py", "ui.py", "downloader.py", "converter.py", "updater.py"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_stale_extensions() -> Vec<String> {
    vec!["pyc".to_string(), "pyo".to_string()]
}

fn default_stale_dirs() -> Vec<String> {
    vec!["__pycache__".to_string()]
}

fn default_check_interval() -> u64 {
    24 * 60 * 60
}

fn default_poll_interval() -> u64 {
    60 * 60
}

fn default_startup_delay() -> u64 {
    5
}

fn default_version_timeout() -> u64 {
    15
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            request_timeout_secs: default_request_timeout(),
            join_timeout_secs: default_join_timeout(),
            update: UpdateConfig::default(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            github_proxy: String::new(),
            installed_version: default_installed_version(),
            files: default_plan_files(),
            install_dir: default_install_dir(),
            backups_dir: default_backups_dir(),
            stale_extensions: default_stale_extensions(),
            stale_dirs: default_stale_dirs(),
            auto_check: true,
            check_interval_secs: default_check_interval(),
            poll_interval_secs: default_poll_interval(),
            startup_delay_secs: default_startup_delay(),
            version_timeout_secs: default_version_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl UpdateConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_secs(self.version_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
