use std::path::{Component, Path};

use crate::error::{AppError, Result};

/// Version strings end up in backup directory names, so only allow a
/// conservative character set.
pub fn validate_version_tag(version: &str) -> Result<()> {
    let is_safe = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));

    if !is_safe {
        return Err(AppError::backup(format!(
            "Unsafe version tag for backup directory: {:?}",
            version
        )));
    }

    Ok(())
}

/// Update plan entries must be bare file names inside the install directory.
pub fn validate_plan_file(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(AppError::config(format!("Invalid update file name: {:?}", name)));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(AppError::config(format!("Invalid update file name: {:?}", name))),
    }
}
