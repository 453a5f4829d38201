//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for catalogd.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("", "", "catalogd"),
        }
    }

    /// User config directory (`~/.config/catalogd/`).
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("failed to determine user config directory".to_string())
            })
    }

    /// User config file (`~/.config/catalogd/config.toml`).
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Project config file (`catalogd.toml`).
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("catalogd.toml")
    }

    /// Local override config file (`catalogd.local.toml`, not tracked in VCS).
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("catalogd.local.toml")
    }

    /// True if a project config file exists at `project_dir`.
    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn project_paths_are_named_after_catalogd() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_file = Paths::project_config_file(project_dir);
        assert_eq!(config_file, project_dir.join("catalogd.toml"));

        let local_file = Paths::local_config_file(project_dir);
        assert_eq!(local_file, project_dir.join("catalogd.local.toml"));

        assert!(!Paths::is_initialized(project_dir));
        std::fs::write(&config_file, "").unwrap();
        assert!(Paths::is_initialized(project_dir));
    }
}
