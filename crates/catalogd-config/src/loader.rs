//! Configuration loader with multi-source merging

use crate::{Config, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with a builder-style API.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "CATALOGD".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads configuration from all sources with proper precedence.
    pub fn load(self) -> Result<Config> {
        let mut builder = config::Config::builder();

        let defaults = Config::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to build configuration")?;

        config
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(self) -> Config {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_when_no_files_present() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("failed to load config");

        assert_eq!(config.catalog.address, "127.0.0.1:8500");
        assert!(!config.gateway.enabled);
    }

    #[test]
    fn project_config_overrides_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("catalogd.toml"),
            r#"
[catalog]
address = "10.0.0.5:8500"
datacenter = "dc2"

[hosts]
enabled = false
"#,
        )
        .expect("failed to write project config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.catalog.address, "10.0.0.5:8500");
        assert_eq!(config.catalog.datacenter, "dc2");
        assert!(!config.hosts.enabled);
    }

    #[test]
    fn local_config_overrides_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("catalogd.toml"),
            "[catalog]\naddress = \"10.0.0.5:8500\"\n",
        )
        .expect("failed to write project config");

        fs::write(
            project_dir.join("catalogd.local.toml"),
            "[catalog]\naddress = \"127.0.0.1:8500\"\n",
        )
        .expect("failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.catalog.address, "127.0.0.1:8500");
    }

    #[test]
    fn load_or_default_never_panics_on_malformed_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();
        fs::write(project_dir.join("catalogd.toml"), "not valid toml {{{").unwrap();

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load_or_default();

        assert_eq!(config.catalog.address, "127.0.0.1:8500");
    }
}
