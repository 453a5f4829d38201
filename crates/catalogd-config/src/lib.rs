//! Configuration loading for catalogd.
//!
//! Provides hierarchical configuration loading from multiple sources, in
//! increasing order of precedence:
//! 1. Built-in defaults
//! 2. `~/.config/catalogd/config.toml` (user defaults)
//! 3. `catalogd.toml` (project config, tracked in VCS)
//! 4. `catalogd.local.toml` (local overrides, not tracked)
//! 5. `CATALOGD_*` environment variables (highest precedence)

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level catalogd configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub domains: DomainConfig,
    pub hosts: HostsConfig,
    pub gateway: GatewayConfig,
    pub dns: DnsConfig,
}

/// Connection settings for the catalog client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub address: String,
    pub token: Option<String>,
    pub datacenter: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            token: None,
            datacenter: "dc1".to_string(),
        }
    }
}

/// Domain suffixes appended to node and service names when a listener
/// needs a fully-qualified name (e.g. the hosts listener's public
/// subdomain, or the gateway listener's per-service `domain-name` meta).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub node: String,
    pub service: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            node: "node.internal".to_string(),
            service: "service.internal".to_string(),
        }
    }
}

/// Settings for the `/etc/hosts`-rendering listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    pub enabled: bool,
    pub file: PathBuf,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: PathBuf::from("/etc/hosts"),
        }
    }
}

/// Settings for the gateway (reverse-proxy config) listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    /// KV prefix holding per-service route template definitions.
    pub key_prefix: String,
    pub http_file: PathBuf,
    /// Shell command run after the rendered file changes, e.g. a reload.
    pub exec: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_prefix: "gateway/http".to_string(),
            http_file: PathBuf::from("/etc/gateway/conf.d/catalogd.conf"),
            exec: String::new(),
        }
    }
}

/// Settings for the DNS registrar reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub enabled: bool,
    pub registrar: RegistrarConfig,
    /// Domains to reconcile A records under.
    pub domains: Vec<String>,
    /// If true, compute the diff but never call the registrar.
    pub dry_run: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registrar: RegistrarConfig::default(),
            domains: Vec::new(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    pub api_key: String,
    pub secret_key: String,
}

impl Config {
    /// Loads configuration from the default locations.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Loads configuration rooted at a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }
}
