//! Configuration loading for keepsake-ui.
//! Reads an optional TOML file from `--config` or the KEEPSAKE_UI_CONFIG env var;
//! command-line flags are applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use keepsake_store::ProjectOptions;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub const CONFIG_ENV: &str = "KEEPSAKE_UI_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_bind()    -> String { "0.0.0.0:8080".to_string() }
fn default_workers() -> usize  { 1 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), workers: default_workers() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub uri: Option<String>,
    #[serde(default = "default_daemon_timeout")]
    pub daemon_timeout_secs: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default)]
    pub debug: bool,
}

fn default_daemon_timeout()    -> u64 { 60 }
fn default_heartbeat_timeout() -> u64 { 30 }

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            uri: None,
            daemon_timeout_secs: default_daemon_timeout(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String { "keepsake=debug,info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}


impl Config {
    /// Load from an explicit path, else from KEEPSAKE_UI_CONFIG, else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Command-line flags win over file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.server.bind = bind.clone();
        }
        if let Some(workers) = cli.workers {
            self.server.workers = workers;
        }
        if let Some(uri) = &cli.repository {
            self.repository.uri = Some(uri.clone());
        }
        if cli.debug {
            self.repository.debug = true;
        }
    }

    pub fn repository_uri(&self) -> anyhow::Result<&str> {
        self.repository
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .context("No repository given: pass -r/--repository or set [repository] uri")
    }

    pub fn project_options(&self) -> ProjectOptions {
        ProjectOptions {
            daemon_timeout: Duration::from_secs(self.repository.daemon_timeout_secs),
            heartbeat_timeout: Duration::from_secs(self.repository.heartbeat_timeout_secs),
            debug: self.repository.debug,
        }
    }
}
