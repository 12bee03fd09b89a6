//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/sharetree/sharetree.toml`
//! 3. Local config: `<project_dir>/.sharetree.toml`
//! 4. Environment variables: `SHARETREE_*` prefix, `__` between nested keys

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

const ENV_PREFIX: &str = "SHARETREE";

/// Refresh cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between periodic refreshes; 0 disables the timer
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

/// Source scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Source set holding the `expect` declarations of a module
    pub common_source_set: String,
    /// Suffix identifying source sets under `src/` (e.g. `jvmMain`)
    pub source_set_suffix: String,
    /// File extensions scanned for declarations
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub ignore_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            common_source_set: "commonMain".into(),
            source_set_suffix: "Main".into(),
            extensions: vec!["kt".into()],
            ignore_dirs: vec![
                "build".into(),
                ".gradle".into(),
                ".git".into(),
                ".idea".into(),
                "node_modules".into(),
                "target".into(),
            ],
        }
    }
}

/// Unified configuration for sharetree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    /// Title of the tree root (default: project directory name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub refresh: RefreshConfig,
    pub scan: ScanConfig,
}

/// Get the XDG config directory for sharetree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sharetree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("sharetree.toml"))
}

/// Get the path to the local config file of a project.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".sharetree.toml")
}

impl Settings {
    /// Load settings for `project_dir` from all layers.
    pub fn load(project_dir: &Path) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), project_dir, None)
    }

    /// Load with an explicit global file and, optionally, an explicit
    /// environment instead of the process environment.
    pub fn load_from(
        global: Option<&Path>,
        project_dir: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let mut builder = Self::defaults()?;

        if let Some(global_path) = global {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path.to_path_buf()).required(false));
            }
        }

        let local_path = local_config_path(project_dir);
        if local_path.exists() {
            builder = builder.add_source(File::from(local_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scan.extensions")
                .with_list_parse_key("scan.ignore_dirs")
                .source(env),
        );

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ApplicationError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default("refresh.interval_secs", defaults.refresh.interval_secs)
            .map_err(config_err)?
            .set_default("scan.common_source_set", defaults.scan.common_source_set)
            .map_err(config_err)?
            .set_default("scan.source_set_suffix", defaults.scan.source_set_suffix)
            .map_err(config_err)?
            .set_default("scan.extensions", defaults.scan.extensions)
            .map_err(config_err)?
            .set_default("scan.ignore_dirs", defaults.scan.ignore_dirs)
            .map_err(config_err)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    /// Root title: the configured name, else the directory name.
    pub fn project_title(&self, project_dir: &Path) -> String {
        self.project_name.clone().unwrap_or_else(|| {
            project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| project_dir.display().to_string())
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# sharetree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/sharetree/sharetree.toml
#   Local:  <project_dir>/.sharetree.toml
#   Env:    SHARETREE_* environment variables, e.g. SHARETREE_REFRESH__INTERVAL_SECS=30

# Title of the tree root (defaults to the project directory name)
# project_name = "my-app"

[refresh]
# Seconds between periodic refreshes, 0 = manual refresh only
# interval_secs = 10

[scan]
# Source set holding the expect declarations
# common_source_set = "commonMain"

# Suffix of platform source sets searched for actual declarations
# source_set_suffix = "Main"

# File extensions to scan
# extensions = ["kt"]

# Directories never descended into
# ignore_dirs = ["build", ".gradle", ".git", ".idea", "node_modules", "target"]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
