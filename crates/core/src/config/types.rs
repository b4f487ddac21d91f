use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::export::DEFAULT_MAX_BACKLINK_DEPTH;
use crate::rename::search::{DEFAULT_SEARCH_TIMEOUT, DEFAULT_SEARCH_TOOL};

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub vault_root: String,
    /// Folders to exclude from vault operations (relative to vault_root).
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    /// Globs of vault-relative paths to skip.
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { count: default_worker_count() }
    }
}

fn default_worker_count() -> usize {
    4
}

/// External content search used to narrow rename candidates.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchSettings {
    #[serde(default = "default_search_tool")]
    pub tool: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { tool: default_search_tool(), timeout_secs: default_search_timeout(), enabled: true }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_search_tool() -> String {
    DEFAULT_SEARCH_TOOL.to_string()
}

fn default_search_timeout() -> u64 {
    DEFAULT_SEARCH_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportSettings {
    #[serde(default = "default_max_depth")]
    pub max_backlink_depth: usize,
    /// Replaces the built-in attachment extension list when set.
    #[serde(default)]
    pub asset_extensions: Option<Vec<String>>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { max_backlink_depth: default_max_depth(), asset_extensions: None }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_BACKLINK_DEPTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub active_profile: String,
    pub vault_root: PathBuf,
    /// Folders to exclude from vault operations (resolved to absolute paths).
    pub excluded_folders: Vec<PathBuf>,
    pub ignore: Vec<String>,
    pub workers: usize,
    pub search: SearchSettings,
    pub export: ExportSettings,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    /// Settings for a vault at `root` with no config file.
    pub fn for_vault(root: PathBuf) -> Self {
        Self {
            active_profile: "default".to_string(),
            vault_root: root,
            excluded_folders: Vec::new(),
            ignore: Vec::new(),
            workers: default_worker_count(),
            search: SearchSettings::default(),
            export: ExportSettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn search_config(&self) -> crate::rename::SearchConfig {
        crate::rename::SearchConfig {
            tool: self.search.tool.clone(),
            timeout: self.search.timeout(),
            enabled: self.search.enabled,
        }
    }
}
