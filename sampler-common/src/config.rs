//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a small TOML file. Everything has a
//! built-in default so the service starts with no file at all.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SAMPLER_ROOT_FOLDER";

/// Which Metadata Store adapter to run with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    #[default]
    Sqlite,
    /// Non-persistent, for local experiments
    Memory,
}

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and the sample tree
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database file (default: `<root>/sampler.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub metadata_backend: MetadataBackend,

    /// Upper bound for every single store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Extra preset definition files picked up by the startup sync
    #[serde(default)]
    pub seed_dir: Option<PathBuf>,

    /// Run the drift audit periodically when set
    #[serde(default)]
    pub audit_interval_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            host: default_host(),
            port: default_port(),
            metadata_backend: MetadataBackend::default(),
            store_timeout_ms: default_store_timeout_ms(),
            max_upload_bytes: default_max_upload_bytes(),
            seed_dir: None,
            audit_interval_secs: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the explicit file if given (it must exist), else the first
    /// platform config file found, else built-in defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// First existing config file: user config dir, then /etc
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("sampler").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/sampler/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sampler"))
        .unwrap_or_else(|| PathBuf::from("./sampler_data"))
}

/// Creates the root folder layout on startup
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding one subfolder per preset
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("presets")
    }

    /// Database file, unless the config names one explicitly
    pub fn database_path(&self, config: &TomlConfig) -> PathBuf {
        config
            .database_path
            .clone()
            .unwrap_or_else(|| self.root.join("sampler.db"))
    }

    /// Create the root and data folders if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        Ok(())
    }
}
