use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use ol_sync_core::engine::{DEFAULT_BASE_URL, DEFAULT_CONCURRENCY};
use ol_sync_core::root_folder::{DEFAULT_CONTAINER, DEFAULT_MONGO_CONTAINER};

const APP_DIR: &str = "overleaf-sync";

/// Where a configuration value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Flag,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::Flag => write!(f, "flag"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Replaces the value when a command-line flag was given.
    pub fn override_with(&mut self, flag: Option<T>) {
        if let Some(value) = flag {
            *self = Self::new(value, ConfigSource::Flag);
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub base_url: ConfigValue<String>,
    pub mongo_container: ConfigValue<String>,
    pub container: ConfigValue<String>,
    pub concurrency: ConfigValue<usize>,
    pub session_path: ConfigValue<PathBuf>,
    pub data_dir: ConfigValue<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Raw config file structure for deserialization
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    mongo_container: Option<String>,
    container: Option<String>,
    concurrency: Option<usize>,
    session_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let dir = Self::default_config_dir();
        Self {
            base_url: ConfigValue::new(DEFAULT_BASE_URL.to_string(), ConfigSource::Default),
            mongo_container: ConfigValue::new(
                DEFAULT_MONGO_CONTAINER.to_string(),
                ConfigSource::Default,
            ),
            container: ConfigValue::new(DEFAULT_CONTAINER.to_string(), ConfigSource::Default),
            concurrency: ConfigValue::new(DEFAULT_CONCURRENCY, ConfigSource::Default),
            session_path: ConfigValue::new(dir.join("session.json"), ConfigSource::Default),
            data_dir: ConfigValue::new(dir, ConfigSource::Default),
            config_file: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            // A file holding only comments parses as null
            let raw: serde_yaml::Value = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
            let file: ConfigFile = if raw.is_null() {
                ConfigFile::default()
            } else {
                serde_yaml::from_value(raw).map_err(|e| ConfigError::ParseError(path.clone(), e))?
            };
            let base = path.parent().unwrap_or(Path::new("."));

            if let Some(base_url) = file.base_url {
                config.base_url = ConfigValue::new(base_url, ConfigSource::File);
            }
            if let Some(mongo) = file.mongo_container {
                config.mongo_container = ConfigValue::new(mongo, ConfigSource::File);
            }
            if let Some(container) = file.container {
                config.container = ConfigValue::new(container, ConfigSource::File);
            }
            if let Some(concurrency) = file.concurrency {
                config.concurrency = ConfigValue::new(concurrency, ConfigSource::File);
            }
            if let Some(session_path) = file.session_path {
                config.session_path =
                    ConfigValue::new(resolve_relative(base, session_path), ConfigSource::File);
            }
            if let Some(data_dir) = file.data_dir {
                config.data_dir =
                    ConfigValue::new(resolve_relative(base, data_dir), ConfigSource::File);
            }
            config.config_file = Some(path);
        }

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = env("OVERLEAF_SYNC_BASE_URL") {
            config.base_url = ConfigValue::new(base_url, ConfigSource::Environment);
        }
        if let Some(mongo) = env("OVERLEAF_SYNC_MONGO_CONTAINER") {
            config.mongo_container = ConfigValue::new(mongo, ConfigSource::Environment);
        }
        if let Some(container) = env("OVERLEAF_SYNC_CONTAINER") {
            config.container = ConfigValue::new(container, ConfigSource::Environment);
        }
        if let Some(session_path) = env("OVERLEAF_SYNC_SESSION_PATH") {
            config.session_path =
                ConfigValue::new(PathBuf::from(session_path), ConfigSource::Environment);
        }
        if let Some(data_dir) = env("OVERLEAF_SYNC_DATA_DIR") {
            config.data_dir = ConfigValue::new(PathBuf::from(data_dir), ConfigSource::Environment);
        }

        Ok(config)
    }

    /// Default config directory: ~/.config/overleaf-sync
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Default config file path: ~/.config/overleaf-sync/config.yaml
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
