//! Configuration resolution for jwtdeck.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`~/.jwtdeck/settings.json`)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::claims::DEFAULT_LIFETIME_SECS;
use crate::error::{Error, Result};
use crate::history::DEFAULT_MAX_ENTRIES;
use crate::settings::FileStorage;
use crate::token::Algorithm;

/// Complete jwtdeck configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            history: HistoryConfig::default(),
            signing: SigningConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where persisted settings live. `None` means `~/.jwtdeck/`.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Algorithm assumed for verification when a token has none loaded.
    pub default_algorithm: Algorithm,
    /// Lifetime used when suggesting an `exp` claim.
    pub suggested_lifetime_secs: i64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            default_algorithm: Algorithm::HS256,
            suggested_lifetime_secs: DEFAULT_LIFETIME_SECS,
        }
    }
}

impl Config {
    /// Reject values the engine cannot use.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.history.max_entries == 0 {
            return Err("history.max_entries must be at least 1".into());
        }
        if self.signing.suggested_lifetime_secs <= 0 {
            return Err(format!(
                "signing.suggested_lifetime_secs must be positive, got {}",
                self.signing.suggested_lifetime_secs
            ));
        }
        Ok(())
    }

    /// Resolved data directory, falling back to `~/.jwtdeck/`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        self.storage
            .data_dir
            .clone()
            .or_else(FileStorage::default_dir)
            .ok_or_else(|| Error::Config("Cannot determine home directory".into()))
    }
}

/// Load configuration: defaults, then the global file, then environment.
pub fn load_config() -> Result<Config> {
    let mut config = match global_config_path() {
        Some(path) if path.exists() => load_config_file(&path)?,
        _ => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Path of the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    FileStorage::default_dir().map(|d| d.join("settings.json"))
}

/// Read a config file. Missing sections take their defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    config.validate().map_err(|reason| {
        Error::Config(format!("Invalid config file {}: {}", path.display(), reason))
    })?;
    Ok(config)
}

/// Apply `JWTDECK_*` overrides. Unparseable values are ignored with a warning.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("JWTDECK_DATA_DIR") {
        config.storage.data_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = var("JWTDECK_HISTORY_LIMIT") {
        match val.parse::<usize>() {
            Ok(n) if n > 0 => config.history.max_entries = n,
            _ => tracing::warn!(value = %val, "ignoring invalid JWTDECK_HISTORY_LIMIT"),
        }
    }
    if let Some(val) = var("JWTDECK_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Some(val) = var("JWTDECK_DEFAULT_ALG") {
        match val.parse() {
            Ok(alg) => config.signing.default_algorithm = alg,
            Err(e) => tracing::warn!(value = %val, error = %e, "ignoring JWTDECK_DEFAULT_ALG"),
        }
    }
}
