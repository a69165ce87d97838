//! Resolved configuration and storage handed to every command.

use std::path::PathBuf;

use jwtdeck_core::{Config, HistoryStore, PersistentSettings};

/// What a command needs from the environment.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: Config,
    pub settings: PersistentSettings,
}

impl CliContext {
    /// Open file-backed settings in the configured data directory.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let dir = config.data_dir()?;
        tracing::debug!(dir = %dir.display(), "using data directory");
        Ok(Self {
            settings: PersistentSettings::open(dir),
            config,
        })
    }

    pub const fn with_settings(config: Config, settings: PersistentSettings) -> Self {
        Self { config, settings }
    }

    /// Apply a `--data-dir` flag on top of file and environment config.
    pub fn override_data_dir(config: &mut Config, data_dir: Option<PathBuf>) {
        if let Some(dir) = data_dir {
            config.storage.data_dir = Some(dir);
        }
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::hydrate_with_limit(self.settings.clone(), self.config.history.max_entries)
    }
}
