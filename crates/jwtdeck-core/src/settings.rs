//! Persisted user state: token history, theme preference, help-seen flag.
//!
//! Values live under namespaced, versioned keys in a [`Storage`] backend.
//! The default backend keeps one JSON file per key in `~/.jwtdeck/`.
//! Reads never fail: a missing or corrupt value yields the default.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::history::HistoryEntry;

pub const HISTORY_KEY: &str = "jwtdeck.v1.history";
pub const THEME_KEY: &str = "jwtdeck.v1.theme";
pub const HELP_SEEN_KEY: &str = "jwtdeck.v1.help_seen";

/// Key/value backend for persisted settings.
pub trait Storage: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default data directory: `~/.jwtdeck/`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".jwtdeck"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&path, &e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| unavailable(&self.dir, &e))?;
        let path = self.path(key);
        std::fs::write(&path, value).map_err(|e| unavailable(&path, &e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(unavailable(&path, &e)),
            _ => Ok(()),
        }
    }
}

fn unavailable(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {e}", path.display()))
}

/// Process-local storage, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Colour theme preference. Only stored here; nothing in the engine renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
    DarkGrey,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::DarkGrey => "dark-grey",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "dark-grey" => Ok(Self::DarkGrey),
            other => Err(format!("unknown theme '{other}' (light, dark, dark-grey)")),
        }
    }
}

/// Typed accessors over a shared [`Storage`].
#[derive(Debug, Clone)]
pub struct PersistentSettings {
    storage: Arc<dyn Storage>,
}

impl PersistentSettings {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// File-backed settings in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Persisted history, most recent first. Empty when missing or corrupt.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read(HISTORY_KEY).unwrap_or_default()
    }

    pub fn set_history(&self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
        self.write(HISTORY_KEY, &entries)
    }

    pub fn clear_history(&self) -> Result<(), StorageError> {
        self.storage.remove(HISTORY_KEY)
    }

    pub fn theme(&self) -> Theme {
        self.read(THEME_KEY).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.write(THEME_KEY, &theme)
    }

    /// Whether the first-run help has been dismissed.
    pub fn help_seen(&self) -> bool {
        self.read(HELP_SEEN_KEY).unwrap_or(false)
    }

    pub fn set_help_seen(&self, seen: bool) -> Result<(), StorageError> {
        self.write(HELP_SEEN_KEY, &seen)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage unavailable, using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding corrupt stored value");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|source| StorageError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.storage.set(key, &json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let settings = PersistentSettings::in_memory();
        assert!(settings.history().is_empty());
        assert_eq!(settings.theme(), Theme::Dark);
        assert!(!settings.help_seen());
    }

    #[test]
    fn theme_and_help_flag_persist() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PersistentSettings::open(dir.path());
        settings.set_theme(Theme::DarkGrey).unwrap();
        settings.set_help_seen(true).unwrap();

        let reopened = PersistentSettings::open(dir.path());
        assert_eq!(reopened.theme(), Theme::DarkGrey);
        assert!(reopened.help_seen());

        let raw = std::fs::read_to_string(dir.path().join("jwtdeck.v1.theme.json")).unwrap();
        assert_eq!(raw, "\"dark-grey\"");
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jwtdeck.v1.history.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("jwtdeck.v1.theme.json"), "\"neon\"").unwrap();

        let settings = PersistentSettings::open(dir.path());
        assert!(settings.history().is_empty());
        assert_eq!(settings.theme(), Theme::Dark);
    }

    #[test]
    fn missing_directory_reads_as_empty() {
        let settings = PersistentSettings::open("/nonexistent/jwtdeck-settings");
        assert!(settings.history().is_empty());
        assert!(!settings.help_seen());
    }

    #[test]
    fn unwritable_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let settings = PersistentSettings::open(blocker.join("data"));
        let err = settings.set_theme(Theme::Light).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(ref msg) if msg.contains("not-a-dir")));
        assert_eq!(settings.theme(), Theme::Dark);
    }

    #[test]
    fn clear_history_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PersistentSettings::open(dir.path());
        settings.set_history(&[]).unwrap();
        settings.clear_history().unwrap();
        settings.clear_history().unwrap();
        assert!(!dir.path().join("jwtdeck.v1.history.json").exists());
    }

    #[test]
    fn keys_are_namespaced_and_versioned() {
        for key in [HISTORY_KEY, THEME_KEY, HELP_SEEN_KEY] {
            assert!(key.starts_with("jwtdeck.v1."));
        }
    }

    #[test]
    fn theme_parse() {
        assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!(Theme::DarkGrey.to_string(), "dark-grey");
    }
}
