//! Bounded, persisted history of named token snapshots.
//!
//! Entries are kept most-recently-saved first and capped (20 by default);
//! saving past the cap drops the oldest. Every mutation writes the full list
//! back through [`PersistentSettings`] before the in-memory list changes, so
//! memory and storage never disagree after a failed write.

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::settings::PersistentSettings;
use crate::timing;
use crate::token::DecodedToken;

pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// A saved token snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Time-ordered unique id (UUID v7).
    pub id: String,
    /// User-supplied label.
    pub name: String,
    pub token: String,
    /// Decoded view at save time.
    pub decoded: DecodedToken,
    /// When the entry was saved (Unix milliseconds).
    pub saved_at: i64,
    /// Verification outcome at save time, if the token had been verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// In-memory history hydrated from, and written through to, settings storage.
#[derive(Debug)]
pub struct HistoryStore {
    settings: PersistentSettings,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl HistoryStore {
    /// Load persisted entries. Missing or corrupt storage yields an empty store.
    pub fn hydrate(settings: PersistentSettings) -> Self {
        Self::hydrate_with_limit(settings, DEFAULT_MAX_ENTRIES)
    }

    pub fn hydrate_with_limit(settings: PersistentSettings, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let mut entries = settings.history();
        entries.truncate(max_entries);
        tracing::debug!(entries = entries.len(), "hydrated history");
        Self {
            settings,
            entries,
            max_entries,
        }
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Save a named snapshot at the front of the list.
    pub fn save(
        &mut self,
        name: &str,
        token: &str,
        decoded: &DecodedToken,
        verified: Option<bool>,
    ) -> Result<HistoryEntry, HistoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HistoryError::EmptyName);
        }

        let entry = HistoryEntry {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.to_string(),
            token: token.to_string(),
            decoded: decoded.clone(),
            saved_at: timing::now_millis(),
            verified,
        };

        let mut next = Vec::with_capacity(self.max_entries);
        next.push(entry.clone());
        next.extend(self.entries.iter().take(self.max_entries - 1).cloned());
        self.commit(next)?;

        tracing::info!(id = %entry.id, name = %entry.name, "saved token to history");
        Ok(entry)
    }

    /// Remove an entry by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool, HistoryError> {
        if !self.entries.iter().any(|e| e.id == id) {
            return Ok(false);
        }
        let next = self.entries.iter().filter(|e| e.id != id).cloned().collect();
        self.commit(next)?;
        tracing::info!(id, "removed history entry");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.settings.clear_history()?;
        self.entries.clear();
        tracing::info!("cleared history");
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<&HistoryEntry, HistoryError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))
    }

    fn commit(&mut self, next: Vec<HistoryEntry>) -> Result<(), HistoryError> {
        self.settings.set_history(&next)?;
        self.entries = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::token::decode;

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                         eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ.\
                         ypNASjsXTW6nmFdRxHAw-7s7tLMLj_jKknIXprDZkSs";

    fn store() -> HistoryStore {
        HistoryStore::hydrate(PersistentSettings::in_memory())
    }

    #[test]
    fn save_prepends() {
        let mut store = store();
        let decoded = decode(TOKEN).unwrap();
        store.save("first", TOKEN, &decoded, None).unwrap();
        store.save("second", TOKEN, &decoded, Some(true)).unwrap();
        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["second", "first"]);
        assert_eq!(store.entries()[0].verified, Some(true));
    }

    #[test]
    fn blank_name_is_refused() {
        let mut store = store();
        let decoded = decode(TOKEN).unwrap();
        assert!(matches!(
            store.save("   ", TOKEN, &decoded, None),
            Err(HistoryError::EmptyName)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn name_is_trimmed() {
        let mut store = store();
        let decoded = decode(TOKEN).unwrap();
        let entry = store.save("  staging  ", TOKEN, &decoded, None).unwrap();
        assert_eq!(entry.name, "staging");
    }

    #[test]
    fn ids_are_unique_for_rapid_saves() {
        let mut store = store();
        let decoded = decode(TOKEN).unwrap();
        for i in 0..10 {
            store.save(&format!("t{i}"), TOKEN, &decoded, None).unwrap();
        }
        let mut ids: Vec<&str> = store.entries().iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn remove_and_load() {
        let mut store = store();
        let decoded = decode(TOKEN).unwrap();
        let entry = store.save("a", TOKEN, &decoded, None).unwrap();
        assert_eq!(store.load(&entry.id).unwrap().name, "a");
        assert!(store.remove(&entry.id).unwrap());
        assert!(!store.remove(&entry.id).unwrap());
        assert!(matches!(store.load(&entry.id), Err(HistoryError::NotFound(_))));
    }

    #[test]
    fn mutations_are_written_through() {
        let settings = PersistentSettings::in_memory();
        let mut store = HistoryStore::hydrate(settings.clone());
        let decoded = decode(TOKEN).unwrap();
        let entry = store.save("persisted", TOKEN, &decoded, Some(false)).unwrap();

        let rehydrated = HistoryStore::hydrate(settings.clone());
        assert_eq!(rehydrated.entries(), store.entries());
        assert_eq!(rehydrated.load(&entry.id).unwrap().verified, Some(false));

        store.clear().unwrap();
        assert!(HistoryStore::hydrate(settings).is_empty());
    }

    #[test]
    fn custom_limit_is_enforced() {
        let mut store = HistoryStore::hydrate_with_limit(PersistentSettings::in_memory(), 3);
        let decoded = decode(TOKEN).unwrap();
        for i in 0..5 {
            store.save(&format!("t{i}"), TOKEN, &decoded, None).unwrap();
        }
        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["t4", "t3", "t2"]);
    }

    #[test]
    fn hydrate_truncates_oversized_storage() {
        let settings = PersistentSettings::in_memory();
        let mut big = HistoryStore::hydrate_with_limit(settings.clone(), 10);
        let decoded = decode(TOKEN).unwrap();
        for i in 0..10 {
            big.save(&format!("t{i}"), TOKEN, &decoded, None).unwrap();
        }
        let small = HistoryStore::hydrate_with_limit(settings, 4);
        assert_eq!(small.len(), 4);
        assert_eq!(small.entries()[0].name, "t9");
    }
}
