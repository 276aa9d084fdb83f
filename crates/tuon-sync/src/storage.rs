//! Local durable cache for documents.
//!
//! The cache is the durability backstop: every edit lands here (debounced)
//! before it is sent to the remote store, and it is read once on open to
//! decide whether local or remote content wins.
//!
//! ## Storage key strategy
//!
//! One entry per document under `"document-data-{id}"`, stored as JSON.
//! Content is always kept in durable form (relative image paths).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tuon_editor_core::{Block, content_is_blank};

use crate::error::{Result, SyncError};

/// Prefix for all document cache keys.
pub const DOCUMENT_KEY_PREFIX: &str = "document-data-";

/// Build the full storage key from a document id.
pub fn storage_key(id: &str) -> String {
    format!("{}{}", DOCUMENT_KEY_PREFIX, id)
}

/// Minimal key-value contract of a durable local store.
///
/// Synchronous, like browser local storage.
pub trait LocalStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Per-document snapshot kept in the local store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheEntry {
    /// Document id; an empty id marks a corrupt entry.
    #[serde(default)]
    pub id: SmolStr,

    /// Block content in durable form.
    #[serde(default)]
    pub content: Vec<Block>,

    #[serde(default)]
    pub title: String,

    /// Time of the local save (or of the remote record it was copied from).
    pub updated_at: DateTime<Utc>,

    /// Whether the document was known to exist remotely at save time.
    #[serde(default)]
    pub persisted: bool,

    /// Whether the user named the document explicitly.
    #[serde(default)]
    pub title_locked: bool,
}

impl LocalCacheEntry {
    /// An entry is usable for a remote write only if it names its document.
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Nothing worth creating remotely: blank content and a placeholder title.
    pub fn is_blank(&self, is_placeholder_title: impl Fn(&str) -> bool) -> bool {
        content_is_blank(&self.content) && is_placeholder_title(&self.title)
    }
}

/// Summary of a cached document, for listings.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedDocument {
    pub id: SmolStr,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Load a document's cache entry.
///
/// Read and parse failures are logged and reported as "no local data".
pub fn load_entry<L: LocalStore + ?Sized>(store: &L, id: &str) -> Option<LocalCacheEntry> {
    let raw = match store.get(&storage_key(id)) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(id, error = %e, "failed to read local cache entry");
            return None;
        }
    };
    match serde_json::from_str::<LocalCacheEntry>(&raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(id, error = %e, "discarding unreadable local cache entry");
            None
        }
    }
}

/// Like [`load_entry`], but distinguishes "absent" from "unusable" so a
/// remote write can refuse to run on a damaged snapshot.
pub fn load_entry_strict<L: LocalStore + ?Sized>(
    store: &L,
    id: &str,
) -> Result<LocalCacheEntry> {
    let corrupt = || SyncError::CorruptSnapshot { id: id.to_string() };
    let raw = store.get(&storage_key(id))?.ok_or_else(corrupt)?;
    let entry: LocalCacheEntry = serde_json::from_str(&raw).map_err(|e| {
        tracing::warn!(id, error = %e, "local snapshot failed to parse");
        corrupt()
    })?;
    if !entry.is_complete() || entry.id != id {
        return Err(corrupt());
    }
    Ok(entry)
}

/// Write a document's cache entry.
pub fn save_entry<L: LocalStore + ?Sized>(store: &L, entry: &LocalCacheEntry) -> Result<()> {
    let raw = serde_json::to_string(entry)?;
    store.set(&storage_key(&entry.id), &raw)
}

/// Delete a document's cache entry.
pub fn delete_entry<L: LocalStore + ?Sized>(store: &L, id: &str) -> Result<()> {
    store.remove(&storage_key(id))
}

/// List all cached documents, newest first. Unreadable entries are skipped.
pub fn list_entries<L: LocalStore + ?Sized>(store: &L) -> Result<Vec<CachedDocument>> {
    let mut docs: Vec<CachedDocument> = store
        .keys()?
        .into_iter()
        .filter_map(|key| {
            let id = key.strip_prefix(DOCUMENT_KEY_PREFIX)?.to_string();
            let entry = load_entry(store, &id)?;
            Some(CachedDocument {
                id: entry.id,
                title: entry.title,
                updated_at: entry.updated_at,
            })
        })
        .collect();
    docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(docs)
}

/// In-memory store, for tests and for sessions that need no durability.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.map().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.map().keys().cloned().collect())
    }
}

impl<L: LocalStore + ?Sized> LocalStore for std::sync::Arc<L> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Store keeping one JSON file per key in a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a [`FileStore`] rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // ids are opaque, keep file names portable
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // write-then-rename so a crash never leaves a half-written entry
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for dirent in std::fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, title: &str, secs: i64) -> LocalCacheEntry {
        LocalCacheEntry {
            id: id.into(),
            content: vec![Block::paragraph("body")],
            title: title.into(),
            updated_at: Utc.timestamp_opt(secs, 0).unwrap(),
            persisted: false,
            title_locked: false,
        }
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(storage_key("abc"), "document-data-abc");
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let e = entry("doc-1", "Notes", 100);
        save_entry(&store, &e).unwrap();

        assert_eq!(load_entry(&store, "doc-1"), Some(e.clone()));
        assert_eq!(load_entry_strict(&store, "doc-1").unwrap(), e);
        assert_eq!(load_entry(&store, "doc-2"), None);
    }

    #[test]
    fn test_garbage_is_treated_as_absent() {
        let store = MemoryStore::new();
        store.set(&storage_key("doc-1"), "{not json").unwrap();

        assert_eq!(load_entry(&store, "doc-1"), None);
        assert!(matches!(
            load_entry_strict(&store, "doc-1"),
            Err(SyncError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_entry_without_id_is_corrupt() {
        let store = MemoryStore::new();
        store
            .set(
                &storage_key("doc-1"),
                r#"{"content": [], "title": "x", "updatedAt": "2024-01-01T00:00:00Z"}"#,
            )
            .unwrap();

        // still readable for display
        let loaded = load_entry(&store, "doc-1").unwrap();
        assert!(!loaded.is_complete());
        // but never sent remotely
        assert!(matches!(
            load_entry_strict(&store, "doc-1"),
            Err(SyncError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        let raw = r#"{"id": "d", "content": [], "title": "t", "updatedAt": "2024-01-01T00:00:00Z"}"#;
        let e: LocalCacheEntry = serde_json::from_str(raw).unwrap();
        assert!(!e.persisted);
        assert!(!e.title_locked);
    }

    #[test]
    fn test_is_blank() {
        let mut e = entry("d", "Untitled", 1);
        e.content.clear();
        assert!(e.is_blank(|t| t == "Untitled"));
        e.title = "Plans".into();
        assert!(!e.is_blank(|t| t == "Untitled"));
    }

    #[test]
    fn test_list_entries_newest_first() {
        let store = MemoryStore::new();
        save_entry(&store, &entry("old", "Old", 10)).unwrap();
        save_entry(&store, &entry("new", "New", 20)).unwrap();
        store.set("unrelated", "1").unwrap();
        store.set(&storage_key("broken"), "nope").unwrap();

        let listed = list_entries(&store).unwrap();
        let ids: Vec<&str> = listed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_delete_entry() {
        let store = MemoryStore::new();
        save_entry(&store, &entry("doc-1", "Notes", 1)).unwrap();
        delete_entry(&store, "doc-1").unwrap();
        assert_eq!(load_entry(&store, "doc-1"), None);
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache")).unwrap();
        let e = entry("doc-1", "Notes", 5);

        save_entry(&store, &e).unwrap();
        assert_eq!(load_entry(&store, "doc-1"), Some(e));
        assert_eq!(store.keys().unwrap(), vec![storage_key("doc-1")]);

        delete_entry(&store, "doc-1").unwrap();
        assert_eq!(load_entry(&store, "doc-1"), None);
        // removing twice is fine
        delete_entry(&store, "doc-1").unwrap();
    }
}
