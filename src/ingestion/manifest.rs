//! Content-addressed index of processed documents. The manifest is the
//! single source of truth for "already processed" decisions at the fetch
//! layer, and makes backfills resumable after a crash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::domain::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub document_id: i64,
    pub file_path: String,
    pub url: String,
    pub title: String,
    pub source: String,
    pub doc_type: String,
    /// RFC 3339 fetch timestamp.
    pub fetched: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestData {
    by_md5: BTreeMap<String, ManifestEntry>,
}

pub trait ManifestStore: Send + Sync {
    fn get(&self, md5: &str) -> Option<ManifestEntry>;
    /// Reverse lookup used to short-circuit before any HTTP.
    fn find_by_url(&self, url: &str) -> Option<(String, ManifestEntry)>;
    /// Insert or replace, persisting where the store is durable.
    fn insert(&self, md5: &str, entry: ManifestEntry) -> Result<()>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-backed store. Loaded once at startup; every insert rewrites the file
/// atomically (write to a temp sibling, then rename) so a crash never leaves
/// a torn manifest.
pub struct JsonManifestStore {
    path: PathBuf,
    data: Mutex<ManifestData>,
}

impl JsonManifestStore {
    pub fn open(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "manifest unreadable, starting empty");
                ManifestData::default()
            }),
            Err(_) => ManifestData::default(),
        };

        Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        }
    }

    fn persist(&self, data: &ManifestData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ManifestStore for JsonManifestStore {
    fn get(&self, md5: &str) -> Option<ManifestEntry> {
        self.data.lock().unwrap().by_md5.get(md5).cloned()
    }

    fn find_by_url(&self, url: &str) -> Option<(String, ManifestEntry)> {
        self.data
            .lock()
            .unwrap()
            .by_md5
            .iter()
            .find(|(_, entry)| entry.url == url)
            .map(|(md5, entry)| (md5.clone(), entry.clone()))
    }

    fn insert(&self, md5: &str, entry: ManifestEntry) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.by_md5.insert(md5.to_string(), entry);
        self.persist(&data)
    }

    fn len(&self) -> usize {
        self.data.lock().unwrap().by_md5.len()
    }
}

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryManifestStore {
    data: Mutex<ManifestData>,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestStore for InMemoryManifestStore {
    fn get(&self, md5: &str) -> Option<ManifestEntry> {
        self.data.lock().unwrap().by_md5.get(md5).cloned()
    }

    fn find_by_url(&self, url: &str) -> Option<(String, ManifestEntry)> {
        self.data
            .lock()
            .unwrap()
            .by_md5
            .iter()
            .find(|(_, entry)| entry.url == url)
            .map(|(md5, entry)| (md5.clone(), entry.clone()))
    }

    fn insert(&self, md5: &str, entry: ManifestEntry) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .by_md5
            .insert(md5.to_string(), entry);
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.lock().unwrap().by_md5.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> ManifestEntry {
        ManifestEntry {
            document_id: 7,
            file_path: "downloads/test.pdf".into(),
            url: url.into(),
            title: "Test".into(),
            source: "National Treasury Kenya".into(),
            doc_type: "budget".into(),
            fetched: "2025-01-01T00:00:00Z".into(),
            mirror_key: None,
        }
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_manifest.json");

        {
            let store = JsonManifestStore::open(&path);
            store.insert("abc123", entry("http://x/doc.pdf")).unwrap();
            assert_eq!(store.len(), 1);
        }

        // Reopen from disk: the entry survives the process.
        let store = JsonManifestStore::open(&path);
        let loaded = store.get("abc123").unwrap();
        assert_eq!(loaded.document_id, 7);
        assert_eq!(
            store.find_by_url("http://x/doc.pdf").unwrap().0,
            "abc123"
        );
    }

    #[test]
    fn test_corrupt_manifest_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonManifestStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryManifestStore::new();
        assert!(store.get("missing").is_none());
        store.insert("md5", entry("http://y")).unwrap();
        assert_eq!(store.len(), 1);
    }
}
