#![forbid(unsafe_code)]

//! Durable storage for accepted style documents.
//!
//! # Layout
//!
//! | key | value |
//! |-----|-------|
//! | `maputnik:style:<id>` | the document as JSON |
//! | `maputnik:latest_style` | id of the most recently saved document |
//!
//! # Quota
//!
//! When a backend reports that it is full, [`StylePersistence::save`] deletes
//! every stored document and retries once. Older sessions are lost; the
//! current one is not.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use maputnik_core::{StyleDocument, parse_style};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STYLE_KEY_PREFIX: &str = "maputnik:style:";
pub const LATEST_STYLE_KEY: &str = "maputnik:latest_style";

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored style is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored style {id} is unreadable: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: maputnik_core::StyleError,
    },
}

impl StorageError {
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// A string key-value store.
pub trait StorageBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&mut self, key: &str) -> StorageResult<()>;
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// In-memory backend with an optional byte quota over keys plus values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self.entries.get(key).map_or(0, |old| key.len() + old.len());
            let needed = self.used_bytes() - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// One file per key under a directory.
///
/// Keys are percent-encoded into file names; writes go through a temporary
/// file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Everything except ASCII alphanumerics, `-`, `_` and `.` is escaped.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, FILE_NAME).to_string()
}

fn decode_key(name: &str) -> Option<String> {
    percent_decode_str(name)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

fn map_write_error(key: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::StorageFull {
        StorageError::QuotaExceeded {
            key: key.to_string(),
        }
    } else {
        StorageError::Io(err)
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|err| map_write_error(key, err))?;
        fs::rename(&tmp, &path).map_err(|err| map_write_error(key, err))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Saves and restores style documents on a [`StorageBackend`].
pub struct StylePersistence {
    backend: Box<dyn StorageBackend>,
}

impl fmt::Debug for StylePersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StylePersistence").finish_non_exhaustive()
    }
}

impl StylePersistence {
    #[must_use]
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    #[must_use]
    pub fn style_key(id: &str) -> String {
        format!("{STYLE_KEY_PREFIX}{id}")
    }

    /// Store `style` and mark it as the latest. A full backend is purged
    /// of every stored style and the write retried once.
    pub fn save(&mut self, style: &StyleDocument) -> StorageResult<()> {
        let json = serde_json::to_string(style)?;
        match self.write(&style.id, &json) {
            Err(err) if err.is_quota() => {
                warn!(id = %style.id, "storage full; purging stored styles");
                self.purge()?;
                self.write(&style.id, &json)
            }
            other => other,
        }
    }

    fn write(&mut self, id: &str, json: &str) -> StorageResult<()> {
        self.backend.set(&Self::style_key(id), json)?;
        self.backend.set(LATEST_STYLE_KEY, id)?;
        debug!(id, bytes = json.len(), "style saved");
        Ok(())
    }

    /// Load one stored style by id.
    pub fn load(&self, id: &str) -> StorageResult<Option<StyleDocument>> {
        let Some(json) = self.backend.get(&Self::style_key(id))? else {
            return Ok(None);
        };
        parse_style(&json)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                id: id.to_string(),
                source,
            })
    }

    /// Load the most recently saved style.
    pub fn load_latest(&self) -> StorageResult<Option<StyleDocument>> {
        match self.backend.get(LATEST_STYLE_KEY)? {
            Some(id) => self.load(&id),
            None => Ok(None),
        }
    }

    /// Ids of every stored style.
    pub fn stored_ids(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(STYLE_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Delete every stored style and the latest marker.
    pub fn purge(&mut self) -> StorageResult<()> {
        let ids = self.stored_ids()?;
        for id in &ids {
            self.backend.remove(&Self::style_key(id))?;
        }
        self.backend.remove(LATEST_STYLE_KEY)?;
        info!(purged = ids.len(), "purged stored styles");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maputnik_core::{Layer, empty_style};

    fn style_with_id(id: &str, layers: usize) -> StyleDocument {
        let mut style = empty_style();
        style.id = id.to_string();
        for i in 0..layers {
            style.layers.push_back(Layer::new(format!("layer-{i}"), "background"));
        }
        style
    }

    #[test]
    fn save_and_load_latest() {
        let mut persistence = StylePersistence::in_memory();
        persistence.save(&style_with_id("a", 1)).unwrap();
        persistence.save(&style_with_id("b", 2)).unwrap();
        let latest = persistence.load_latest().unwrap().unwrap();
        assert_eq!(latest.id, "b");
        assert_eq!(latest.layers.len(), 2);
        assert_eq!(persistence.stored_ids().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn quota_purges_and_retries() {
        let small = serde_json::to_string(&style_with_id("old", 0)).unwrap();
        let big = serde_json::to_string(&style_with_id("new", 3)).unwrap();
        let quota = (STYLE_KEY_PREFIX.len() + 3 + big.len()) + (LATEST_STYLE_KEY.len() + 3) + 4;
        assert!(quota < quota + small.len());

        let mut persistence = StylePersistence::new(MemoryStorage::with_quota(quota));
        persistence.save(&style_with_id("old", 0)).unwrap();
        persistence.save(&style_with_id("new", 3)).unwrap();
        assert_eq!(persistence.stored_ids().unwrap(), vec!["new"]);
        assert_eq!(persistence.load_latest().unwrap().unwrap().id, "new");
    }

    #[test]
    fn quota_too_small_for_one_style_fails() {
        let mut persistence = StylePersistence::new(MemoryStorage::with_quota(10));
        let err = persistence.save(&style_with_id("x", 1)).unwrap_err();
        assert!(err.is_quota());
    }

    #[test]
    fn key_encoding_round_trips() {
        for key in ["maputnik:style:abc", "maputnik:latest_style", "weird/key %"] {
            assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        }
        assert!(!encode_key("a:b/c").contains([':', '/']));
        assert_eq!(encode_key("maputnik:style:a-b_c.d"), "maputnik%3Astyle%3Aa-b_c.d");
        assert_eq!(decode_key("%FF"), None);
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::open(dir.path().join("styles")).unwrap();
        storage.set("maputnik:style:abc", "{}").unwrap();
        assert_eq!(storage.get("maputnik:style:abc").unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.keys().unwrap(), vec!["maputnik:style:abc"]);
        storage.remove("maputnik:style:abc").unwrap();
        storage.remove("maputnik:style:abc").unwrap();
        assert_eq!(storage.get("maputnik:style:abc").unwrap(), None);
    }

    #[test]
    fn corrupt_entries_are_reported() {
        let mut backend = MemoryStorage::new();
        backend.set(&StylePersistence::style_key("bad"), "{not json").unwrap();
        backend.set(LATEST_STYLE_KEY, "bad").unwrap();
        let persistence = StylePersistence::new(backend);
        assert!(matches!(
            persistence.load_latest(),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
