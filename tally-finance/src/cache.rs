//! Category cache: normalized description -> classification.
//!
//! The classifier only talks to [`CategoryCache`]; the backing store is
//! swappable. [`JsonFileCache`] keeps a pretty-printed JSON object on disk
//! and replaces it atomically on every flush.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tally_core::{Classification, Error, Result};
use tracing::{debug, warn};

pub trait CategoryCache {
    fn get(&self, key: &str) -> Option<Classification>;

    /// Insert or replace. Sentinel classifications must not be stored.
    fn put(&mut self, key: String, value: Classification);

    /// Persist pending changes. A no-op when nothing changed.
    fn flush(&mut self) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, Classification>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (String, Classification)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl CategoryCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Classification> {
        self.entries.get(key).copied()
    }

    fn put(&mut self, key: String, value: Classification) {
        if value.is_cacheable() {
            self.entries.insert(key, value);
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache persisted as a JSON object, keys sorted:
///
/// ```json
/// {
///   "coffee shop": { "category": "Food", "confidence": 0.9 }
/// }
/// ```
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, Classification>,
    dirty: bool,
}

impl JsonFileCache {
    /// Load the cache at `path`. A missing file is an empty cache; a file that
    /// exists but does not parse is `CacheCorrupt` and is left untouched.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| corrupt(&path, e))?;
            let entries: BTreeMap<String, Classification> =
                serde_json::from_str(&text).map_err(|e| corrupt(&path, e))?;
            if let Some((key, _)) = entries.iter().find(|(_, v)| !v.is_cacheable()) {
                return Err(corrupt(&path, format!("entry {key:?} holds the sentinel category")));
            }
            entries
                .into_iter()
                .map(|(key, v)| {
                    let clamped = Classification::new(v.category, v.confidence);
                    if clamped.confidence != v.confidence {
                        warn!(key = %key, confidence = v.confidence, "cached confidence out of range, clamped");
                    }
                    (key, clamped)
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "loaded category cache");
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a sibling temp file, then rename over the target.
    fn write_atomic(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl CategoryCache for JsonFileCache {
    fn get(&self, key: &str) -> Option<Classification> {
        self.entries.get(key).copied()
    }

    fn put(&mut self, key: String, value: Classification) {
        if value.is_cacheable() {
            self.entries.insert(key, value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.write_atomic()?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "flushed category cache");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn corrupt(path: &Path, reason: impl ToString) -> Error {
    Error::CacheCorrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Category;

    fn food() -> Classification {
        Classification::new(Category::Food, 0.9)
    }

    #[test]
    fn test_missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::open(dir.path().join("cache.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = JsonFileCache::open(&path).unwrap();
        cache.put("coffee shop".into(), food());
        cache.flush().unwrap();

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("coffee shop"), Some(food()));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"category\": \"Food\""));
    }

    #[test]
    fn test_flush_without_changes_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = JsonFileCache::open(&path).unwrap();
        cache.flush().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file_is_fatal_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        match JsonFileCache::open(&path) {
            Err(Error::CacheCorrupt { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected CacheCorrupt, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_unknown_category_in_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"coffee": {"category": "Dining", "confidence": 0.9}}"#).unwrap();
        assert!(matches!(JsonFileCache::open(&path), Err(Error::CacheCorrupt { .. })));
    }

    #[test]
    fn test_sentinel_in_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"coffee": {"category": "Unclassified", "confidence": 0.0}}"#).unwrap();
        assert!(matches!(JsonFileCache::open(&path), Err(Error::CacheCorrupt { .. })));
    }

    #[test]
    fn test_out_of_range_confidence_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let text = r#"{"coffee": {"category": "Food", "confidence": 5.0},
                       "rent": {"category": "Housing", "confidence": -1}}"#;
        fs::write(&path, text).unwrap();

        let cache = JsonFileCache::open(&path).unwrap();
        assert_eq!(cache.get("coffee").unwrap().confidence, 1.0);
        assert_eq!(cache.get("rent").unwrap().confidence, 0.0);
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_sentinel_is_never_stored() {
        let mut mem = MemoryCache::new();
        mem.put("x".into(), Classification::unclassified());
        assert!(mem.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let mut file = JsonFileCache::open(dir.path().join("c.json")).unwrap();
        file.put("x".into(), Classification::unclassified());
        file.flush().unwrap();
        assert!(!file.path().exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let mut cache = JsonFileCache::open(&path).unwrap();
        cache.put("rent payment".into(), Classification::new(Category::Housing, 1.0));
        cache.flush().unwrap();
        assert!(path.exists());
    }
}
