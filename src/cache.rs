use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::analyzer::extract::ReferenceRecord;

/// Bumped with the crate so results from an older matcher are never reused.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extraction result of one file plus the hash of the text it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: u64,
    /// Seconds since the epoch when the entry was written
    pub modified_at: u64,
    pub records: Vec<ReferenceRecord>,
}

/// Per-file extraction results, kept in memory and mirrored to one JSON file
/// per key under `cache_dir`. Disk problems only ever turn into misses.
pub struct ExtractionCache {
    memory_cache: Arc<DashMap<String, CacheEntry>>,
    cache_dir: PathBuf,
    version: String,
}

impl ExtractionCache {
    pub fn new(cache_dir: impl AsRef<Path>, version: &str) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(dir = %cache_dir.display(), error = %e, "cannot create cache directory");
        }

        Self {
            memory_cache: Arc::new(DashMap::new()),
            cache_dir,
            version: version.to_string(),
        }
    }

    fn hash_content(content: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish()
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.version.hash(&mut hasher);
        self.cache_dir.join(format!("{:x}.json", hasher.finish()))
    }

    /// Cached records for `key`, if they were computed from exactly `content`.
    pub fn get(&self, key: &str, content: &str) -> Option<Vec<ReferenceRecord>> {
        let content_hash = Self::hash_content(content);

        if let Some(entry) = self.memory_cache.get(key) {
            if entry.content_hash == content_hash {
                return Some(entry.records.clone());
            }
        }

        let path = self.entry_path(key);
        let raw = fs::read_to_string(&path).ok()?;
        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "ignoring unreadable cache entry");
                return None;
            }
        };
        if entry.content_hash != content_hash {
            return None;
        }
        let records = entry.records.clone();
        self.memory_cache.insert(key.to_string(), entry);
        Some(records)
    }

    pub fn set(&self, key: &str, content: &str, records: &[ReferenceRecord]) {
        let entry = CacheEntry {
            content_hash: Self::hash_content(content),
            modified_at: Self::current_timestamp(),
            records: records.to_vec(),
        };

        let path = self.entry_path(key);
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    warn!(file = %path.display(), error = %e, "cannot write cache entry");
                }
            }
            Err(e) => warn!(key, error = %e, "cannot serialize cache entry"),
        }

        self.memory_cache.insert(key.to_string(), entry);
    }

    /// Drop every entry, in memory and on disk.
    pub fn clear(&self) {
        self.memory_cache.clear();
        if let Err(e) = fs::remove_dir_all(&self.cache_dir) {
            debug!(dir = %self.cache_dir.display(), error = %e, "cache directory not removed");
        }
        if let Err(e) = fs::create_dir_all(&self.cache_dir) {
            warn!(dir = %self.cache_dir.display(), error = %e, "cannot recreate cache directory");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory_cache.len(),
            cache_dir: self.cache_dir.display().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub cache_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::extract::extract_references_tagged;

    #[test]
    fn test_cache_hit_miss() {
        let temp_dir = std::env::temp_dir().join("sql_refs_test_cache_hit_miss");
        fs::remove_dir_all(&temp_dir).ok();
        let cache = ExtractionCache::new(&temp_dir, "1.0");

        let key = "reports/daily.sql";
        let content = "SELECT * FROM sales.orders";
        let records = extract_references_tagged(content, Some(key));

        assert!(cache.get(key, content).is_none());

        cache.set(key, content, &records);
        assert_eq!(cache.get(key, content), Some(records.clone()));
        assert_eq!(cache.stats().memory_entries, 1);

        // edited file
        assert!(cache.get(key, "SELECT * FROM sales.returns").is_none());

        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_persistent_cache() {
        let temp_dir = std::env::temp_dir().join("sql_refs_test_cache_persist");
        fs::remove_dir_all(&temp_dir).ok();
        let key = "load.sql";
        let content = "INSERT INTO [stage].[customers] SELECT * FROM raw.customers";
        let records = extract_references_tagged(content, Some(key));

        {
            let cache = ExtractionCache::new(&temp_dir, "1.0");
            cache.set(key, content, &records);
        }

        {
            let cache = ExtractionCache::new(&temp_dir, "1.0");
            assert_eq!(cache.get(key, content), Some(records));
        }

        // a different version never sees the old entries
        {
            let cache = ExtractionCache::new(&temp_dir, "2.0");
            assert!(cache.get(key, content).is_none());
        }

        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_clear() {
        let temp_dir = std::env::temp_dir().join("sql_refs_test_cache_clear");
        fs::remove_dir_all(&temp_dir).ok();
        let cache = ExtractionCache::new(&temp_dir, "1.0");
        let content = "UPDATE t SET x = 1";
        cache.set("a.sql", content, &extract_references_tagged(content, Some("a.sql")));

        cache.clear();
        assert_eq!(cache.stats().memory_entries, 0);
        assert!(cache.get("a.sql", content).is_none());
        assert!(temp_dir.is_dir());

        fs::remove_dir_all(&temp_dir).ok();
    }
}
