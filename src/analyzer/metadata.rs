use crate::analyzer::extract::{extract_references_tagged, ReferenceRecord};
use crate::cache::{ExtractionCache, CACHE_VERSION};
use crate::error::{ExtractError, Result};
use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What to scan and where to cache. The CLI fills this from its flags.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// File extensions to include, without the dot; matched case-insensitively.
    pub extensions: Vec<String>,
    /// Directory names that are never descended into.
    pub skip_dirs: Vec<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["sql".into()],
            skip_dirs: [".git", "target", "node_modules", "bin", "obj"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_dir: None,
        }
    }
}

#[derive(Serialize)]
struct IndexSnapshot {
    files: BTreeMap<String, Vec<ReferenceRecord>>,
    failures: BTreeMap<String, String>,
}

/// Extraction results for a tree of SQL files, keyed by the file's path
/// relative to the scan root (always `/`-separated). That key is also the
/// `File Name` of every record of the file.
#[derive(Default)]
pub struct ReferenceIndex {
    pub files: Arc<DashMap<String, Vec<ReferenceRecord>>>,
    /// Files that could not be read or decoded, with the reason.
    pub failures: Arc<DashMap<String, String>>,
}

impl ReferenceIndex {
    pub fn index_directory(root: impl AsRef<Path>, options: &IndexOptions) -> Self {
        let root = root.as_ref();
        let paths = find_all_sql_files(root, options);
        let cache = options
            .cache_dir
            .as_ref()
            .map(|dir| ExtractionCache::new(dir, CACHE_VERSION));

        let index = Self::default();
        paths.par_iter().for_each(|path| {
            let key = file_key(root, path);
            match index_file(path, &key, cache.as_ref()) {
                Ok(records) => {
                    debug!(file = %key, references = records.len(), "indexed");
                    index.files.insert(key, records);
                }
                Err(e) => {
                    warn!(file = %key, error = %e, "skipping SQL file");
                    index.failures.insert(key, e.to_string());
                }
            }
        });

        info!(
            root = %root.display(),
            files = index.files.len(),
            failures = index.failures.len(),
            "directory indexed"
        );
        index
    }

    /// Every record, files in key order, each file's records in
    /// first-occurrence order.
    pub fn records(&self) -> Vec<ReferenceRecord> {
        let mut keys: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys.iter()
            .filter_map(|key| self.files.get(key).map(|records| records.value().clone()))
            .flatten()
            .collect()
    }

    pub fn references_in(&self, file: &str) -> Option<Vec<ReferenceRecord>> {
        self.files.get(file).map(|records| records.value().clone())
    }

    /// Sorted keys of the files that reference `schema.table` (`schema` empty
    /// for unqualified references).
    pub fn files_referencing(&self, schema: &str, table: &str) -> Vec<String> {
        let mut hits: Vec<String> = self
            .files
            .iter()
            .filter(|entry| entry.value().iter().any(|r| r.key() == (schema, table)))
            .map(|entry| entry.key().clone())
            .collect();
        hits.sort();
        hits
    }

    pub fn to_json(&self) -> Result<String> {
        let files = self
            .files
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let failures = self
            .failures
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(serde_json::to_string(&IndexSnapshot { files, failures })?)
    }
}

fn index_file(path: &Path, key: &str, cache: Option<&ExtractionCache>) -> Result<Vec<ReferenceRecord>> {
    let bytes = std::fs::read(path)?;
    let sql = String::from_utf8(bytes)
        .map_err(|e| ExtractError::InvalidInput(format!("{key} is not valid UTF-8: {e}")))?;

    if let Some(records) = cache.and_then(|c| c.get(key, &sql)) {
        debug!(file = %key, "cache hit");
        return Ok(records);
    }

    let records = extract_references_tagged(&sql, Some(key));
    if let Some(cache) = cache {
        cache.set(key, &sql, &records);
    }
    Ok(records)
}

fn file_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    if relative.as_os_str().is_empty() {
        // root is the file itself
        return path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Files under `root` whose extension is one of `options.extensions`, sorted.
pub fn find_all_sql_files(root: impl AsRef<Path>, options: &IndexOptions) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !options.skip_dirs.iter().any(|d| entry.file_name() == d.as_str())
        })
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().is_some_and(|ext| {
                let ext = ext.to_string_lossy();
                options.extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
            })
        })
        .map(|entry| entry.into_path())
        .collect();
    out.sort();
    out
}
