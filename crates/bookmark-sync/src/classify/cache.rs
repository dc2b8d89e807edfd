//! Classification cache keyed by a content fingerprint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::result::ClassificationResult;

/// How long a cached classification stays valid.
pub const CACHE_TTL_DAYS: i64 = 7;

/// Number of leading characters that feed the fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// Deterministic fingerprint of a record's text.
///
/// Hashes the first [`FINGERPRINT_PREFIX_CHARS`] characters of the trimmed
/// text with a 32-bit shift-subtract-add rolling hash. Two texts sharing
/// that prefix collide on purpose.
pub fn fingerprint(text: &str) -> String {
    let hash = text
        .trim()
        .chars()
        .take(FINGERPRINT_PREFIX_CHARS)
        .fold(0_i32, |hash, c| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(c as i32)
        });
    hash.to_string()
}

/// A cached result with its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: ClassificationResult,
    pub created_at: DateTime<Utc>,
}

/// On-disk layout of the cache file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
}

/// In-memory map from fingerprint to classification.
///
/// Entries older than the TTL are treated as absent and replaced on the
/// next write. Safe to share across tasks.
pub struct ClassificationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ClassificationCache {
    /// Create an empty cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::days(CACHE_TTL_DAYS))
    }

    /// Create an empty cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Load a cache file, dropping expired entries. A missing file yields
    /// an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        let cache = Self::new();
        if !path.exists() {
            return Ok(cache);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file {}", path.display()))?;
        let file: CacheFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file {}", path.display()))?;

        let now = Utc::now();
        let fresh: HashMap<_, _> = file
            .entries
            .into_iter()
            .filter(|(_, entry)| now - entry.created_at < cache.ttl)
            .collect();
        debug!(entries = fresh.len(), "Loaded classification cache");

        *cache.entries.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(cache)
    }

    /// Write the cache to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a fresh entry.
    pub fn get(&self, key: &str) -> Option<ClassificationResult> {
        self.get_at(key, Utc::now())
    }

    /// Look up an entry as of `now`.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<ClassificationResult> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| now - entry.created_at < self.ttl)
            .map(|entry| entry.result.clone())
    }

    /// Store a result, replacing any existing entry.
    pub fn put(&self, key: impl Into<String>, result: ClassificationResult) {
        self.put_at(key, result, Utc::now());
    }

    /// Store a result stamped with `now`.
    pub fn put_at(&self, key: impl Into<String>, result: ClassificationResult, now: DateTime<Utc>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.into(),
                CacheEntry {
                    result,
                    created_at: now,
                },
            );
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new()
    }
}
