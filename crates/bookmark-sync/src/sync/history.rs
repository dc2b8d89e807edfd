//! Bounded log of sync attempts, newest first.

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::classify::ClassificationResult;
use crate::content::ContentRecord;
use crate::storage;

/// Maximum number of entries kept.
pub const HISTORY_LIMIT: usize = 100;

/// Characters of post text kept in an entry.
const PREVIEW_CHARS: usize = 80;

/// One sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub url: String,
    pub text_preview: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    /// ID of the created store item, present on success.
    #[serde(default)]
    pub item_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncRecord {
    pub fn succeeded(
        record: &ContentRecord,
        classification: &ClassificationResult,
        item_id: impl Into<String>,
    ) -> Self {
        Self {
            url: record.url.clone(),
            text_preview: record.preview(PREVIEW_CHARS),
            category: classification.category.clone(),
            confidence: classification.confidence,
            item_id: Some(item_id.into()),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        record: &ContentRecord,
        classification: Option<&ClassificationResult>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: record.url.clone(),
            text_preview: record.preview(PREVIEW_CHARS),
            category: classification.and_then(|c| c.category.clone()),
            confidence: classification.map_or(0.0, |c| c.confidence),
            item_id: None,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Persisted form of the history.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HistoryLog {
    #[serde(default)]
    entries: VecDeque<SyncRecord>,
}

impl HistoryLog {
    /// Insert at the front, dropping the oldest entry past the limit.
    pub fn push(&mut self, entry: SyncRecord) {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn entries(&self) -> impl Iterator<Item = &SyncRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, optionally persisted sync history.
///
/// Every append is a read-modify-write under one lock, and the file is
/// rewritten before the lock is released.
pub struct SyncHistory {
    log: Mutex<HistoryLog>,
    path: Option<PathBuf>,
}

impl SyncHistory {
    /// Open the history file, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut log: HistoryLog = storage::read_json_or_default(&path).await?;
        log.entries.truncate(HISTORY_LIMIT);
        Ok(Self {
            log: Mutex::new(log),
            path: Some(path),
        })
    }

    /// History that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            log: Mutex::new(HistoryLog::default()),
            path: None,
        }
    }

    pub async fn append(&self, entry: SyncRecord) -> Result<()> {
        let mut log = self.log.lock().await;
        log.push(entry);
        if let Some(path) = &self.path {
            storage::write_json(path, &*log).await?;
        }
        Ok(())
    }

    /// Up to `limit` entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<SyncRecord> {
        self.log.lock().await.entries().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.is_empty()
    }
}
