//! Durable queue of syncs that failed to persist.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::content::ContentRecord;
use crate::error::SyncError;
use crate::storage;

/// Unsuccessful retries after which an item is dropped.
pub const MAX_RETRIES: u32 = 5;

/// A record waiting to be synced again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSyncItem {
    pub id: Uuid,
    pub record: ContentRecord,
    /// Message from the most recent failure.
    pub error: String,
    /// When the item was first queued.
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

impl FailedSyncItem {
    pub fn new(record: ContentRecord, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            error: error.into(),
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    /// What happens to this item after one replay.
    pub fn transition(&self, outcome: &Result<(), SyncError>) -> RetryTransition {
        match outcome {
            Ok(()) => RetryTransition::Resolved,
            Err(e) => {
                let retry_count = self.retry_count + 1;
                let error = e.to_string();
                if retry_count >= MAX_RETRIES {
                    RetryTransition::Dropped { retry_count, error }
                } else {
                    RetryTransition::Pending { retry_count, error }
                }
            }
        }
    }
}

/// Per-item result of a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTransition {
    /// Replay succeeded; remove the item.
    Resolved,
    /// Replay failed; keep the item with the new count.
    Pending { retry_count: u32, error: String },
    /// Replay failed for the last allowed time; remove the item.
    Dropped { retry_count: u32, error: String },
}

/// Counts from one drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

/// Result of a drain, including items that were given up on.
#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    pub summary: DrainSummary,
    /// Items removed after their final failed retry, with the final count.
    pub dropped: Vec<FailedSyncItem>,
}

/// Re-runs the sync flow for a queued record.
#[async_trait]
pub trait SyncReplay: Send + Sync {
    async fn replay(&self, record: &ContentRecord) -> Result<(), SyncError>;
}

/// Shared, optionally persisted retry queue.
///
/// Mutations happen under one lock and the file is rewritten before the
/// lock is released. Drains are serialized; a drain works on a snapshot so
/// items enqueued while it runs wait for the next drain.
pub struct RetryQueue {
    items: Mutex<Vec<FailedSyncItem>>,
    drain_guard: Mutex<()>,
    path: Option<PathBuf>,
}

impl RetryQueue {
    /// Open the queue file, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items: Vec<FailedSyncItem> = storage::read_json_or_default(&path).await?;
        if !items.is_empty() {
            info!(pending = items.len(), "Loaded retry queue");
        }
        Ok(Self {
            items: Mutex::new(items),
            drain_guard: Mutex::new(()),
            path: Some(path),
        })
    }

    /// Queue that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            drain_guard: Mutex::new(()),
            path: None,
        }
    }

    /// Add a record with `retry_count = 0`. Returns the new item's ID.
    pub async fn enqueue(&self, record: ContentRecord, error: impl Into<String>) -> Result<Uuid> {
        let item = FailedSyncItem::new(record, error);
        let id = item.id;
        info!(url = %item.record.url, error = %item.error, "Queued failed sync for retry");

        let mut items = self.items.lock().await;
        items.push(item);
        self.persist(&items).await?;
        Ok(id)
    }

    pub async fn snapshot(&self) -> Vec<FailedSyncItem> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Replay every item present when the drain starts, once.
    pub async fn drain(&self, runner: &dyn SyncReplay) -> Result<DrainReport> {
        let _drain = self.drain_guard.lock().await;
        let snapshot = self.snapshot().await;

        let mut report = DrainReport::default();
        report.summary.total = snapshot.len();
        if snapshot.is_empty() {
            return Ok(report);
        }

        info!(total = snapshot.len(), "Retrying failed syncs");

        let mut transitions = Vec::with_capacity(snapshot.len());
        for item in snapshot {
            let outcome = runner.replay(&item.record).await;
            let transition = item.transition(&outcome);

            match &transition {
                RetryTransition::Resolved => {
                    report.summary.succeeded += 1;
                    info!(url = %item.record.url, "Retry succeeded");
                }
                RetryTransition::Pending { retry_count, error } => {
                    report.summary.failed += 1;
                    warn!(url = %item.record.url, retry_count, error = %error, "Retry failed");
                }
                RetryTransition::Dropped { retry_count, error } => {
                    report.summary.failed += 1;
                    error!(
                        url = %item.record.url,
                        retry_count,
                        error = %error,
                        "Retry limit reached, dropping item"
                    );
                    report.dropped.push(FailedSyncItem {
                        retry_count: *retry_count,
                        error: error.clone(),
                        ..item.clone()
                    });
                }
            }
            transitions.push((item.id, transition));
        }

        let mut items = self.items.lock().await;
        for (id, transition) in transitions {
            match transition {
                RetryTransition::Resolved | RetryTransition::Dropped { .. } => {
                    items.retain(|i| i.id != id);
                }
                RetryTransition::Pending { retry_count, error } => {
                    if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                        item.retry_count = retry_count;
                        item.error = error;
                    }
                }
            }
        }
        self.persist(&items).await?;

        info!(
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            total = report.summary.total,
            "Retry drain complete"
        );
        Ok(report)
    }

    async fn persist(&self, items: &[FailedSyncItem]) -> Result<()> {
        if let Some(path) = &self.path {
            storage::write_json(path, &items).await?;
        }
        Ok(())
    }
}
