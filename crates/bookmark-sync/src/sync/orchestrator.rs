//! Sync orchestrator - fetch categories, classify, persist, record.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use notify::{Notifier, NotifyEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::history::{SyncHistory, SyncRecord};
use super::queue::{DrainSummary, RetryQueue, SyncReplay};
use crate::classify::{AiClassifier, ClassificationResult};
use crate::content::ContentRecord;
use crate::error::{SyncError, SyncResult};
use crate::store::{ContentStore, CreatedItem, StoreError};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// When off, new syncs are skipped. Replays ignore this flag.
    pub auto_sync_enabled: bool,
    /// Upper bound on each store call.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_enabled: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Stage of a single sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchingCategories,
    Classifying,
    Persisting,
    Succeeded,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingCategories => "fetching_categories",
            Self::Classifying => "classifying",
            Self::Persisting => "persisting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a sync did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutoSyncDisabled,
    MissingCredentials,
}

/// A stored item and the classification it was stored with.
#[derive(Debug, Clone)]
pub struct SyncReceipt {
    pub item: CreatedItem,
    pub classification: ClassificationResult,
}

/// Outcome of [`SyncOrchestrator::sync`].
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Synced(SyncReceipt),
    Skipped(SkipReason),
}

/// Result of the cancellable part of a sync.
enum Attempt {
    Persisted(SyncReceipt),
    Failed {
        classification: Option<ClassificationResult>,
        error: SyncError,
    },
}

/// Drives one record through the sync flow.
pub struct SyncOrchestrator {
    config: SyncConfig,
    store: Arc<dyn ContentStore>,
    classifier: Arc<AiClassifier>,
    history: Arc<SyncHistory>,
    queue: Arc<RetryQueue>,
    notifier: Arc<Notifier>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn ContentStore>,
        classifier: Arc<AiClassifier>,
        history: Arc<SyncHistory>,
        queue: Arc<RetryQueue>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            classifier,
            history,
            queue,
            notifier,
        }
    }

    pub fn history(&self) -> &Arc<SyncHistory> {
        &self.history
    }

    pub fn queue(&self) -> &Arc<RetryQueue> {
        &self.queue
    }

    /// Sync one captured record.
    ///
    /// Persistence failures are queued for retry and returned as
    /// [`SyncError::Persistence`].
    pub async fn sync(&self, record: &ContentRecord) -> SyncResult<SyncOutcome> {
        self.sync_with_cancel(record, &CancellationToken::new())
            .await
    }

    /// Like [`sync`](Self::sync), aborting when `cancel` fires.
    ///
    /// A cancelled record is queued for retry so it is not lost.
    pub async fn sync_with_cancel(
        &self,
        record: &ContentRecord,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncOutcome> {
        if !self.config.auto_sync_enabled {
            info!(url = %record.url, "Auto-sync disabled, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::AutoSyncDisabled));
        }

        if let Err(e) = self.ensure_configured() {
            warn!(error = %e, "Store not configured, skipping sync");
            self.notifier.notify(NotifyEvent::ConfigurationError {
                message: e.to_string(),
                timestamp: Utc::now(),
            });
            return Ok(SyncOutcome::Skipped(SkipReason::MissingCredentials));
        }

        // Only the steps up to the store write race the token. Once the item
        // exists it is reported as synced.
        let attempt = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(url = %record.url, "Sync cancelled");
                Attempt::Failed {
                    classification: None,
                    error: SyncError::Cancelled,
                }
            }
            attempt = self.attempt(record) => attempt,
        };
        let result = self.finish(record, attempt).await;

        match result {
            Ok(receipt) => Ok(SyncOutcome::Synced(receipt)),
            Err(e) => {
                if e.is_retryable() {
                    if let Err(queue_err) = self.queue.enqueue(record.clone(), e.to_string()).await {
                        warn!(error = %queue_err, "Failed to persist retry queue");
                    }
                }
                Err(e)
            }
        }
    }

    /// Replay every queued record once.
    pub async fn retry_failed(&self) -> Result<DrainSummary> {
        let report = self.queue.drain(self).await?;

        for item in &report.dropped {
            self.notifier.notify(NotifyEvent::RetryAbandoned {
                url: item.record.url.clone(),
                attempts: item.retry_count,
                error: item.error.clone(),
                timestamp: Utc::now(),
            });
        }

        let summary = report.summary;
        if summary.total > 0 {
            self.notifier.notify(NotifyEvent::RetryCompleted {
                succeeded: summary.succeeded,
                failed: summary.failed,
                total: summary.total,
                timestamp: Utc::now(),
            });
        }
        Ok(summary)
    }

    fn ensure_configured(&self) -> SyncResult<()> {
        if self.store.is_configured() {
            Ok(())
        } else {
            Err(SyncError::Configuration(
                "Notion API key and database ID must be configured".to_string(),
            ))
        }
    }

    /// Fetch categories, classify and create the store item.
    async fn attempt(&self, record: &ContentRecord) -> Attempt {
        let mut phase = SyncPhase::Idle;
        advance(&mut phase, SyncPhase::FetchingCategories, record);
        let categories = self.fetch_categories().await;

        advance(&mut phase, SyncPhase::Classifying, record);
        let classification = self.classifier.classify(record, &categories).await;

        advance(&mut phase, SyncPhase::Persisting, record);
        let error = match tokio::time::timeout(
            self.config.request_timeout,
            self.store.create_item(record, &classification),
        )
        .await
        {
            Ok(Ok(item)) => {
                advance(&mut phase, SyncPhase::Succeeded, record);
                return Attempt::Persisted(SyncReceipt {
                    item,
                    classification,
                });
            }
            Ok(Err(e)) => SyncError::Persistence(e.to_string()),
            Err(_) => SyncError::Persistence(format!(
                "store request timed out after {:?}",
                self.config.request_timeout
            )),
        };

        advance(&mut phase, SyncPhase::Failed, record);
        Attempt::Failed {
            classification: Some(classification),
            error,
        }
    }

    /// Record the outcome of an attempt in history and notify.
    async fn finish(&self, record: &ContentRecord, attempt: Attempt) -> SyncResult<SyncReceipt> {
        match attempt {
            Attempt::Persisted(receipt) => {
                self.record_success(record, &receipt.classification, &receipt.item)
                    .await;
                Ok(receipt)
            }
            Attempt::Failed {
                classification,
                error,
            } => {
                self.record_failure(record, classification.as_ref(), &error)
                    .await;
                Err(error)
            }
        }
    }

    /// Current vocabulary, or empty when the store can't provide it.
    async fn fetch_categories(&self) -> Vec<String> {
        let fetched = tokio::time::timeout(
            self.config.request_timeout,
            self.store.existing_categories(),
        )
        .await
        .unwrap_or_else(|_| {
            Err(StoreError::Request(format!(
                "timed out after {:?}",
                self.config.request_timeout
            )))
        });

        match fetched {
            Ok(categories) => {
                debug!(count = categories.len(), "Fetched existing categories");
                categories
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch categories, classifying without them");
                Vec::new()
            }
        }
    }

    async fn record_success(
        &self,
        record: &ContentRecord,
        classification: &ClassificationResult,
        created: &CreatedItem,
    ) {
        let entry = SyncRecord::succeeded(record, classification, created.id.clone());
        if let Err(e) = self.history.append(entry).await {
            warn!(error = %e, "Failed to persist sync history");
        }

        self.notifier.notify(NotifyEvent::SyncSucceeded {
            url: record.url.clone(),
            category: classification.category.clone(),
            confidence: classification.confidence,
            item_id: created.id.clone(),
            timestamp: Utc::now(),
        });
    }

    async fn record_failure(
        &self,
        record: &ContentRecord,
        classification: Option<&ClassificationResult>,
        error: &SyncError,
    ) {
        let entry = SyncRecord::failed(record, classification, error.to_string());
        if let Err(e) = self.history.append(entry).await {
            warn!(error = %e, "Failed to persist sync history");
        }

        self.notifier.notify(NotifyEvent::SyncFailed {
            url: record.url.clone(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

fn advance(phase: &mut SyncPhase, next: SyncPhase, record: &ContentRecord) {
    debug!(url = %record.url, from = %phase, to = %next, "Sync phase transition");
    *phase = next;
}

#[async_trait]
impl SyncReplay for SyncOrchestrator {
    /// Re-run the full flow without the auto-sync guard and without
    /// enqueueing on failure.
    async fn replay(&self, record: &ContentRecord) -> Result<(), SyncError> {
        self.ensure_configured()?;
        let attempt = self.attempt(record).await;
        self.finish(record, attempt).await.map(|_| ())
    }
}
