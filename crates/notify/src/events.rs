//! Notification event types for bookmark sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A captured item was persisted to the store
    SyncSucceeded {
        url: String,
        category: Option<String>,
        confidence: f32,
        item_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// Persisting a captured item failed; it was queued for retry
    SyncFailed {
        url: String,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// Required credentials are missing
    ConfigurationError {
        message: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A queued item exhausted its retries and was dropped
    RetryAbandoned {
        url: String,
        attempts: u32,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A retry pass over the failed-sync queue finished
    RetryCompleted {
        succeeded: usize,
        failed: usize,
        total: usize,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Get a short title for this event type.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::SyncSucceeded { .. } => "Bookmark Synced".to_string(),
            Self::SyncFailed { .. } => "Sync Failed".to_string(),
            Self::ConfigurationError { .. } => "Configuration Error".to_string(),
            Self::RetryAbandoned { attempts, .. } => {
                format!("Sync Abandoned After {attempts} Retries")
            }
            Self::RetryCompleted { .. } => "Retry Finished".to_string(),
        }
    }

    /// Get the human-readable message body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::SyncSucceeded { category, .. } => format!(
                "Saved to category: {}",
                category.as_deref().unwrap_or("(none)")
            ),
            Self::SyncFailed { error, .. } => error.clone(),
            Self::ConfigurationError { message, .. } => message.clone(),
            Self::RetryAbandoned { url, error, .. } => format!("{url}\nLast error: {error}"),
            Self::RetryCompleted {
                succeeded,
                failed,
                total,
                ..
            } => format!("{succeeded} succeeded, {failed} failed, {total} total"),
        }
    }

    /// Get the severity for this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SyncSucceeded { .. } => Severity::Info,
            Self::RetryCompleted { failed, .. } => {
                if *failed == 0 {
                    Severity::Info
                } else {
                    Severity::Warning
                }
            }
            Self::SyncFailed { .. } => Severity::Warning,
            Self::ConfigurationError { .. } | Self::RetryAbandoned { .. } => Severity::Critical,
        }
    }

    /// Get the timestamp for this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SyncSucceeded { timestamp, .. }
            | Self::SyncFailed { timestamp, .. }
            | Self::ConfigurationError { timestamp, .. }
            | Self::RetryAbandoned { timestamp, .. }
            | Self::RetryCompleted { timestamp, .. } => *timestamp,
        }
    }
}
