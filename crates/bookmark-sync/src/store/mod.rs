//! Structured store that classified items are written to.

mod notion;

pub use notion::{format_number, DatabaseInfo, NotionClient, NotionConfig, NOTION_VERSION};

use async_trait::async_trait;
use thiserror::Error;

use crate::classify::ClassificationResult;
use crate::content::ContentRecord;

/// Errors returned by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store credentials not configured")]
    NotConfigured,

    #[error("store request failed: {0}")]
    Request(String),

    /// The store answered with a non-success status.
    #[error("Notion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected store response: {0}")]
    Response(String),
}

/// Reference to an item created in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedItem {
    pub id: String,
    pub url: Option<String>,
}

/// A store that accepts classified records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether credentials are present. Checked before a sync starts.
    fn is_configured(&self) -> bool;

    /// Current category vocabulary, in store order.
    async fn existing_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Create one item for a classified record.
    async fn create_item(
        &self,
        record: &ContentRecord,
        classification: &ClassificationResult,
    ) -> Result<CreatedItem, StoreError>;
}
