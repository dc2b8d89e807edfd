//! Bookmark sync crate for captured social-media posts.
//!
//! This crate provides:
//! - The captured content model ([`ContentRecord`])
//! - A classification cascade: cache, Gemini, keyword rules, default
//! - A Notion store client for persisting classified items
//! - Sync orchestration with bounded history and a durable retry queue

pub mod classify;
pub mod config;
pub mod content;
pub mod error;
pub mod storage;
pub mod store;
pub mod sync;

// Re-export main types
pub use classify::{AiClassifier, ClassificationCache, ClassificationResult, RuleClassifier};
pub use config::{Settings, StatePaths};
pub use content::{Author, ContentRecord, Media, MediaKind, Stats};
pub use error::{SyncError, SyncResult};
pub use store::{ContentStore, CreatedItem, NotionClient, StoreError};
pub use sync::{DrainSummary, RetryQueue, SyncHistory, SyncOrchestrator, SyncOutcome};
