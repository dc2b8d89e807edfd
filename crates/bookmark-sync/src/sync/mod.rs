//! Sync orchestration, history and the retry queue.

mod history;
mod orchestrator;
mod queue;

pub use history::{HistoryLog, SyncHistory, SyncRecord, HISTORY_LIMIT};
pub use orchestrator::{
    SkipReason, SyncConfig, SyncOrchestrator, SyncOutcome, SyncPhase, SyncReceipt,
};
pub use queue::{
    DrainReport, DrainSummary, FailedSyncItem, RetryQueue, RetryTransition, SyncReplay,
    MAX_RETRIES,
};
