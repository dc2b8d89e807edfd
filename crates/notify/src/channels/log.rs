//! Log notification channel.
//!
//! Writes each event through `tracing`, so a headless run still surfaces
//! sync outcomes on the console.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::ChannelError;
use crate::events::{NotifyEvent, Severity};
use crate::NotifyChannel;

/// Channel that emits events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl NotifyChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let title = event.title();
        let message = event.message();

        match event.severity() {
            Severity::Info => info!(title = %title, "{message}"),
            Severity::Warning => warn!(title = %title, "{message}"),
            Severity::Critical => error!(title = %title, "{message}"),
        }

        Ok(())
    }
}
