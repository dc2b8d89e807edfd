//! Notification sink for bookmark sync outcomes.
//!
//! This crate provides a fire-and-forget notification system used to tell
//! the user that an item was synced, that a sync failed and was queued for
//! retry, or that the configuration is incomplete.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{Notifier, NotifyEvent};
//!
//! # async fn run() {
//! let notifier = Notifier::from_env();
//!
//! // Send a notification (fire-and-forget)
//! notifier.notify(NotifyEvent::SyncFailed {
//!     url: "https://x.com/someone/status/1".to_string(),
//!     error: "Notion API error: unauthorized".to_string(),
//!     timestamp: chrono::Utc::now(),
//! });
//! # }
//! ```
//!
//! # Configuration
//!
//! - `SLACK_WEBHOOK_URL`: Slack webhook URL (enables the Slack channel)
//! - `NOTIFY_DISABLED`: Set to "true" to disable all notifications
//!
//! The [`LogChannel`] is always enabled unless notifications are disabled.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::log::LogChannel;
pub use channels::slack::SlackChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::{NotifyEvent, Severity};

use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Central notification dispatcher.
///
/// The `Notifier` manages multiple notification channels and dispatches
/// events to all enabled channels in a fire-and-forget manner.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
    /// Deliveries spawned by [`Notifier::notify`] that may still be running.
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Notifier {
    /// Create a new notifier from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self::disabled();
        }

        let mut channels: Vec<Arc<dyn NotifyChannel>> = vec![Arc::new(LogChannel)];

        let slack = SlackChannel::from_env();
        if slack.enabled() {
            info!("Slack notifications enabled");
            channels.push(Arc::new(slack));
        }

        debug!(
            channel_count = channels.len(),
            "Notification system initialized"
        );

        Self::with_channels(channels)
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Send a notification to all enabled channels (fire-and-forget).
    ///
    /// Spawns one task per channel on the current Tokio runtime and returns
    /// immediately. Errors are logged but not propagated to the caller.
    pub fn notify(&self, event: NotifyEvent) {
        if !self.has_channels() {
            debug!("No active notification channels, skipping event");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime available, dropping notification");
            return;
        };

        let event = Arc::new(event);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|handle| !handle.is_finished());

        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let event = Arc::clone(&event);

            in_flight.push(runtime.spawn(async move {
                let channel_name = channel.name();

                if !channel.enabled() {
                    debug!(channel = channel_name, "Channel disabled, skipping");
                    return;
                }

                match channel.send(&event).await {
                    Ok(()) => {
                        debug!(channel = channel_name, "Notification sent");
                    }
                    Err(e) => {
                        error!(
                            channel = channel_name,
                            error = %e,
                            "Failed to send notification"
                        );
                    }
                }
            }));
        }
    }

    /// Wait for every delivery started by [`Notifier::notify`] to finish.
    ///
    /// Short-lived processes call this before exiting so that spawned
    /// deliveries are not dropped with the runtime.
    pub async fn flush(&self) {
        let pending: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in pending {
            if let Err(e) = handle.await {
                error!(error = %e, "Notification task failed");
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::from_env()
    }
}
