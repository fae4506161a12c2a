//! Restart error types.

use super::RestartReason;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the restart coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestartError {
    /// A restart is draining; configuration changes are refused until the
    /// device is back.
    #[error("Device is restarting; retry in {} seconds", .retry_after.as_secs())]
    Pending { retry_after: Duration },

    /// The platform restart primitive failed, or returned without the device
    /// going down. The configuration that prompted the restart is still
    /// committed; restart the device by hand.
    #[error("Restart ({reason}) failed: {message}. Configuration is saved; restart the device manually")]
    Failed {
        reason: RestartReason,
        message: String,
    },

    /// Raised by a platform primitive.
    #[error("{0}")]
    Platform(String),
}

impl RestartError {
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform(message.into())
    }
}
