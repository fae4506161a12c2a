//! Controlled device restart.
//!
//! Network changes only take effect after a reboot. The coordinator lets the
//! response that triggered the reboot reach the client, stops accepting
//! configuration changes, waits for in-flight ones, flushes storage and then
//! invokes the platform restart primitive.

pub mod coordinator;
pub mod error;
pub mod platform;

pub use coordinator::{MutationGuard, RestartCoordinator, RestartSettings, ScheduleOutcome};
pub use error::RestartError;
pub use platform::{CommandRestart, ExitProcess, MockRestart, RestartPlatform};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a restart was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartReason {
    NetworkConfigChanged,
    Manual,
    FactoryReset,
}

impl RestartReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkConfigChanged => "network-config-changed",
            Self::Manual => "manual",
            Self::FactoryReset => "factory-reset",
        }
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the restart state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    #[default]
    Idle,
    ScheduleRequested,
    Draining,
    Restarting,
}

impl RestartPhase {
    /// Whether a restart is scheduled or under way.
    pub fn is_pending(self) -> bool {
        self != Self::Idle
    }
}

/// Snapshot of the restart state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RestartStatus {
    pub phase: RestartPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RestartReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_deadline: Option<DateTime<Utc>>,
    /// Failure of the most recent restart attempt, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RestartStatus {
    pub fn idle() -> Self {
        Self::default()
    }
}
