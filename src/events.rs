//! Configuration event side channel.
//!
//! The config service does not drive the data plane itself. Instead it
//! announces what happened here, and the components that own the TCP
//! listener, the UART and the GPIO task subscribe and react (rebinding a
//! socket, reprogramming the baud rate, and so on).

use crate::restart::RestartReason;
use crate::state::{SectionName, SectionValue};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events buffered per subscriber before slow receivers start lagging.
const EVENT_BUFFER_SIZE: usize = 64;

/// Something subscribers may need to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigEvent {
    /// A section was committed and should take effect immediately.
    SectionApplied {
        section: SectionName,
        value: SectionValue,
        /// The TCP data port changed; the listener must be rebound.
        rebind_tcp_port: Option<u16>,
    },
    /// A section was committed but only takes effect after a restart.
    SectionStaged { section: SectionName },
    /// A restart was scheduled.
    RestartScheduled { reason: RestartReason },
    /// The device is about to go down; stop accepting connections.
    RestartImminent { reason: RestartReason },
}

/// Broadcast fan-out of [`ConfigEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ConfigEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    pub fn publish(&self, event: ConfigEvent) {
        // No receivers is fine; nobody needed to hear it.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
