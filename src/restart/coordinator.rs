//! Restart sequencing.
//!
//! ```text
//! Idle ──schedule──> ScheduleRequested ──deadline──> Draining ──> Restarting ──> (process ends)
//!  ^                                                                  │
//!  └──────────── primitive failed, or the device outlived it ─────────┘
//! ```
//!
//! Only one sequence runs per process. Scheduling while a sequence is under
//! way returns the existing status. Once `Restarting` is entered there is no
//! cancellation. A primitive that returns success but leaves this process
//! running for longer than `restart_timeout` counts as a failed restart.

use super::error::RestartError;
use super::platform::RestartPlatform;
use super::{RestartPhase, RestartReason, RestartStatus};
use crate::events::{ConfigEvent, EventBus};
use crate::store::ConfigStore;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timing of the restart sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSettings {
    /// Time between scheduling and draining, so in-flight responses
    /// (including the one that triggered the restart) reach the client.
    pub drain_delay: Duration,
    /// Upper bound on waiting for in-flight mutations once draining.
    pub drain_timeout: Duration,
    /// Advertised to clients whose mutations are refused while draining.
    pub retry_after: Duration,
    /// How long the process may outlive a successful restart primitive before
    /// the restart is reported as failed.
    pub restart_timeout: Duration,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_millis(2000),
            drain_timeout: Duration::from_millis(3000),
            retry_after: Duration::from_secs(10),
            restart_timeout: Duration::from_secs(120),
        }
    }
}

/// Result of a schedule request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// False when a restart was already under way and this call was a no-op.
    pub newly_scheduled: bool,
    pub status: RestartStatus,
}

/// Coordinates the controlled restart of the device.
///
/// Clones share the same state machine.
#[derive(Debug, Clone)]
pub struct RestartCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    status: Mutex<RestartStatus>,
    transitions: watch::Sender<RestartStatus>,
    inflight: AtomicUsize,
    drained: Notify,
    platform: Arc<dyn RestartPlatform>,
    store: Arc<ConfigStore>,
    events: EventBus,
    settings: RestartSettings,
}

/// Held for the duration of one configuration mutation.
///
/// While any guard is alive the coordinator waits (up to its drain timeout)
/// before restarting.
#[derive(Debug)]
pub struct MutationGuard {
    inner: Arc<Inner>,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if self.inner.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_one();
        }
    }
}

impl RestartCoordinator {
    pub fn new(
        platform: Arc<dyn RestartPlatform>,
        store: Arc<ConfigStore>,
        events: EventBus,
        settings: RestartSettings,
    ) -> Self {
        let (transitions, _) = watch::channel(RestartStatus::idle());
        Self {
            inner: Arc::new(Inner {
                status: Mutex::new(RestartStatus::idle()),
                transitions,
                inflight: AtomicUsize::new(0),
                drained: Notify::new(),
                platform,
                store,
                events,
                settings,
            }),
        }
    }

    pub fn status(&self) -> RestartStatus {
        self.inner.status.lock().clone()
    }

    pub fn settings(&self) -> &RestartSettings {
        &self.inner.settings
    }

    /// Watch every phase transition.
    pub fn subscribe(&self) -> watch::Receiver<RestartStatus> {
        self.inner.transitions.subscribe()
    }

    /// Request a restart.
    ///
    /// From `Idle` this starts the sequence in the background. In any other
    /// phase it changes nothing and returns the sequence already under way.
    /// Must be called from within a Tokio runtime.
    pub fn schedule_restart(&self, reason: RestartReason) -> ScheduleOutcome {
        let status = {
            let mut status = self.inner.status.lock();
            if status.phase != RestartPhase::Idle {
                debug!(
                    %reason,
                    phase = ?status.phase,
                    "restart already scheduled, ignoring request"
                );
                return ScheduleOutcome {
                    newly_scheduled: false,
                    status: status.clone(),
                };
            }

            let now = Utc::now();
            let drain_delay = chrono::Duration::from_std(self.inner.settings.drain_delay)
                .unwrap_or_else(|_| chrono::Duration::zero());
            status.phase = RestartPhase::ScheduleRequested;
            status.reason = Some(reason);
            status.request_id = Some(Uuid::new_v4());
            status.requested_at = Some(now);
            status.drain_deadline = Some(now + drain_delay);
            self.inner.transitions.send_replace(status.clone());
            status.clone()
        };

        info!(
            %reason,
            request_id = ?status.request_id,
            drain_ms = self.inner.settings.drain_delay.as_millis() as u64,
            "restart scheduled"
        );
        self.inner
            .events
            .publish(ConfigEvent::RestartScheduled { reason });

        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.run_sequence(reason).await {
                error!(error = %e, "restart sequence failed");
            }
        });

        ScheduleOutcome {
            newly_scheduled: true,
            status,
        }
    }

    /// Register a configuration mutation.
    ///
    /// Refused with [`RestartError::Pending`] once draining has begun.
    pub fn begin_mutation(&self) -> Result<MutationGuard, RestartError> {
        let status = self.inner.status.lock();
        match status.phase {
            RestartPhase::Draining | RestartPhase::Restarting => Err(RestartError::Pending {
                retry_after: self.inner.settings.retry_after,
            }),
            RestartPhase::Idle | RestartPhase::ScheduleRequested => {
                self.inner.inflight.fetch_add(1, Ordering::SeqCst);
                Ok(MutationGuard {
                    inner: self.inner.clone(),
                })
            }
        }
    }

    /// Mutations currently holding a guard.
    pub fn mutations_in_flight(&self) -> usize {
        self.inner.inflight.load(Ordering::SeqCst)
    }

    async fn run_sequence(&self, reason: RestartReason) -> Result<(), RestartError> {
        let request_id = self.inner.status.lock().request_id;
        tokio::time::sleep(self.inner.settings.drain_delay).await;

        self.transition(RestartPhase::Draining);
        self.wait_for_mutations().await;

        if let Err(e) = self.inner.store.flush() {
            // Every commit was already durable; the flush only hurries the OS.
            warn!(error = %e, "flushing configuration before restart failed");
        }

        self.inner
            .events
            .publish(ConfigEvent::RestartImminent { reason });
        self.transition(RestartPhase::Restarting);

        let platform = self.inner.platform.clone();
        let platform_name = platform.name();
        info!(%reason, platform = platform_name, "invoking restart primitive");
        let result = tokio::task::spawn_blocking(move || platform.restart())
            .await
            .map_err(|e| RestartError::platform(format!("restart task aborted: {e}")))
            .and_then(|r| r);

        if let Err(e) = result {
            return Err(self.fail(reason, e.to_string()));
        }

        let timeout = self.inner.settings.restart_timeout;
        info!(
            %reason,
            timeout_secs = timeout.as_secs(),
            "restart primitive returned; waiting for the device to go down"
        );
        tokio::time::sleep(timeout).await;

        let still_restarting = {
            let status = self.inner.status.lock();
            status.phase == RestartPhase::Restarting && status.request_id == request_id
        };
        if !still_restarting {
            return Ok(());
        }
        Err(self.fail(
            reason,
            format!(
                "`{platform_name}` restart returned but the device was still running after {timeout:?}"
            ),
        ))
    }

    /// Return to `Idle`, recording why the restart did not happen.
    fn fail(&self, reason: RestartReason, message: String) -> RestartError {
        let failure = RestartError::Failed { reason, message };
        let mut status = self.inner.status.lock();
        *status = RestartStatus {
            last_error: Some(failure.to_string()),
            ..RestartStatus::idle()
        };
        self.inner.transitions.send_replace(status.clone());
        failure
    }

    async fn wait_for_mutations(&self) {
        let drained = async {
            while self.inner.inflight.load(Ordering::SeqCst) > 0 {
                self.inner.drained.notified().await;
            }
        };

        if tokio::time::timeout(self.inner.settings.drain_timeout, drained)
            .await
            .is_err()
        {
            warn!(
                in_flight = self.mutations_in_flight(),
                "drain timeout elapsed with mutations still in flight, restarting anyway"
            );
        }
    }

    fn transition(&self, phase: RestartPhase) {
        let mut status = self.inner.status.lock();
        debug!(from = ?status.phase, to = ?phase, "restart phase transition");
        status.phase = phase;
        self.inner.transitions.send_replace(status.clone());
    }
}
