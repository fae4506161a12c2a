//! Service layer for device configuration.
//!
//! All configuration reads and updates flow through `ConfigService`, which
//! keeps the HTTP handlers free of merge, validation and restart logic.
//!
//! # Architecture
//!
//! ```text
//! REST API ──> ConfigService ──┬──> ConfigStore (durable, RwLock snapshot)
//!                              ├──> RestartCoordinator (network changes)
//!                              └──> EventBus (live apply for comm / gpio)
//! ```
//!
//! Every update follows the same path: merge the partial payload onto the
//! current section, validate the merged candidate as a whole, commit it, then
//! either apply it live or schedule a restart.

use crate::{
    events::{ConfigEvent, EventBus},
    restart::{RestartCoordinator, RestartError, RestartReason, RestartStatus, ScheduleOutcome},
    state::{
        CommConfig, CommPatch, DeviceConfig, GpioConfig, GpioPatch, NetworkConfig, NetworkPatch,
        SectionName, SectionValue, UnknownSection,
    },
    store::{ConfigStore, StoreError},
    validation::{validate_comm, validate_gpio, validate_network, ValidationError, ValidationPolicy},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

// ========== Error Types ==========

/// Errors returned by configuration operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The merged candidate was rejected; nothing was committed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The payload is not a JSON object or a field has the wrong type.
    #[error("The request payload is invalid: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    UnknownSection(#[from] UnknownSection),

    /// A restart is draining; retry once the device is back.
    #[error("Device is restarting; retry in {} seconds", .retry_after.as_secs())]
    RestartPending { retry_after: Duration },

    /// The durable write failed; the previous value is still in effect.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The last restart attempt failed. Configuration stays committed.
    #[error("{0}")]
    RestartFailed(String),
}

impl From<RestartError> for ServiceError {
    fn from(err: RestartError) -> Self {
        match err {
            RestartError::Pending { retry_after } => Self::RestartPending { retry_after },
            other => Self::RestartFailed(other.to_string()),
        }
    }
}

/// Convenient Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ========== Result DTOs ==========

/// Result of updating one section.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub section: SectionName,
    /// The request was accepted and committed.
    pub applied: bool,
    /// Whether the committed value differs from the previous one.
    pub changed: bool,
    /// The change only takes effect after the device restarts.
    pub restart_required: bool,
    /// The section as committed.
    pub value: SectionValue,
    pub restart: RestartStatus,
}

/// Result of a factory reset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResetOutcome {
    pub config: DeviceConfig,
    pub restart: RestartStatus,
}

// ========== Service Implementation ==========

/// One in-flight update per section; sections never block each other.
#[derive(Debug, Default)]
struct SectionLocks {
    network: Mutex<()>,
    comm: Mutex<()>,
    gpio: Mutex<()>,
}

impl SectionLocks {
    fn get(&self, section: SectionName) -> &Mutex<()> {
        match section {
            SectionName::Network => &self.network,
            SectionName::Comm => &self.comm,
            SectionName::Gpio => &self.gpio,
        }
    }
}

#[derive(Debug)]
struct ServiceInner {
    store: Arc<ConfigStore>,
    policy: ValidationPolicy,
    restart: RestartCoordinator,
    events: EventBus,
    locks: SectionLocks,
}

/// Configuration service shared by every API handler. Clones are cheap.
#[derive(Debug, Clone)]
pub struct ConfigService {
    inner: Arc<ServiceInner>,
}

impl ConfigService {
    /// Create the service and audit the stored configuration.
    ///
    /// A stored section that no longer passes validation (for example after
    /// the policy was tightened) is reported but left in place.
    pub fn new(
        store: Arc<ConfigStore>,
        policy: ValidationPolicy,
        restart: RestartCoordinator,
        events: EventBus,
    ) -> Self {
        let service = Self {
            inner: Arc::new(ServiceInner {
                store,
                policy,
                restart,
                events,
                locks: SectionLocks::default(),
            }),
        };
        for (section, err) in service.audit() {
            warn!(%section, error = %err, "stored configuration fails validation");
        }
        service
    }

    /// Validate every stored section against the current policy.
    pub fn audit(&self) -> Vec<(SectionName, ValidationError)> {
        let config = self.inner.store.snapshot();
        let policy = &self.inner.policy;
        let mut findings = Vec::new();

        if let Err(e) = validate_network(config.network.clone()) {
            findings.push((SectionName::Network, e));
        }
        if let Err(e) = validate_comm(CommPatch::default().merge(&config.comm), policy) {
            findings.push((SectionName::Comm, e));
        }
        if let Err(e) = validate_gpio(GpioPatch::default().merge(&config.gpio), policy) {
            findings.push((SectionName::Gpio, e));
        }
        findings
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.inner.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn restart_coordinator(&self) -> &RestartCoordinator {
        &self.inner.restart
    }

    // ---------- Reads ----------

    /// Current value of the named section (`network`, `comm`/`control`, `gpio`).
    pub fn get_section(&self, name: &str) -> ServiceResult<SectionValue> {
        let section: SectionName = name.parse()?;
        Ok(self.inner.store.get(section))
    }

    pub fn network(&self) -> NetworkConfig {
        self.inner.store.network()
    }

    pub fn comm(&self) -> CommConfig {
        self.inner.store.comm()
    }

    pub fn gpio(&self) -> GpioConfig {
        self.inner.store.gpio()
    }

    pub fn snapshot(&self) -> DeviceConfig {
        self.inner.store.snapshot()
    }

    pub fn restart_status(&self) -> RestartStatus {
        self.inner.restart.status()
    }

    /// The restart status, or the failure of the last attempt if it failed.
    pub fn restart_report(&self) -> ServiceResult<RestartStatus> {
        let status = self.inner.restart.status();
        match &status.last_error {
            Some(message) if !status.phase.is_pending() => {
                Err(ServiceError::RestartFailed(message.clone()))
            }
            _ => Ok(status),
        }
    }

    // ---------- Updates ----------

    /// Apply a partial JSON payload to the named section.
    ///
    /// # Errors
    ///
    /// - `ServiceError::UnknownSection` if `name` is not a known section
    /// - `ServiceError::InvalidPayload` if the payload is not an object or a field has the wrong type
    /// - `ServiceError::Validation` if the merged section is rejected
    /// - `ServiceError::RestartPending` while a restart is draining
    /// - `ServiceError::Storage` if the durable write fails
    pub async fn update_section(&self, name: &str, payload: Value) -> ServiceResult<UpdateOutcome> {
        let section: SectionName = name.parse()?;
        if !payload.is_object() {
            return Err(ServiceError::InvalidPayload(
                "expected a JSON object".to_string(),
            ));
        }

        match section {
            SectionName::Network => self.update_network(parse_patch(payload)?).await,
            SectionName::Comm => self.update_comm(parse_patch(payload)?).await,
            SectionName::Gpio => self.update_gpio(parse_patch(payload)?).await,
        }
    }

    /// Merge, validate and commit a network change.
    ///
    /// A change that alters the active interface (addressing mode, or any
    /// static field while static addressing is in use) schedules a restart.
    pub async fn update_network(&self, patch: NetworkPatch) -> ServiceResult<UpdateOutcome> {
        let _mutation = self.inner.restart.begin_mutation()?;
        let _section = self.inner.locks.network.lock().await;

        let current = self.inner.store.network();
        if let Some(mac) = patch.mac.as_deref() {
            if !mac.eq_ignore_ascii_case(&current.mac) {
                warn!(requested = mac, stored = %current.mac, "ignoring client-supplied MAC address");
            }
        }

        let candidate = validate_network(patch.merge(&current))?;
        let changed = candidate != current;
        let restart_required = current.interface_differs(&candidate);

        if changed {
            self.inner
                .store
                .commit(SectionValue::Network(candidate.clone()))?;
            info!(
                dhcp = candidate.dhcp_enabled,
                ip = %candidate.ip,
                restart_required,
                "network configuration committed"
            );
            self.inner.events.publish(ConfigEvent::SectionStaged {
                section: SectionName::Network,
            });
        }

        let restart = if restart_required {
            self.inner
                .restart
                .schedule_restart(RestartReason::NetworkConfigChanged)
                .status
        } else {
            self.inner.restart.status()
        };

        Ok(UpdateOutcome {
            section: SectionName::Network,
            applied: true,
            changed,
            restart_required,
            value: SectionValue::Network(candidate),
            restart,
        })
    }

    /// Merge, validate and commit a comm change; applied live.
    pub async fn update_comm(&self, patch: CommPatch) -> ServiceResult<UpdateOutcome> {
        let _mutation = self.inner.restart.begin_mutation()?;
        let _section = self.inner.locks.comm.lock().await;

        let current = self.inner.store.comm();
        let candidate = validate_comm(patch.merge(&current), &self.inner.policy)?;
        let changed = candidate != current;

        if changed {
            self.inner.store.commit(SectionValue::Comm(candidate))?;
            let rebind_tcp_port =
                (candidate.tcp_port != current.tcp_port).then_some(candidate.tcp_port);
            info!(
                tcp_port = candidate.tcp_port,
                baud = candidate.rs232_baud,
                rebind = rebind_tcp_port.is_some(),
                "comm configuration applied"
            );
            self.inner.events.publish(ConfigEvent::SectionApplied {
                section: SectionName::Comm,
                value: SectionValue::Comm(candidate),
                rebind_tcp_port,
            });
        }

        Ok(self.live_outcome(SectionName::Comm, changed, SectionValue::Comm(candidate)))
    }

    /// Merge, validate and commit a gpio change; applied live.
    pub async fn update_gpio(&self, patch: GpioPatch) -> ServiceResult<UpdateOutcome> {
        let _mutation = self.inner.restart.begin_mutation()?;
        let _section = self.inner.locks.gpio.lock().await;

        let current = self.inner.store.gpio();
        let candidate = validate_gpio(patch.merge(&current), &self.inner.policy)?;
        let changed = candidate != current;

        if changed {
            self.inner.store.commit(SectionValue::Gpio(candidate))?;
            info!(
                device_id = candidate.device_id,
                comm_mode = %candidate.comm_mode,
                trigger_mode = %candidate.trigger_mode,
                "gpio configuration applied"
            );
            self.inner.events.publish(ConfigEvent::SectionApplied {
                section: SectionName::Gpio,
                value: SectionValue::Gpio(candidate),
                rebind_tcp_port: None,
            });
        }

        Ok(self.live_outcome(SectionName::Gpio, changed, SectionValue::Gpio(candidate)))
    }

    /// Restore factory defaults for every section, keep the MAC address and
    /// schedule a restart.
    pub async fn factory_reset(&self) -> ServiceResult<ResetOutcome> {
        let _mutation = self.inner.restart.begin_mutation()?;
        // Fixed order so concurrent resets cannot deadlock.
        let _network = self.inner.locks.get(SectionName::Network).lock().await;
        let _comm = self.inner.locks.get(SectionName::Comm).lock().await;
        let _gpio = self.inner.locks.get(SectionName::Gpio).lock().await;

        let config = DeviceConfig::factory(self.inner.store.mac());
        self.inner.store.commit_all(config.clone())?;
        warn!(mac = %config.network.mac, "configuration reset to factory defaults");

        let restart = self
            .inner
            .restart
            .schedule_restart(RestartReason::FactoryReset)
            .status;
        Ok(ResetOutcome { config, restart })
    }

    /// Schedule a restart on explicit request.
    pub fn request_restart(&self) -> ScheduleOutcome {
        self.inner.restart.schedule_restart(RestartReason::Manual)
    }

    fn live_outcome(&self, section: SectionName, changed: bool, value: SectionValue) -> UpdateOutcome {
        UpdateOutcome {
            section,
            applied: true,
            changed,
            restart_required: false,
            value,
            restart: self.inner.restart.status(),
        }
    }
}

fn parse_patch<T: serde::de::DeserializeOwned>(payload: Value) -> ServiceResult<T> {
    serde_json::from_value(payload).map_err(|e| ServiceError::InvalidPayload(e.to_string()))
}
