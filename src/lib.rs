//! Device Config Agent Library
//!
//! This library provides the configuration control plane of a network-attached
//! GPIO/serial device: the configuration data model, validation, durable
//! storage, coordinated restarts and the HTTP API in front of them.
//!
//! # Modules
//!
//! - `config`: Agent configuration with TOML support
//! - `state`: Device configuration sections, patches and factory defaults
//! - `validation`: Pure per-section validators
//! - `store`: Durable configuration storage
//! - `restart`: Restart state machine and platform restart primitives
//! - `events`: Broadcast channel the data plane listens on
//! - `service`: Business logic layer for configuration updates
//! - `error`: HTTP-facing error type
//! - `logging`: Tracing subscriber setup
//! - `rest_api`: REST API handlers (when `rest-api` feature is enabled)

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod restart;
pub mod service;
pub mod state;
pub mod store;
pub mod validation;

#[cfg(feature = "rest-api")]
pub mod rest_api;

// Re-export commonly used types for convenience
pub use error::AppError;
pub use events::{ConfigEvent, EventBus};
pub use restart::{
    RestartCoordinator, RestartError, RestartPhase, RestartReason, RestartSettings, RestartStatus,
};
pub use service::{ConfigService, ResetOutcome, ServiceError, ServiceResult, UpdateOutcome};
pub use state::{
    CommConfig, CommMode, DeviceConfig, GpioConfig, NetworkConfig, SectionName, SectionValue,
    TriggerMode,
};
pub use store::{ConfigStore, StoreError};
pub use validation::{FieldViolation, ValidationError, ValidationPolicy};

#[cfg(feature = "rest-api")]
pub use error::AppResult;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
