//! Configuration schema definitions.
//!
//! This module defines the structure of the agent configuration file using
//! serde. All sections are defined here with appropriate defaults. This is the
//! configuration of the agent process itself, not the device configuration it
//! serves.

use super::error::{ConfigError, ConfigResult};
use crate::restart::RestartSettings;
use crate::state::DEFAULT_MAC;
use crate::validation::{is_valid_mac, ValidationPolicy, MAX_DEVICE_ID, STANDARD_BAUD_RATES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// State file name used when no storage path is configured.
pub const DEFAULT_STATE_FILE: &str = "device-config.json";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Durable device configuration storage
    pub storage: StorageConfig,
    /// Hardware identity
    pub device: DeviceIdentityConfig,
    /// Validation limits
    pub validation: ValidationConfig,
    /// Restart behaviour
    pub restart: RestartConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::validation("server.port", "must not be 0"));
        }
        if !is_valid_mac(&self.device.mac) {
            return Err(ConfigError::validation(
                "device.mac",
                format!("'{}' is not a MAC address (expected XX:XX:XX:XX:XX:XX)", self.device.mac),
            ));
        }
        if self.validation.baud_rates.is_empty() {
            return Err(ConfigError::validation(
                "validation.baud_rates",
                "at least one baud rate must be allowed",
            ));
        }
        if self.validation.max_device_id == 0 {
            return Err(ConfigError::validation(
                "validation.max_device_id",
                "must be at least 1",
            ));
        }
        if self.restart.restart_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "restart.restart_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.restart.method == RestartMethod::Command {
            self.restart.check_command()?;
        }
        Ok(())
    }
}

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number for HTTP server
    pub port: u16,
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Device configuration file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured path, else `<data dir>/device-config.json`, else the
    /// working directory.
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "devcfg")
            .map(|dirs| dirs.data_dir().join(DEFAULT_STATE_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }
}

/// Hardware identity section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentityConfig {
    /// MAC address written to storage on first boot. Ignored afterwards.
    pub mac: String,
}

impl Default for DeviceIdentityConfig {
    fn default() -> Self {
        Self {
            mac: DEFAULT_MAC.to_string(),
        }
    }
}

/// Validation limits section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allow the data port to use ports below 1024
    pub allow_privileged_ports: bool,
    /// Accepted RS-232 baud rates
    pub baud_rates: Vec<u32>,
    /// Largest accepted GPIO device id
    pub max_device_id: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allow_privileged_ports: false,
            baud_rates: STANDARD_BAUD_RATES.to_vec(),
            max_device_id: MAX_DEVICE_ID,
        }
    }
}

impl ValidationConfig {
    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            allow_privileged_ports: self.allow_privileged_ports,
            supported_baud_rates: self.baud_rates.clone(),
            max_device_id: self.max_device_id,
        }
    }
}

/// How the device is restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMethod {
    /// Exit the process and rely on the service supervisor
    #[default]
    Exit,
    /// Run `restart.command`
    Command,
}

/// Restart section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub method: RestartMethod,
    /// Reboot command and its arguments, e.g. `["systemctl", "reboot"]`
    pub command: Vec<String>,
    /// Exit code used by the `exit` method
    pub exit_code: i32,
    /// Delay before draining starts, in milliseconds
    pub drain_delay_ms: u64,
    /// Maximum wait for in-flight updates, in milliseconds
    pub drain_timeout_ms: u64,
    /// `Retry-After` advertised while draining, in seconds
    pub retry_after_secs: u64,
    /// Seconds the agent may keep running after the restart primitive
    /// returned before the restart is reported as failed
    pub restart_timeout_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        let settings = RestartSettings::default();
        Self {
            method: RestartMethod::Exit,
            command: Vec::new(),
            exit_code: 0,
            drain_delay_ms: settings.drain_delay.as_millis() as u64,
            drain_timeout_ms: settings.drain_timeout.as_millis() as u64,
            retry_after_secs: settings.retry_after.as_secs(),
            restart_timeout_secs: settings.restart_timeout.as_secs(),
        }
    }
}

impl RestartConfig {
    /// Check that `command` names a program that could be run.
    ///
    /// Bare program names are resolved through `PATH` at restart time and are
    /// not checked here.
    pub fn check_command(&self) -> ConfigResult<()> {
        let Some(program) = self.command.first() else {
            return Err(ConfigError::restart_command(
                &self.command,
                "required when restart.method = \"command\"",
            ));
        };
        if program.trim().is_empty() {
            return Err(ConfigError::restart_command(
                &self.command,
                "the program name is blank",
            ));
        }
        let path = Path::new(program);
        if path.is_absolute() && !path.is_file() {
            return Err(ConfigError::restart_command(
                &self.command,
                format!("{} does not exist", path.display()),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> RestartSettings {
        RestartSettings {
            drain_delay: Duration::from_millis(self.drain_delay_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            retry_after: Duration::from_secs(self.retry_after_secs),
            restart_timeout: Duration::from_secs(self.restart_timeout_secs),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
