//! Device configuration data model.
//!
//! The device carries three independent configuration sections: network,
//! comm (exposed over HTTP as `control`) and gpio. Each section has a stored
//! form, which is what gets persisted and returned to readers, and a patch
//! form whose fields are all optional. A patch is merged onto the stored form
//! before validation; unspecified fields keep their previous value.
//!
//! Patch fields that carry numbers are deliberately wider than the stored
//! type so that out-of-range values reach the validator and produce a
//! field-level rejection instead of an opaque deserialization failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Factory defaults, taken from the device firmware.
pub const DEFAULT_MAC: &str = "00:08:DC:00:00:01";
pub const DEFAULT_DHCP_ENABLED: bool = true;
pub const DEFAULT_IP: &str = "192.168.1.100";
pub const DEFAULT_SUBNET: &str = "255.255.255.0";
pub const DEFAULT_GATEWAY: &str = "192.168.1.1";
pub const DEFAULT_DNS: &str = "8.8.8.8";
pub const DEFAULT_TCP_PORT: u16 = 5050;
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_DEVICE_ID: u8 = 1;
pub const DEFAULT_AUTO_RESPONSE: bool = true;

// ---------- Section names ----------

/// One of the three configuration sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    Network,
    Comm,
    Gpio,
}

impl SectionName {
    pub const ALL: [SectionName; 3] = [Self::Network, Self::Comm, Self::Gpio];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Comm => "comm",
            Self::Gpio => "gpio",
        }
    }

    /// Whether a committed change to this section only takes effect after a
    /// device restart (as opposed to being applied live).
    pub fn applies_live(self) -> bool {
        !matches!(self, Self::Network)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a section name does not name one of the known sections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown configuration section '{0}' (expected network, comm or gpio)")]
pub struct UnknownSection(pub String);

impl FromStr for SectionName {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(Self::Network),
            // The firmware and the web UI call the comm section "control".
            "comm" | "control" => Ok(Self::Comm),
            "gpio" => Ok(Self::Gpio),
            _ => Err(UnknownSection(s.to_string())),
        }
    }
}

// ---------- Network ----------

/// IP networking section.
///
/// When `dhcp_enabled` is true the static fields are advisory: they are kept
/// so the UI can pre-fill them when static addressing is re-enabled, but they
/// are neither validated nor used by the interface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Hardware identity. Owned by the store; never taken from a client.
    pub mac: String,
    pub dhcp_enabled: bool,
    pub ip: String,
    pub subnet: String,
    pub gateway: String,
    pub dns: String,
}

impl NetworkConfig {
    pub fn factory(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            dhcp_enabled: DEFAULT_DHCP_ENABLED,
            ip: DEFAULT_IP.to_string(),
            subnet: DEFAULT_SUBNET.to_string(),
            gateway: DEFAULT_GATEWAY.to_string(),
            dns: DEFAULT_DNS.to_string(),
        }
    }

    /// Whether moving from `self` to `next` changes what the active network
    /// interface does, and therefore needs a restart to take effect.
    ///
    /// Switching between DHCP and static addressing always counts. While DHCP
    /// stays enabled the static fields are advisory and editing them does not.
    pub fn interface_differs(&self, next: &NetworkConfig) -> bool {
        if self.dhcp_enabled != next.dhcp_enabled {
            return true;
        }
        if next.dhcp_enabled {
            return false;
        }
        self.ip != next.ip
            || self.subnet != next.subnet
            || self.gateway != next.gateway
            || self.dns != next.dns
    }
}

/// Partial update for [`NetworkConfig`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkPatch {
    #[serde(alias = "dhcpEnabled")]
    pub dhcp_enabled: Option<bool>,
    pub ip: Option<String>,
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub dns: Option<String>,
    /// Accepted so that echoing a GET response back is not an error, but the
    /// value is always discarded in favour of the stored one.
    pub mac: Option<String>,
}

impl NetworkPatch {
    /// Merge onto `current`. The MAC address is always taken from `current`.
    pub fn merge(&self, current: &NetworkConfig) -> NetworkConfig {
        NetworkConfig {
            mac: current.mac.clone(),
            dhcp_enabled: self.dhcp_enabled.unwrap_or(current.dhcp_enabled),
            ip: pick(&self.ip, &current.ip),
            subnet: pick(&self.subnet, &current.subnet),
            gateway: pick(&self.gateway, &current.gateway),
            dns: pick(&self.dns, &current.dns),
        }
    }
}

fn pick(patch: &Option<String>, current: &str) -> String {
    patch.clone().unwrap_or_else(|| current.to_string())
}

// ---------- Comm ----------

/// Communications channel section: TCP data port and RS-232 baud rate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommConfig {
    pub tcp_port: u16,
    #[serde(rename = "rs232_1_baud", alias = "rs232_baud")]
    pub rs232_baud: u32,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            tcp_port: DEFAULT_TCP_PORT,
            rs232_baud: DEFAULT_BAUD_RATE,
        }
    }
}

/// Partial update for [`CommConfig`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CommPatch {
    #[serde(alias = "tcpPort")]
    pub tcp_port: Option<i64>,
    #[serde(rename = "rs232_1_baud", alias = "rs232_baud", alias = "rs232Baud")]
    pub rs232_baud: Option<i64>,
}

/// A merged but not yet validated comm section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommDraft {
    pub tcp_port: i64,
    pub rs232_baud: i64,
}

impl CommPatch {
    pub fn merge(&self, current: &CommConfig) -> CommDraft {
        CommDraft {
            tcp_port: self.tcp_port.unwrap_or(i64::from(current.tcp_port)),
            rs232_baud: self.rs232_baud.unwrap_or(i64::from(current.rs232_baud)),
        }
    }
}

// ---------- GPIO ----------

/// Framing used on the GPIO real-time protocol.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommMode {
    #[default]
    Text,
    Binary,
}

impl CommMode {
    pub const ALL: [CommMode; 2] = [Self::Text, Self::Binary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for CommMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown comm mode '{s}'"))
    }
}

/// When an input change is reported: on every edge, or once per ON->OFF cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    Toggle,
    Trigger,
}

impl TriggerMode {
    pub const ALL: [TriggerMode; 2] = [Self::Toggle, Self::Trigger];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Trigger => "trigger",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown trigger mode '{s}'"))
    }
}

/// GPIO / real-time I/O section.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioConfig {
    pub device_id: u8,
    #[serde(alias = "rt_mode")]
    pub comm_mode: CommMode,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    pub auto_response: bool,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            comm_mode: CommMode::default(),
            trigger_mode: TriggerMode::default(),
            auto_response: DEFAULT_AUTO_RESPONSE,
        }
    }
}

/// Partial update for [`GpioConfig`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct GpioPatch {
    #[serde(alias = "deviceId")]
    pub device_id: Option<i64>,
    #[serde(alias = "commMode", alias = "rt_mode")]
    pub comm_mode: Option<String>,
    #[serde(alias = "triggerMode")]
    pub trigger_mode: Option<String>,
    #[serde(alias = "autoResponse")]
    pub auto_response: Option<bool>,
}

/// A merged but not yet validated gpio section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioDraft {
    pub device_id: i64,
    pub comm_mode: String,
    pub trigger_mode: String,
    pub auto_response: bool,
}

impl GpioPatch {
    pub fn merge(&self, current: &GpioConfig) -> GpioDraft {
        GpioDraft {
            device_id: self.device_id.unwrap_or(i64::from(current.device_id)),
            comm_mode: pick(&self.comm_mode, current.comm_mode.as_str()),
            trigger_mode: pick(&self.trigger_mode, current.trigger_mode.as_str()),
            auto_response: self.auto_response.unwrap_or(current.auto_response),
        }
    }
}

// ---------- Aggregate ----------

/// All three sections; the unit of persistence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub network: NetworkConfig,
    pub comm: CommConfig,
    pub gpio: GpioConfig,
}

impl DeviceConfig {
    /// Factory defaults for a device with the given hardware address.
    pub fn factory(mac: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::factory(mac),
            comm: CommConfig::default(),
            gpio: GpioConfig::default(),
        }
    }

    pub fn section(&self, name: SectionName) -> SectionValue {
        match name {
            SectionName::Network => SectionValue::Network(self.network.clone()),
            SectionName::Comm => SectionValue::Comm(self.comm),
            SectionName::Gpio => SectionValue::Gpio(self.gpio),
        }
    }
}

/// The current value of one section.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SectionValue {
    Network(NetworkConfig),
    Comm(CommConfig),
    Gpio(GpioConfig),
}

impl SectionValue {
    pub fn name(&self) -> SectionName {
        match self {
            Self::Network(_) => SectionName::Network,
            Self::Comm(_) => SectionName::Comm,
            Self::Gpio(_) => SectionName::Gpio,
        }
    }
}
