//! Section validators.
//!
//! Every function in this module is pure: it looks at a merged candidate
//! section and either accepts it, returning the typed value that may be
//! committed, or rejects it with the complete list of offending fields.
//! Validation is all-or-nothing; a candidate with any violation is rejected as
//! a whole.

mod comm;
mod gpio;
mod network;

pub use comm::validate_comm;
pub use gpio::validate_gpio;
pub use network::{is_valid_mac, validate_network};

use serde::Serialize;
use std::fmt;

/// Baud rates the RS-232 port supports, slowest first.
pub const STANDARD_BAUD_RATES: &[u32] = &[1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Highest address on the bus-addressed GPIO protocol.
pub const MAX_DEVICE_ID: u8 = 247;

/// First port number that is not a reserved well-known port.
pub const FIRST_UNPRIVILEGED_PORT: u16 = 1024;

/// Tunable limits the validators enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Allow TCP ports below 1024.
    pub allow_privileged_ports: bool,
    /// Accepted RS-232 baud rates.
    pub supported_baud_rates: Vec<u32>,
    /// Largest accepted GPIO device id.
    pub max_device_id: u8,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allow_privileged_ports: false,
            supported_baud_rates: STANDARD_BAUD_RATES.to_vec(),
            max_device_id: MAX_DEVICE_ID,
        }
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
    /// The offending value as the client sent it (after merging).
    pub value: String,
}

impl FieldViolation {
    pub fn new(field: &str, reason: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (got '{}')", self.field, self.reason, self.value)
    }
}

/// A rejected candidate. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(violation: FieldViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    /// Whether `field` is among the rejected fields.
    pub fn rejects(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collects violations while a validator walks the candidate.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<FieldViolation>);

impl Violations {
    pub(crate) fn push(&mut self, field: &str, reason: impl Into<String>, value: impl fmt::Display) {
        self.0.push(FieldViolation::new(field, reason, value));
    }

    /// `Ok(value)` if nothing was recorded.
    pub(crate) fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError { violations: self.0 })
        }
    }
}
