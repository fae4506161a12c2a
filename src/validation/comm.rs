//! Comm section validation.

use super::{ValidationError, ValidationPolicy, Violations, FIRST_UNPRIVILEGED_PORT};
use crate::state::{CommConfig, CommDraft};

/// Validate a merged comm candidate against `policy`.
pub fn validate_comm(
    candidate: CommDraft,
    policy: &ValidationPolicy,
) -> Result<CommConfig, ValidationError> {
    let mut violations = Violations::default();

    let tcp_port = match u16::try_from(candidate.tcp_port) {
        Ok(0) | Err(_) => {
            violations.push("tcp_port", "must be between 1 and 65535", candidate.tcp_port);
            0
        }
        Ok(port) if port < FIRST_UNPRIVILEGED_PORT && !policy.allow_privileged_ports => {
            violations.push(
                "tcp_port",
                "ports below 1024 are reserved for well-known services",
                port,
            );
            port
        }
        Ok(port) => port,
    };

    let rs232_baud = match u32::try_from(candidate.rs232_baud) {
        Ok(baud) if policy.supported_baud_rates.contains(&baud) => baud,
        _ => {
            violations.push(
                "rs232_1_baud",
                format!(
                    "unsupported baud rate; expected one of {}",
                    list(&policy.supported_baud_rates)
                ),
                candidate.rs232_baud,
            );
            0
        }
    };

    violations.finish(CommConfig {
        tcp_port,
        rs232_baud,
    })
}

fn list(rates: &[u32]) -> String {
    rates
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
