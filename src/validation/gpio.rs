//! GPIO section validation.

use super::{ValidationError, ValidationPolicy, Violations};
use crate::state::{CommMode, GpioConfig, GpioDraft, TriggerMode};

/// Validate a merged gpio candidate against `policy`.
pub fn validate_gpio(
    candidate: GpioDraft,
    policy: &ValidationPolicy,
) -> Result<GpioConfig, ValidationError> {
    let mut violations = Violations::default();

    let device_id = match u8::try_from(candidate.device_id) {
        Ok(id) if (1..=policy.max_device_id).contains(&id) => id,
        _ => {
            violations.push(
                "device_id",
                format!("must be between 1 and {}", policy.max_device_id),
                candidate.device_id,
            );
            0
        }
    };

    let comm_mode = candidate.comm_mode.parse::<CommMode>().unwrap_or_else(|_| {
        violations.push(
            "comm_mode",
            format!("expected one of {}", names(&CommMode::ALL.map(CommMode::as_str))),
            &candidate.comm_mode,
        );
        CommMode::default()
    });

    let trigger_mode = candidate
        .trigger_mode
        .parse::<TriggerMode>()
        .unwrap_or_else(|_| {
            violations.push(
                "trigger_mode",
                format!(
                    "expected one of {}",
                    names(&TriggerMode::ALL.map(TriggerMode::as_str))
                ),
                &candidate.trigger_mode,
            );
            TriggerMode::default()
        });

    violations.finish(GpioConfig {
        device_id,
        comm_mode,
        trigger_mode,
        auto_response: candidate.auto_response,
    })
}

fn names(items: &[&str]) -> String {
    items.join(", ")
}
