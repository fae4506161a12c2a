//! Network section validation.

use super::{ValidationError, Violations};
use crate::state::NetworkConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

static MAC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC pattern is a valid regex")
});

/// Whether `mac` is six colon-separated hex octets.
pub fn is_valid_mac(mac: &str) -> bool {
    MAC_PATTERN.is_match(mac)
}

/// Validate a merged network candidate.
///
/// With DHCP enabled the static fields are stored for later but not checked.
/// With static addressing every address must be a dotted-quad and the subnet
/// mask must be contiguous. The address must be a host of its network (not the
/// network or broadcast address), and the gateway must be another host inside
/// the `ip/subnet` network.
pub fn validate_network(candidate: NetworkConfig) -> Result<NetworkConfig, ValidationError> {
    if candidate.dhcp_enabled {
        return Ok(candidate);
    }

    let mut violations = Violations::default();
    let ip = parse_address(&mut violations, "ip", &candidate.ip);
    let subnet = parse_address(&mut violations, "subnet", &candidate.subnet);
    let gateway = parse_address(&mut violations, "gateway", &candidate.gateway);
    let _dns = parse_address(&mut violations, "dns", &candidate.dns);

    if let Some(ip) = ip {
        if ip.is_unspecified() {
            violations.push("ip", "0.0.0.0 is not a usable static address", ip);
        }
    }

    let subnet = subnet.filter(|mask| {
        let ok = is_contiguous_mask(*mask);
        if !ok {
            violations.push(
                "subnet",
                "must be a contiguous, non-zero netmask such as 255.255.255.0",
                mask,
            );
        }
        ok
    });

    if let (Some(ip), Some(mask)) = (ip, subnet) {
        if !ip.is_unspecified() {
            if let Some(reason) = reserved_host(ip, mask) {
                violations.push("ip", format!("{reason} of {ip}/{mask}"), ip);
            }
        }
    }

    if let (Some(ip), Some(mask), Some(gateway)) = (ip, subnet, gateway) {
        if !same_network(ip, gateway, mask) {
            violations.push(
                "gateway",
                format!("not reachable from {ip}/{mask}; the gateway must be on the same subnet"),
                gateway,
            );
        } else if gateway == ip {
            violations.push("gateway", "must differ from the device address", gateway);
        } else if let Some(reason) = reserved_host(gateway, mask) {
            violations.push("gateway", format!("{reason} of {ip}/{mask}"), gateway);
        }
    }

    violations.finish(candidate)
}

fn parse_address(violations: &mut Violations, field: &str, raw: &str) -> Option<Ipv4Addr> {
    match raw.parse::<Ipv4Addr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            violations.push(field, "not a dotted-quad IPv4 address", raw);
            None
        }
    }
}

fn is_contiguous_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits != 0 && bits.leading_ones() + bits.trailing_zeros() == 32
}

/// Names the reserved address `addr` is within its network, if any.
///
/// /31 and /32 networks have no network or broadcast address.
fn reserved_host(addr: Ipv4Addr, mask: Ipv4Addr) -> Option<&'static str> {
    let host_bits = !u32::from(mask);
    if host_bits < 3 {
        return None;
    }
    match u32::from(addr) & host_bits {
        0 => Some("is the network address"),
        h if h == host_bits => Some("is the broadcast address"),
        _ => None,
    }
}

fn same_network(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    let mask = u32::from(mask);
    u32::from(a) & mask == u32::from(b) & mask
}
