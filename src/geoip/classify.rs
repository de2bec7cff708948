//! IP field classification.
//!
//! Decides whether the value found in a record's IP field should be looked
//! up at all. Only `Routable` addresses reach the cache and provider.

use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::EMPTY_IP_PLACEHOLDER;

/// Outcome of classifying a record's IP field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpClass {
    /// Field missing, null, empty or the `-` placeholder
    Absent,
    /// Field present but not an IPv4/IPv6 address; carries the offending text
    Invalid(String),
    /// Private or reserved address, skipped because `skip_private_ip` is on
    Private(IpAddr),
    /// Address to look up
    Routable(IpAddr),
}

/// Classifies the raw value of the IP field.
///
/// Strings are parsed as-is; surrounding whitespace makes them invalid.
/// Non-string JSON values are invalid.
pub fn classify(raw: Option<&Value>, skip_private: bool) -> IpClass {
    let text = match raw {
        None | Some(Value::Null) => return IpClass::Absent,
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            log::debug!("Skipping non-string IP field: {}", other);
            return IpClass::Invalid(other.to_string());
        }
    };

    if text.is_empty() || text == EMPTY_IP_PLACEHOLDER {
        return IpClass::Absent;
    }

    match text.parse::<IpAddr>() {
        Ok(ip) if skip_private && is_private_ip(ip) => IpClass::Private(ip),
        Ok(ip) => IpClass::Routable(ip),
        Err(e) => {
            log::debug!("Skipping invalid IP address '{}': {}", text, e);
            IpClass::Invalid(text.to_string())
        }
    }
}

/// Whether `ip` is in a private, local or reserved range.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_ipv4(v4),
            None => is_private_ipv6(v6),
        },
    }
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 127.0.0.0/8 (loopback)
    if octets[0] == 127 {
        return true;
    }

    // 10.0.0.0/8
    if octets[0] == 10 {
        return true;
    }

    // 172.16.0.0/12
    if octets[0] == 172 && (16..=31).contains(&octets[1]) {
        return true;
    }

    // 192.168.0.0/16
    if octets[0] == 192 && octets[1] == 168 {
        return true;
    }

    // 169.254.0.0/16 (link-local)
    if octets[0] == 169 && octets[1] == 254 {
        return true;
    }

    // 100.64.0.0/10 (carrier-grade NAT)
    if octets[0] == 100 && (octets[1] & 0xc0) == 64 {
        return true;
    }

    // 0.0.0.0/8 (this network)
    if octets[0] == 0 {
        return true;
    }

    // 224.0.0.0/4 (multicast)
    if (224..=239).contains(&octets[0]) {
        return true;
    }

    // 240.0.0.0/4 (reserved) and 255.255.255.255 (broadcast)
    octets[0] >= 240
}

fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();

    // :: (unspecified) and ::1 (loopback)
    if ip.is_unspecified() || ip.is_loopback() {
        return true;
    }

    // fc00::/7 (unique local addresses)
    if (segments[0] & 0xfe00) == 0xfc00 {
        return true;
    }

    // fe80::/10 (link-local)
    if (segments[0] & 0xffc0) == 0xfe80 {
        return true;
    }

    // ff00::/8 (multicast)
    segments[0] & 0xff00 == 0xff00
}
