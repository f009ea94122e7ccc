use std::net::IpAddr;

use ipnet::IpNet;
use once_cell::sync::Lazy;

/// How a source address is treated before any external lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// Loopback or the literal `localhost`.
    Loopback,
    /// Private, link-local, documentation or otherwise non-routable.
    NonPublic,
    /// A routable address worth looking up.
    Public(IpAddr),
    /// Not an IP address.
    Unparsable,
}

/// Ranges that never identify a real-world location.
static NON_PUBLIC_NETS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    [
        // IPv4
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.0.0.0/24",
        "192.0.2.0/24",
        "192.168.0.0/16",
        "198.18.0.0/15",
        "198.51.100.0/24",
        "203.0.113.0/24",
        "224.0.0.0/4",
        "240.0.0.0/4",
        // IPv6
        "::/128",
        "100::/64",
        "2001:db8::/32",
        "fc00::/7",
        "fe80::/10",
        "ff00::/8",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

/// Classify a raw source address string.
///
/// IPv4-mapped IPv6 addresses are classified by their embedded IPv4 address.
pub fn classify(source_address: &str) -> AddressClass {
    let trimmed = source_address.trim();
    if trimmed.eq_ignore_ascii_case("localhost") {
        return AddressClass::Loopback;
    }

    let addr: IpAddr = match trimmed.parse() {
        Ok(addr) => addr,
        Err(_) => return AddressClass::Unparsable,
    };
    let addr = match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
        v4 => v4,
    };

    if addr.is_loopback() {
        AddressClass::Loopback
    } else if NON_PUBLIC_NETS.iter().any(|net| net.contains(&addr)) {
        AddressClass::NonPublic
    } else {
        AddressClass::Public(addr)
    }
}
