use std::net::Ipv4Addr;

use ipnetwork::{ipv4_mask_to_prefix, Ipv4Network};

/// Convert a dotted-decimal netmask ("255.255.255.252") into a prefix length.
///
/// Returns `None` for non-contiguous masks.
pub fn mask_to_prefix(mask: &str) -> Option<u8> {
    let mask: Ipv4Addr = mask.parse().ok()?;
    ipv4_mask_to_prefix(mask).ok()
}

/// Convert a Cisco wildcard mask ("0.0.0.3") into a prefix length
pub fn wildcard_to_prefix(wildcard: &str) -> Option<u8> {
    let wildcard: Ipv4Addr = wildcard.parse().ok()?;
    let mask = Ipv4Addr::from(!u32::from(wildcard));
    ipv4_mask_to_prefix(mask).ok()
}

/// Build an interface address (host address + prefix) from Cisco
/// `ip address <ip> <mask>` operands
pub fn interface_address(ip: &str, mask: &str) -> Option<Ipv4Network> {
    let ip: Ipv4Addr = ip.parse().ok()?;
    let prefix = mask_to_prefix(mask)?;
    Ipv4Network::new(ip, prefix).ok()
}

/// The subnet an interface address belongs to, normalised to its network address
pub fn subnet_of(address: &Ipv4Network) -> Ipv4Network {
    // prefix was already validated when `address` was built
    Ipv4Network::new(address.network(), address.prefix()).unwrap_or(*address)
}

/// True when the last octet is `.1`, the conventional gateway address
pub fn is_conventional_gateway(ip: Ipv4Addr) -> bool {
    ip.octets()[3] == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_to_prefix() {
        assert_eq!(mask_to_prefix("255.255.255.0"), Some(24));
        assert_eq!(mask_to_prefix("255.255.255.252"), Some(30));
        assert_eq!(mask_to_prefix("255.0.255.0"), None);
        assert_eq!(mask_to_prefix("not-a-mask"), None);
    }

    #[test]
    fn test_wildcard_to_prefix() {
        assert_eq!(wildcard_to_prefix("0.0.0.255"), Some(24));
        assert_eq!(wildcard_to_prefix("0.0.0.3"), Some(30));
    }

    #[test]
    fn test_subnet_of_normalises_host_bits() {
        let addr = interface_address("10.0.12.2", "255.255.255.252").unwrap();
        let subnet = subnet_of(&addr);
        assert_eq!(subnet.to_string(), "10.0.12.0/30");
        assert_eq!(addr.ip(), "10.0.12.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn test_is_conventional_gateway() {
        assert!(is_conventional_gateway("10.1.1.1".parse().unwrap()));
        assert!(!is_conventional_gateway("10.1.1.254".parse().unwrap()));
    }
}
