//! Helper functions for address parsing and network derivation

use crate::errors::{Error, Result};
use crate::types::Family;
use ipnet::IpNet;
use std::net::IpAddr;

/// Parse `"addr"` or `"addr/prefix"` into a canonical network.
///
/// A bare address becomes a full-length network; host bits of a CIDR input
/// are masked off.
pub fn parse_network(s: &str) -> Result<IpNet> {
    if let Ok(net) = s.parse::<IpNet>() {
        Ok(net.trunc())
    } else if let Ok(ip) = s.parse::<IpAddr>() {
        Ok(IpNet::from(ip))
    } else {
        Err(Error::parse(s))
    }
}

/// Truncate `net` to `prefix_len` bits.
///
/// Fails when `prefix_len` exceeds the family's address width.
pub fn network_at(net: &IpNet, prefix_len: u8) -> Result<IpNet> {
    IpNet::new(net.addr(), prefix_len)
        .map(|n| n.trunc())
        .map_err(|_| Error::parse(format!("{}/{}", net.addr(), prefix_len)))
}

/// Address width in bits of the family of `net`.
#[inline]
pub fn max_prefix_len(net: &IpNet) -> u8 {
    net.max_prefix_len()
}

/// Dual-tree dispatch: a colon can only appear in IPv6 text.
#[inline]
pub fn family_of_str(s: &str) -> Family {
    if s.contains(':') {
        Family::V6
    } else {
        Family::V4
    }
}

// Packs a slot index and generation into a single u64 for ABA-safe handles.
#[inline]
pub fn pack(index: u32, gen: u32) -> u64 {
    ((gen as u64) << 32) | (index as u64)
}

#[inline]
pub fn unpack(raw: u64) -> (u32, u32) {
    (raw as u32, (raw >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_addresses_as_full_length() {
        assert_eq!(parse_network("127.0.0.1").unwrap().to_string(), "127.0.0.1/32");
        assert_eq!(
            parse_network("2001:db8:cafe::1").unwrap().to_string(),
            "2001:db8:cafe::1/128"
        );
    }

    #[test]
    fn masks_host_bits_of_cidr_input() {
        assert_eq!(
            parse_network("2001:db8::1/112").unwrap().to_string(),
            "2001:db8::/112"
        );
        assert_eq!(parse_network("10.1.2.3/16").unwrap().to_string(), "10.1.0.0/16");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse_network("2001::db8::1"), Err(Error::Parse(_))));
        assert!(matches!(parse_network("127.0.0.0.1"), Err(Error::Parse(_))));
        assert!(matches!(parse_network("10.0.0.0/33"), Err(Error::Parse(_))));
        assert!(matches!(parse_network(""), Err(Error::Parse(_))));
    }

    #[test]
    fn derives_networks_per_level() {
        let net = parse_network("2001:db8:0:1:2:3:4:5").unwrap();
        let expected = [
            (32, "2001:db8::/32"),
            (48, "2001:db8::/48"),
            (64, "2001:db8:0:1::/64"),
            (112, "2001:db8:0:1:2:3:4:0/112"),
            (128, "2001:db8:0:1:2:3:4:5/128"),
        ];
        for (plen, s) in expected {
            assert_eq!(network_at(&net, plen).unwrap().to_string(), s);
        }
        assert!(network_at(&net, 129).is_err());
    }

    #[test]
    fn colon_selects_ipv6() {
        assert_eq!(family_of_str("::1"), Family::V6);
        assert_eq!(family_of_str("192.0.2.1"), Family::V4);
    }

    #[test]
    fn pack_roundtrip() {
        let raw = pack(7, 3);
        assert_eq!(unpack(raw), (7, 3));
    }
}
