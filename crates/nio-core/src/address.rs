//! `Address` and `Peer` — portable endpoint types.
//!
//! Addresses are always constructed from raw bytes or a numeric-only
//! textual form (`a.b.c.d` / colon-hex). Never resolved via DNS: name
//! resolution is explicitly outside this façade.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl Address {
    pub const fn v4(bytes: [u8; 4]) -> Self {
        Address::V4(bytes)
    }

    pub const fn v6(bytes: [u8; 16]) -> Self {
        Address::V6(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(bytes);
                Some(Address::V4(b))
            }
            16 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                Some(Address::V6(b))
            }
            _ => None,
        }
    }

    /// Parse a numeric-only textual address (no DNS).
    pub fn parse_numeric(text: &str) -> Option<Self> {
        if let Ok(v4) = text.parse::<Ipv4Addr>() {
            return Some(Address::V4(v4.octets()));
        }
        if let Ok(v6) = text.parse::<Ipv6Addr>() {
            return Some(Address::V6(v6.octets()));
        }
        None
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, Address::V4(_))
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, Address::V6(_))
    }

    pub fn unspecified_v4() -> Self {
        Address::V4([0, 0, 0, 0])
    }

    pub fn unspecified_v6() -> Self {
        Address::V6([0; 16])
    }

    pub fn loopback_v4() -> Self {
        Address::V4([127, 0, 0, 1])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::V4(b) => write!(f, "{}", Ipv4Addr::from(*b)),
            Address::V6(b) => write!(f, "{}", Ipv6Addr::from(*b)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub address: Address,
    pub port: u16,
}

impl Peer {
    pub const fn new(address: Address, port: u16) -> Self {
        Peer { address, port }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Address::V4(_) => write!(f, "{}:{}", self.address, self.port),
            Address::V6(_) => write!(f, "[{}]:{}", self.address, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v4_numeric() {
        assert_eq!(
            Address::parse_numeric("127.0.0.1"),
            Some(Address::V4([127, 0, 0, 1]))
        );
    }

    #[test]
    fn parses_v6_numeric() {
        assert!(Address::parse_numeric("::1").unwrap().is_v6());
    }

    #[test]
    fn rejects_hostnames() {
        assert_eq!(Address::parse_numeric("localhost"), None);
    }

    #[test]
    fn from_bytes_length_invariant() {
        assert!(Address::from_bytes(&[1, 2, 3]).is_none());
        assert!(Address::from_bytes(&[1, 2, 3, 4]).is_some());
        assert!(Address::from_bytes(&[0u8; 16]).is_some());
    }

    #[test]
    fn peer_display() {
        let p = Peer::new(Address::loopback_v4(), 30080);
        assert_eq!(p.to_string(), "127.0.0.1:30080");
    }
}
