// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4/IPv6 address, prefix and transport-address types.
//!
//! Prefixes are stored verbatim (host bits are not zeroed on construction);
//! equality and prefix comparisons mask host bits implicitly so that
//! `192.0.2.1/24` and `192.0.2.255/24` compare equal as prefixes without
//! either value losing its original address. Rejecting a prefix whose host
//! bits are set is a [`crate::validate`] concern, not a structural one.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Errors raised while constructing address-codec types.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum AddressError {
    /// A prefix length exceeded the address family's bit width.
    #[error("prefix length {len} exceeds {max_len} bits")]
    PrefixTooLong {
        /// The length that was supplied.
        len: u8,
        /// The maximum length for the address family.
        max_len: u8,
    },
    /// The L4 protocol discriminant did not match TCP, UDP or ICMP.
    #[error("unrecognized L4 protocol discriminant {0}")]
    InvalidProtocol(u8),
}

/// One of the three L4 protocol buckets pool4 and the session table key on.
///
/// ICMPv4 and ICMPv6 collapse to the single [`L4Proto::Icmp`] bucket; there
/// is deliberately no separate ICMPv6 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum L4Proto {
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
    /// ICMP, either v4 or v6.
    Icmp,
}

impl L4Proto {
    /// All three buckets, in pool4's enumeration order.
    pub const ALL: [L4Proto; 3] = [L4Proto::Tcp, L4Proto::Udp, L4Proto::Icmp];

    /// Returns the wire discriminant used by [`crate::tlv`] and [`crate::session`].
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            L4Proto::Tcp => 0,
            L4Proto::Udp => 1,
            L4Proto::Icmp => 2,
        }
    }

    /// Parses a wire discriminant produced by [`L4Proto::to_wire`].
    pub fn from_wire(value: u8) -> Result<Self, AddressError> {
        match value {
            0 => Ok(L4Proto::Tcp),
            1 => Ok(L4Proto::Udp),
            2 => Ok(L4Proto::Icmp),
            other => Err(AddressError::InvalidProtocol(other)),
        }
    }
}

/// An IPv4 prefix: an address plus a length in `0..=32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix4 {
    address: Ipv4Addr,
    len: u8,
}

impl Prefix4 {
    /// Builds a prefix, rejecting only a length that does not fit the address family.
    ///
    /// Host bits are not validated here; use [`crate::validate::validate_prefix4`]
    /// for that context-dependent check.
    pub fn new(address: Ipv4Addr, len: u8) -> Result<Self, AddressError> {
        if len > 32 {
            return Err(AddressError::PrefixTooLong { len, max_len: 32 });
        }
        Ok(Self { address, len })
    }

    /// The prefix's address, exactly as supplied to [`Prefix4::new`].
    #[must_use]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// The prefix length in bits.
    #[must_use]
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether this is a host route (`/32`).
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.len == 32
    }

    /// The address with all bits past `len` forced to zero.
    #[must_use]
    pub fn network_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_u32(u32::from(self.address), self.len))
    }

    /// Whether `self` and `other` denote the same network, ignoring host bits.
    #[must_use]
    pub fn same_network(&self, other: &Self) -> bool {
        self.len == other.len && self.network_address() == other.network_address()
    }
}

/// An IPv6 prefix: an address plus a length in `0..=128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix6 {
    address: Ipv6Addr,
    len: u8,
}

impl Prefix6 {
    /// Builds a prefix, rejecting only a length that does not fit the address family.
    pub fn new(address: Ipv6Addr, len: u8) -> Result<Self, AddressError> {
        if len > 128 {
            return Err(AddressError::PrefixTooLong { len, max_len: 128 });
        }
        Ok(Self { address, len })
    }

    /// The prefix's address, exactly as supplied to [`Prefix6::new`].
    #[must_use]
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    /// The prefix length in bits.
    #[must_use]
    pub fn len(&self) -> u8 {
        self.len
    }

    /// The address with all bits past `len` forced to zero.
    #[must_use]
    pub fn network_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(mask_u128(u128::from(self.address), self.len))
    }

    /// Whether `self` and `other` denote the same network, ignoring host bits.
    #[must_use]
    pub fn same_network(&self, other: &Self) -> bool {
        self.len == other.len && self.network_address() == other.network_address()
    }
}

fn mask_u32(value: u32, len: u8) -> u32 {
    if len == 0 {
        0
    } else if len >= 32 {
        value
    } else {
        value & (u32::MAX << (32 - len))
    }
}

fn mask_u128(value: u128, len: u8) -> u128 {
    if len == 0 {
        0
    } else if len >= 128 {
        value
    } else {
        value & (u128::MAX << (128 - len))
    }
}

/// An IPv4 transport address: an address plus an L4 port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportAddr4 {
    /// IPv4 layer-3 address.
    pub address: Ipv4Addr,
    /// Layer-4 port, or ICMP identifier.
    pub port: u16,
}

impl TransportAddr4 {
    /// Builds a transport address from its parts.
    #[must_use]
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }
}

/// An IPv6 transport address: an address plus an L4 port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportAddr6 {
    /// IPv6 layer-3 address.
    pub address: Ipv6Addr,
    /// Layer-4 port, or ICMP identifier.
    pub port: u16,
}

impl TransportAddr6 {
    /// Builds a transport address from its parts.
    #[must_use]
    pub fn new(address: Ipv6Addr, port: u16) -> Self {
        Self { address, port }
    }
}

/// Derives an IPv6 address from a `pool6` NAT64 prefix and an embedded IPv4
/// address, per RFC 6052 §2.2.
///
/// Only the well-known `/96` prefix length is supported; this is the only
/// length the replication format (`SessionWire`) and this crate's worked
/// examples use. Other prefix lengths (32/40/48/56/64) interleave suffix
/// bits with the embedded address and are out of scope.
#[must_use]
pub fn rfc6052_4to6(pool6: &Prefix6, addr4: Ipv4Addr) -> Ipv6Addr {
    let prefix = pool6.network_address().octets();
    let v4 = addr4.octets();
    let mut out = [0u8; 16];
    out[..12].copy_from_slice(&prefix[..12]);
    out[12..16].copy_from_slice(&v4);
    Ipv6Addr::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix4_rejects_overlong_length() {
        assert_eq!(
            Prefix4::new(Ipv4Addr::new(192, 0, 2, 1), 33),
            Err(AddressError::PrefixTooLong { len: 33, max_len: 32 })
        );
    }

    #[test]
    fn prefix4_same_network_ignores_host_bits() {
        let a = Prefix4::new(Ipv4Addr::new(192, 0, 2, 1), 24).unwrap();
        let b = Prefix4::new(Ipv4Addr::new(192, 0, 2, 255), 24).unwrap();
        assert!(a.same_network(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn l4proto_wire_round_trip() {
        for proto in L4Proto::ALL {
            assert_eq!(L4Proto::from_wire(proto.to_wire()), Ok(proto));
        }
        assert_eq!(L4Proto::from_wire(9), Err(AddressError::InvalidProtocol(9)));
    }

    #[test]
    fn rfc6052_4to6_matches_worked_example() {
        let pool6 = Prefix6::new("64:ff9b::".parse().unwrap(), 96).unwrap();
        let got = rfc6052_4to6(&pool6, Ipv4Addr::new(203, 0, 113, 1));
        assert_eq!(got, "64:ff9b::203.0.113.1".parse::<Ipv6Addr>().unwrap());
    }
}
