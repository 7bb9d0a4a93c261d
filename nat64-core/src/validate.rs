// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Prefix, EA-bits/MAP-rule and MTU-plateau validation.
//!
//! [`crate::addr`] enforces the purely structural invariants (a prefix
//! length cannot exceed its address family's width); everything here is a
//! context-dependent check that a caller may need to skip (host bits) or
//! that only makes sense once a whole record has been assembled (MAP
//! rules, plateau lists).

use thiserror::Error;

use crate::addr::{Prefix4, Prefix6};
use crate::model::{MappingRule, MtuPlateaus};

/// Errors raised by the validation layer.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    /// An IPv4 prefix had a nonzero bit past its mask.
    #[error("IPv4 prefix {0}/{1} has host bits set")]
    Ipv4HostBitsSet(std::net::Ipv4Addr, u8),
    /// An IPv6 prefix had a nonzero bit past its mask.
    #[error("IPv6 prefix {0}/{1} has host bits set")]
    Ipv6HostBitsSet(std::net::Ipv6Addr, u8),
    /// A MAP rule's EA-bits length `o` exceeded 48.
    #[error("EA-bits length {0} exceeds 48")]
    EaBitsTooLong(u8),
    /// `prefix6.len + o + sid_len` exceeded 128.
    #[error("prefix6 length {prefix6_len} + EA-bits {o} + suffix {sid_len} exceeds 128 bits")]
    Prefix6Overflow {
        /// The rule's IPv6 prefix length.
        prefix6_len: u8,
        /// The rule's EA-bits length.
        o: u8,
        /// The derived suffix (PSID) length.
        sid_len: u8,
    },
    /// A MAP rule's PSID offset `a` exceeded 16.
    #[error("PSID offset {0} exceeds 16")]
    PsidOffsetTooLarge(u8),
    /// `a + k` exceeded 16 for a MAP rule whose EA-bits don't cover the full IPv4 suffix.
    #[error("PSID offset {a} plus PSID length {k} exceeds 16")]
    PsidRangeOverflow {
        /// The rule's PSID offset.
        a: u8,
        /// The derived PSID length.
        k: u8,
    },
    /// More plateau children were present than the configured maximum.
    #[error("plateau list has {count} entries, exceeding the configured maximum of {max}")]
    TooManyPlateaus {
        /// How many plateau children were seen.
        count: usize,
        /// The configured maximum.
        max: usize,
    },
    /// After sorting, deduplicating and dropping zeroes, no plateau remained.
    #[error("plateau list is empty after validation")]
    EmptyPlateaus,
}

/// Rejects an IPv4 prefix with host bits set, unless `allow_noncanonical`.
pub fn validate_prefix4(prefix: &Prefix4, allow_noncanonical: bool) -> Result<(), ValidationError> {
    if !allow_noncanonical && prefix.address() != prefix.network_address() {
        return Err(ValidationError::Ipv4HostBitsSet(prefix.address(), prefix.len()));
    }
    Ok(())
}

/// Rejects an IPv6 prefix with host bits set, unless `allow_noncanonical`.
pub fn validate_prefix6(prefix: &Prefix6, allow_noncanonical: bool) -> Result<(), ValidationError> {
    if !allow_noncanonical && prefix.address() != prefix.network_address() {
        return Err(ValidationError::Ipv6HostBitsSet(prefix.address(), prefix.len()));
    }
    Ok(())
}

/// Applies the §3 MAP-rule arithmetic invariants.
///
/// `o` (EA-bits length) must not exceed 48, and the IPv6 side must have
/// room for the EA-bits plus whatever suffix bits are left over from the
/// IPv4 prefix. When the EA-bits and IPv4 prefix do not already cover the
/// full 32-bit IPv4 address, the PSID offset `a` and the derived PSID
/// length `k` (== the suffix length) must together fit in 16 bits.
pub fn validate_mapping_rule(rule: &MappingRule) -> Result<(), ValidationError> {
    if rule.o > 48 {
        return Err(ValidationError::EaBitsTooLong(rule.o));
    }

    let sid_len = rule.suffix_len();
    let total: u16 = u16::from(rule.prefix6.len()) + u16::from(rule.o) + u16::from(sid_len);
    if total > 128 {
        return Err(ValidationError::Prefix6Overflow {
            prefix6_len: rule.prefix6.len(),
            o: rule.o,
            sid_len,
        });
    }

    let claimed: u16 = u16::from(rule.o) + u16::from(rule.prefix4.len());
    if claimed <= 32 {
        // The EA-bits and IPv4 prefix alone don't cover the full address;
        // no PSID bits are implied, so `a` is unconstrained by this rule.
        return Ok(());
    }

    if rule.a > 16 {
        return Err(ValidationError::PsidOffsetTooLarge(rule.a));
    }
    let k = sid_len;
    if u16::from(rule.a) + u16::from(k) > 16 {
        return Err(ValidationError::PsidRangeOverflow { a: rule.a, k });
    }
    Ok(())
}

/// The number of plateau children collected so far must not exceed `max`.
///
/// Checked while a caller is still iterating raw TLV children, before
/// [`validate_plateaus`] ever runs, so a too-long list is rejected during
/// the scan rather than after.
pub fn check_plateau_count(count: usize, max: usize) -> Result<(), ValidationError> {
    if count > max {
        return Err(ValidationError::TooManyPlateaus { count, max });
    }
    Ok(())
}

/// Sorts descending, drops zeroes, deduplicates adjacent equal values, and
/// rejects an empty result.
pub fn validate_plateaus(mut values: Vec<u16>) -> Result<MtuPlateaus, ValidationError> {
    values.sort_unstable_by(|a, b| b.cmp(a));
    let mut out: Vec<u16> = Vec::with_capacity(values.len());
    for v in values {
        if v == 0 {
            continue;
        }
        if out.last() == Some(&v) {
            continue;
        }
        out.push(v);
    }
    if out.is_empty() {
        return Err(ValidationError::EmptyPlateaus);
    }
    Ok(MtuPlateaus::from_validated(out))
}
