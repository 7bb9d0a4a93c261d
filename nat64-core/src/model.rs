// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration and mapping records that ride over [`crate::tlv`] but do not
//! belong to any single component: pool4 entries, EAM rows, BIB entries and
//! MAP rules.

use crate::addr::{L4Proto, Prefix4, Prefix6, TransportAddr4, TransportAddr6};

/// A pool4 configuration row, as carried by the administrative pool4-entry TLV.
///
/// Distinct from the per-address allocation state in [`crate::pool4`]: this
/// is what an operator adds/removes/lists, not the live sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool4Entry {
    /// Opaque routing mark, defaults to 0.
    pub mark: u32,
    /// Iteration count hint, defaults to 0.
    pub iterations: u32,
    /// Administrative flags, defaults to 0.
    pub flags: u8,
    /// Which L4 protocol this row configures.
    pub proto: L4Proto,
    /// The IPv4 prefix this row enrolls.
    pub prefix: Prefix4,
    /// Inclusive lower bound of the configured port range.
    pub port_min: u16,
    /// Inclusive upper bound of the configured port range.
    pub port_max: u16,
}

/// An explicit 1:1 address-mapping row (EAM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EamtEntry {
    /// The IPv6 side of the mapping.
    pub prefix6: Prefix6,
    /// The IPv4 side of the mapping.
    pub prefix4: Prefix4,
}

/// A Binding Information Base row: one (inside-v6, outside-v4) binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BibEntry {
    /// The inside (IPv6) transport address.
    pub addr6: TransportAddr6,
    /// The outside (IPv4) transport address.
    pub addr4: TransportAddr4,
    /// The L4 protocol this binding applies to.
    pub proto: L4Proto,
    /// Whether this binding was configured statically (survives session GC).
    pub is_static: bool,
}

/// A MAP-T/MAP-E style mapping rule (RFC 7597).
///
/// `o` is the EA-bits length and `a` is the PSID offset; both are validated
/// against `prefix6`/`prefix4` by [`crate::validate::validate_mapping_rule`]
/// before a `MappingRule` is considered usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRule {
    /// The IPv6 prefix domain this rule covers.
    pub prefix6: Prefix6,
    /// The IPv4 prefix this rule's EA-bits are drawn from.
    pub prefix4: Prefix4,
    /// EA-bits length, in bits.
    pub o: u8,
    /// PSID offset, in bits.
    pub a: u8,
}

impl MappingRule {
    /// The number of suffix bits left over after the EA-bits length and the
    /// IPv4 prefix are removed from a full 32-bit IPv4 address, clamped to 0.
    ///
    /// This both is `sid_len` (§3) and stands in for the PSID length `k`:
    /// absent an explicit PSID-length field, every bit not claimed by the
    /// EA-bits length or the IPv4 prefix belongs to the PSID.
    #[must_use]
    pub fn suffix_len(&self) -> u8 {
        let claimed = u16::from(self.o) + u16::from(self.prefix4.len());
        32u16.saturating_sub(claimed).min(32) as u8
    }
}

/// An ordered, validated list of MTU plateau candidates.
///
/// Construction always goes through [`crate::validate::validate_plateaus`];
/// this type only remembers that the invariants (strictly descending,
/// nonzero, nonempty) already held at the time it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtuPlateaus(Vec<u16>);

impl MtuPlateaus {
    /// Wraps an already-validated, strictly-descending nonzero sequence.
    ///
    /// Callers outside [`crate::validate`] should go through
    /// [`crate::validate::validate_plateaus`] instead of this constructor.
    #[must_use]
    pub(crate) fn from_validated(values: Vec<u16>) -> Self {
        Self(values)
    }

    /// The plateau values, strictly descending.
    #[must_use]
    pub fn values(&self) -> &[u16] {
        &self.0
    }
}
