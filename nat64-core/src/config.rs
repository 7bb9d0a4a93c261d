// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The small set of external knobs the core needs but does not own: the
//! `pool6` NAT64 prefix and the per-(protocol, timer) session timeouts
//! [`crate::session`] consults on decode.

use crate::addr::Prefix6;

/// Configuration consumed by [`crate::session::decode`] and
/// [`crate::tlv`]'s plateau getter.
///
/// This crate never reads files or environment variables; callers build a
/// `Config` however their application loads configuration and pass it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The translator's NAT64 prefix, used to reconstruct `dst6` addresses.
    pub pool6: Prefix6,
    /// TCP established-state timeout, in milliseconds.
    pub tcp_est_timeout_ms: u32,
    /// TCP transitory-state timeout, in milliseconds.
    pub tcp_trans_timeout_ms: u32,
    /// Timeout for a TCP session still waiting on the IPv4 side's SYN, in milliseconds.
    pub tcp_syn_timeout_ms: u32,
    /// UDP session timeout, in milliseconds.
    pub udp_timeout_ms: u32,
    /// ICMP session timeout, in milliseconds.
    pub icmp_timeout_ms: u32,
    /// Maximum number of MTU plateau entries accepted by the TLV codec.
    pub plateaus_max: usize,
}

impl Default for Config {
    /// Widely-deployed NAT64 session timeout defaults, plus the well-known `64:ff9b::/96` prefix.
    fn default() -> Self {
        Self {
            pool6: Prefix6::new("64:ff9b::".parse().expect("valid literal"), 96)
                .expect("96 <= 128"),
            tcp_est_timeout_ms: 2 * 60 * 60 * 1000,
            tcp_trans_timeout_ms: 4 * 60 * 1000,
            tcp_syn_timeout_ms: 4 * 1000,
            udp_timeout_ms: 5 * 60 * 1000,
            icmp_timeout_ms: 60 * 1000,
            plateaus_max: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool6_is_well_known_prefix() {
        let cfg = Config::default();
        assert_eq!(cfg.pool6.address(), "64:ff9b::".parse().unwrap());
        assert_eq!(cfg.pool6.len(), 96);
    }
}
