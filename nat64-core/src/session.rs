// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The 36-byte packed session-replication format ("joold" wire format) and
//! the in-memory [`SessionEntry`] it encodes.
//!
//! The layout is fixed and must not change: network byte order throughout,
//! `dst6` omitted and reconstructed on decode via RFC 6052, and a
//! bit-packed flags byte (`proto<<5 | state<<2 | timer_type`) with
//! reserved high bits. See `DESIGN.md` for why this codec's 36-byte size
//! follows the byte-offset table rather than the "38" figure that appears
//! in some prose summaries of this format — the table is authoritative and
//! its own arithmetic sums to 36.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::addr::{rfc6052_4to6, L4Proto, TransportAddr4, TransportAddr6};
use crate::config::Config;

/// The wire size of one packed session entry, in bytes.
pub const WIRE_SIZE: usize = 36;

/// Which timer governs a session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// Established state (e.g. TCP ESTABLISHED, or steady-state UDP/ICMP).
    Est,
    /// Transitory state (e.g. TCP closing handshakes).
    Trans,
    /// Waiting on the IPv4 side's inbound SYN (TCP only).
    Syn4,
}

impl TimerType {
    fn to_wire(self) -> u8 {
        match self {
            TimerType::Est => 0,
            TimerType::Trans => 1,
            TimerType::Syn4 => 2,
        }
    }

    fn from_wire(value: u8) -> Result<Self, SessionWireError> {
        match value {
            0 => Ok(TimerType::Est),
            1 => Ok(TimerType::Trans),
            2 => Ok(TimerType::Syn4),
            other => Err(SessionWireError::InvalidTimerType(other)),
        }
    }

    /// Looks up this timer's configured timeout, in milliseconds, for `proto`.
    fn timeout_ms(self, proto: L4Proto, config: &Config) -> u32 {
        match (proto, self) {
            (L4Proto::Tcp, TimerType::Est) => config.tcp_est_timeout_ms,
            (L4Proto::Tcp, TimerType::Trans) => config.tcp_trans_timeout_ms,
            (L4Proto::Tcp, TimerType::Syn4) => config.tcp_syn_timeout_ms,
            (L4Proto::Udp, _) => config.udp_timeout_ms,
            (L4Proto::Icmp, _) => config.icmp_timeout_ms,
        }
    }
}

/// Errors raised while encoding or decoding a packed session.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum SessionWireError {
    /// The input buffer was shorter than [`WIRE_SIZE`], or not a multiple of it.
    #[error("session buffer is {got} bytes, expected a multiple of {WIRE_SIZE}")]
    BufferTooShort {
        /// The buffer length actually seen.
        got: usize,
    },
    /// The packed flags byte's protocol bits did not match TCP, UDP or ICMP.
    #[error("unrecognized packed protocol discriminant {0}")]
    InvalidProtocol(u8),
    /// The packed flags byte's timer-type bits did not match EST/TRANS/SYN4.
    #[error("unrecognized packed timer-type discriminant {0}")]
    InvalidTimerType(u8),
}

/// A live NAT64 session, as exchanged by the replication codec.
///
/// For ICMP, `dst6.port == src6.port` and `dst4.port == src4.port` (the
/// "port" is really the ICMP identifier); callers constructing ICMP
/// sessions are expected to uphold this themselves, mirroring how the
/// source computes it at decode time rather than validating it generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEntry {
    /// Inside (IPv6) source transport address.
    pub src6: TransportAddr6,
    /// Reconstructed IPv6 destination transport address.
    pub dst6: TransportAddr6,
    /// Outside (IPv4) source transport address.
    pub src4: TransportAddr4,
    /// Outside (IPv4) destination transport address.
    pub dst4: TransportAddr4,
    /// L4 protocol this session applies to.
    pub proto: L4Proto,
    /// Opaque protocol-specific state discriminant (e.g. a TCP state machine state).
    pub state: u8,
    /// Which timer governs this session's expiration.
    pub timer_type: TimerType,
    /// Monotonic update time, in milliseconds, the timer is measured from.
    pub update_time_ms: u64,
    /// The timeout duration applied to `update_time_ms`, in milliseconds.
    pub timeout_ms: u32,
    /// Whether this session has already been stored locally.
    ///
    /// Always `false` immediately after [`decode`]; the session table sets
    /// this once it has actually committed the entry.
    pub has_stored: bool,
}

fn pack_flags(proto: L4Proto, state: u8, timer_type: TimerType) -> u16 {
    let proto_bits = u16::from(proto.to_wire() & 0b11) << 5;
    let state_bits = u16::from(state & 0b111) << 2;
    let timer_bits = u16::from(timer_type.to_wire() & 0b11);
    proto_bits | state_bits | timer_bits
}

fn unpack_flags(flags: u16) -> (u8, u8, u8) {
    let proto = ((flags >> 5) & 0b11) as u8;
    let state = ((flags >> 2) & 0b111) as u8;
    let timer = (flags & 0b11) as u8;
    (proto, state, timer)
}

/// Encodes one [`SessionEntry`] into [`WIRE_SIZE`] bytes.
///
/// `expiration_ms` (the time remaining until the session's timeout fires)
/// is computed from `entry.update_time_ms`, `entry.timeout_ms` and `now_ms`,
/// then clamped to `u32::MAX` per §4.3.
#[must_use]
pub fn encode(entry: &SessionEntry, now_ms: u64) -> [u8; WIRE_SIZE] {
    let mut out = [0u8; WIRE_SIZE];

    out[0..16].copy_from_slice(&entry.src6.address.octets());
    out[16..20].copy_from_slice(&entry.src4.address.octets());
    out[20..24].copy_from_slice(&entry.dst4.address.octets());

    let dying_at = entry.update_time_ms.saturating_add(u64::from(entry.timeout_ms));
    let expiration_ms = dying_at.saturating_sub(now_ms).min(u64::from(u32::MAX)) as u32;
    out[24..28].copy_from_slice(&expiration_ms.to_be_bytes());

    out[28..30].copy_from_slice(&entry.src6.port.to_be_bytes());
    out[30..32].copy_from_slice(&entry.src4.port.to_be_bytes());
    out[32..34].copy_from_slice(&entry.dst4.port.to_be_bytes());

    let flags = pack_flags(entry.proto, entry.state, entry.timer_type);
    out[34..36].copy_from_slice(&flags.to_be_bytes());

    out
}

/// Decodes one [`WIRE_SIZE`]-byte packed session.
///
/// `dst6` is reconstructed from `config.pool6` and the decoded `dst4`
/// address via [`rfc6052_4to6`]; for ICMP, `dst6.port` is copied from the
/// decoded `src6.port`, otherwise from the decoded `dst4.port`.
/// `update_time_ms` is computed as `now_ms + expiration_ms - timeout`,
/// where `timeout` is looked up from `config` by `(proto, timer_type)`.
/// `has_stored` is always `false` on decode.
pub fn decode(buf: &[u8], config: &Config, now_ms: u64) -> Result<SessionEntry, SessionWireError> {
    if buf.len() != WIRE_SIZE {
        return Err(SessionWireError::BufferTooShort { got: buf.len() });
    }

    let mut src6_octets = [0u8; 16];
    src6_octets.copy_from_slice(&buf[0..16]);
    let src6_addr = std::net::Ipv6Addr::from(src6_octets);

    let src4_addr = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);
    let dst4_addr = Ipv4Addr::new(buf[20], buf[21], buf[22], buf[23]);

    let expiration_ms = u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]);
    let src6_port = u16::from_be_bytes([buf[28], buf[29]]);
    let src4_port = u16::from_be_bytes([buf[30], buf[31]]);
    let dst4_port = u16::from_be_bytes([buf[32], buf[33]]);

    let flags = u16::from_be_bytes([buf[34], buf[35]]);
    let (proto_bits, state, timer_bits) = unpack_flags(flags);
    let proto = L4Proto::from_wire(proto_bits).map_err(|_| SessionWireError::InvalidProtocol(proto_bits))?;
    let timer_type = TimerType::from_wire(timer_bits)?;

    let dst6_port = if proto == L4Proto::Icmp { src6_port } else { dst4_port };
    let dst6_addr = rfc6052_4to6(&config.pool6, dst4_addr);

    let timeout_ms = timer_type.timeout_ms(proto, config);
    let update_time_ms = now_ms
        .saturating_add(u64::from(expiration_ms))
        .saturating_sub(u64::from(timeout_ms));

    Ok(SessionEntry {
        src6: TransportAddr6::new(src6_addr, src6_port),
        dst6: TransportAddr6::new(dst6_addr, dst6_port),
        src4: TransportAddr4::new(src4_addr, src4_port),
        dst4: TransportAddr4::new(dst4_addr, dst4_port),
        proto,
        state,
        timer_type,
        update_time_ms,
        timeout_ms,
        has_stored: false,
    })
}

/// Decodes a concatenation of zero or more packed sessions.
///
/// Rejects the whole payload if its length is not a multiple of
/// [`WIRE_SIZE`], per §6.
pub fn decode_all(payload: &[u8], config: &Config, now_ms: u64) -> Result<Vec<SessionEntry>, SessionWireError> {
    if payload.len() % WIRE_SIZE != 0 {
        return Err(SessionWireError::BufferTooShort { got: payload.len() });
    }
    payload.chunks_exact(WIRE_SIZE).map(|chunk| decode(chunk, config, now_ms)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Prefix6;

    fn test_config() -> Config {
        Config { pool6: Prefix6::new("64:ff9b::".parse().unwrap(), 96).unwrap(), ..Config::default() }
    }

    #[test]
    fn encode_matches_byte_table_for_worked_example() {
        let entry = SessionEntry {
            src6: TransportAddr6::new("2001:db8::1".parse().unwrap(), 5000),
            dst6: TransportAddr6::new("64:ff9b::203.0.113.1".parse().unwrap(), 80),
            src4: TransportAddr4::new(Ipv4Addr::new(192, 0, 2, 1), 40000),
            dst4: TransportAddr4::new(Ipv4Addr::new(203, 0, 113, 1), 80),
            proto: L4Proto::Tcp,
            state: 3,
            timer_type: TimerType::Est,
            update_time_ms: 0,
            timeout_ms: 60_000,
            has_stored: false,
        };
        let bytes = encode(&entry, 0);

        let mut expected = [0u8; WIRE_SIZE];
        expected[0..16].copy_from_slice(&"2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap().octets());
        expected[16..20].copy_from_slice(&Ipv4Addr::new(192, 0, 2, 1).octets());
        expected[20..24].copy_from_slice(&Ipv4Addr::new(203, 0, 113, 1).octets());
        expected[24..28].copy_from_slice(&60_000u32.to_be_bytes());
        expected[28..30].copy_from_slice(&5000u16.to_be_bytes());
        expected[30..32].copy_from_slice(&40000u16.to_be_bytes());
        expected[32..34].copy_from_slice(&80u16.to_be_bytes());
        // proto=TCP(0)<<5 | state=3<<2 | timer=EST(0) = 0b0000_1100 = 12
        expected[34..36].copy_from_slice(&12u16.to_be_bytes());

        assert_eq!(bytes, expected);
    }

    #[test]
    fn decode_reconstructs_dst6_via_rfc6052() {
        let entry = SessionEntry {
            src6: TransportAddr6::new("2001:db8::1".parse().unwrap(), 5000),
            dst6: TransportAddr6::new("::".parse().unwrap(), 0),
            src4: TransportAddr4::new(Ipv4Addr::new(192, 0, 2, 1), 40000),
            dst4: TransportAddr4::new(Ipv4Addr::new(203, 0, 113, 1), 80),
            proto: L4Proto::Tcp,
            state: 3,
            timer_type: TimerType::Est,
            update_time_ms: 0,
            timeout_ms: 60_000,
            has_stored: false,
        };
        let bytes = encode(&entry, 0);
        let config = test_config();
        let decoded = decode(&bytes, &config, 0).unwrap();
        assert_eq!(decoded.dst6.address, "64:ff9b::203.0.113.1".parse::<std::net::Ipv6Addr>().unwrap());
        assert_eq!(decoded.dst6.port, 80);
    }

    #[test]
    fn icmp_dst6_port_copies_from_src6_port() {
        let entry = SessionEntry {
            src6: TransportAddr6::new("2001:db8::1".parse().unwrap(), 77),
            dst6: TransportAddr6::new("::".parse().unwrap(), 0),
            src4: TransportAddr4::new(Ipv4Addr::new(192, 0, 2, 1), 77),
            dst4: TransportAddr4::new(Ipv4Addr::new(203, 0, 113, 1), 999),
            proto: L4Proto::Icmp,
            state: 0,
            timer_type: TimerType::Est,
            update_time_ms: 0,
            timeout_ms: 1000,
            has_stored: false,
        };
        let bytes = encode(&entry, 0);
        let decoded = decode(&bytes, &test_config(), 0).unwrap();
        assert_eq!(decoded.dst6.port, 77);
    }

    #[test]
    fn encode_decode_round_trip_preserves_core_fields() {
        let entry = SessionEntry {
            src6: TransportAddr6::new("2001:db8::1".parse().unwrap(), 5000),
            dst6: TransportAddr6::new("64:ff9b::203.0.113.1".parse().unwrap(), 80),
            src4: TransportAddr4::new(Ipv4Addr::new(192, 0, 2, 1), 40000),
            dst4: TransportAddr4::new(Ipv4Addr::new(203, 0, 113, 1), 80),
            proto: L4Proto::Tcp,
            state: 5,
            timer_type: TimerType::Trans,
            update_time_ms: 1_000_000,
            timeout_ms: 4 * 60 * 1000,
            has_stored: true,
        };
        let now = 1_000_500u64;
        let bytes = encode(&entry, now);
        let decoded = decode(&bytes, &test_config(), now).unwrap();

        assert_eq!(decoded.src6, entry.src6);
        assert_eq!(decoded.src4, entry.src4);
        assert_eq!(decoded.dst4, entry.dst4);
        assert_eq!(decoded.dst6, entry.dst6);
        assert_eq!(decoded.proto, entry.proto);
        assert_eq!(decoded.state, entry.state);
        assert_eq!(decoded.timer_type, entry.timer_type);
        assert!(!decoded.has_stored);
    }

    #[test]
    fn decode_all_rejects_non_multiple_length() {
        let config = test_config();
        assert_eq!(decode_all(&[0u8; 10], &config, 0), Err(SessionWireError::BufferTooShort { got: 10 }));
    }

    #[test]
    fn bolero_encode_decode_preserves_wire_fields() {
        bolero::check!().with_type().for_each(
            |(src6_octets, src4_octets, dst4_octets, src6_port, src4_port, dst4_port, proto_sel, state_raw, timer_sel, timeout_ms): &(
                [u8; 16],
                [u8; 4],
                [u8; 4],
                u16,
                u16,
                u16,
                u8,
                u8,
                u8,
                u32,
            )| {
                let proto = match proto_sel % 3 {
                    0 => L4Proto::Tcp,
                    1 => L4Proto::Udp,
                    _ => L4Proto::Icmp,
                };
                let timer_type = match timer_sel % 3 {
                    0 => TimerType::Est,
                    1 => TimerType::Trans,
                    _ => TimerType::Syn4,
                };
                let state = state_raw % 8;

                let entry = SessionEntry {
                    src6: TransportAddr6::new(std::net::Ipv6Addr::from(*src6_octets), *src6_port),
                    dst6: TransportAddr6::new("::".parse().unwrap(), 0),
                    src4: TransportAddr4::new(Ipv4Addr::from(*src4_octets), *src4_port),
                    dst4: TransportAddr4::new(Ipv4Addr::from(*dst4_octets), *dst4_port),
                    proto,
                    state,
                    timer_type,
                    update_time_ms: 0,
                    timeout_ms: *timeout_ms,
                    has_stored: false,
                };
                let bytes = encode(&entry, 0);
                let decoded = decode(&bytes, &test_config(), 0).unwrap();

                assert_eq!(decoded.src6.address, entry.src6.address);
                assert_eq!(decoded.src6.port, entry.src6.port);
                assert_eq!(decoded.src4, entry.src4);
                assert_eq!(decoded.dst4, entry.dst4);
                assert_eq!(decoded.proto, entry.proto);
                assert_eq!(decoded.state, entry.state);
                assert_eq!(decoded.timer_type, entry.timer_type);
                assert!(!decoded.has_stored);
                if proto == L4Proto::Icmp {
                    assert_eq!(decoded.dst6.port, entry.src6.port);
                } else {
                    assert_eq!(decoded.dst6.port, entry.dst4.port);
                }
            },
        );
    }

    #[test]
    fn decode_all_accepts_concatenated_sessions() {
        let entry = SessionEntry {
            src6: TransportAddr6::new("2001:db8::1".parse().unwrap(), 1),
            dst6: TransportAddr6::new("::".parse().unwrap(), 0),
            src4: TransportAddr4::new(Ipv4Addr::new(192, 0, 2, 1), 1),
            dst4: TransportAddr4::new(Ipv4Addr::new(203, 0, 113, 1), 1),
            proto: L4Proto::Udp,
            state: 0,
            timer_type: TimerType::Est,
            update_time_ms: 0,
            timeout_ms: 1000,
            has_stored: false,
        };
        let one = encode(&entry, 0);
        let mut payload = Vec::new();
        payload.extend_from_slice(&one);
        payload.extend_from_slice(&one);
        let decoded = decode_all(&payload, &test_config(), 0).unwrap();
        assert_eq!(decoded.len(), 2);
    }
}
