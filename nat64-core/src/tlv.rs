// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A schema-driven codec over a length-tagged attribute stream.
//!
//! Each attribute is a `(type_id: u16, len: u16, payload)` triplet; a
//! container attribute's payload is itself a nested attribute stream. This
//! is a from-scratch, much smaller re-expression of the netlink `nla_*`
//! attribute ABI the original control-plane tool speaks: fixed 4-byte
//! headers (no netlink alignment padding), the same "required scalar,
//! optional nested, cancel-on-failure writer" shape, but no wire
//! compatibility is claimed with netlink itself.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

use crate::addr::{AddressError, L4Proto, Prefix4, Prefix6, TransportAddr4, TransportAddr6};
use crate::model::{BibEntry, EamtEntry, MappingRule, MtuPlateaus, Pool4Entry};
use crate::validate::{self, ValidationError};

/// Attribute type identifiers used by this crate's composite records.
///
/// These are internal to the nested containers built by [`AttrWriter`] and
/// consumed by the `get_*` functions below; they are not part of any
/// externally fixed wire contract.
mod tag {
    pub const LEN: u16 = 1;
    pub const ADDR: u16 = 2;
    pub const PORT: u16 = 3;
    pub const PREFIX6: u16 = 4;
    pub const PREFIX4: u16 = 5;
    pub const SRC6: u16 = 6;
    pub const SRC4: u16 = 7;
    pub const IS_STATIC: u16 = 8;
    pub const MARK: u16 = 9;
    pub const ITERATIONS: u16 = 10;
    pub const FLAGS: u16 = 11;
    pub const PROTO: u16 = 12;
    pub const PORT_MIN: u16 = 13;
    pub const PORT_MAX: u16 = 14;
    pub const EA_BITS_LENGTH: u16 = 15;
    pub const PSID_OFFSET: u16 = 16;
    pub const PLATEAU: u16 = 17;
}

/// Errors raised while decoding or encoding attributes.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TlvError {
    /// A required attribute was not present in the stream.
    #[error("missing required attribute `{0}`")]
    MissingAttribute(String),
    /// An attribute's payload was shorter than its type requires.
    #[error("attribute `{name}` is too short: got {got} bytes, expected at least {expected}")]
    ShortAttribute {
        /// The attribute's diagnostic name.
        name: String,
        /// The payload length actually present.
        got: usize,
        /// The minimum payload length required.
        expected: usize,
    },
    /// A string attribute had no NUL terminator within its bound.
    #[error("attribute `{0}` is not NUL-terminated within its bound")]
    MalformedString(String),
    /// A nested attribute was missing a required child or otherwise ill-formed.
    #[error("nested attribute `{0}` is malformed or missing a required child")]
    MalformedNested(String),
    /// A decoded value fell outside its valid range.
    #[error("attribute `{0}` value is out of range")]
    OutOfRange(String),
    /// The writer's output buffer could not hold the attribute being written.
    #[error("output buffer is too small to hold this attribute")]
    OutputTooSmall,
    /// An L4 protocol discriminant did not match TCP, UDP or ICMP.
    #[error("unrecognized L4 protocol discriminant {0}")]
    InvalidProtocol(u8),
}

impl From<ValidationError> for TlvError {
    fn from(e: ValidationError) -> Self {
        TlvError::OutOfRange(e.to_string())
    }
}

/// A read-only view over an attribute stream.
#[derive(Debug, Clone, Copy)]
pub struct AttrReader<'a> {
    data: &'a [u8],
}

/// Iterator over the `(type_id, payload)` pairs of an [`AttrReader`].
pub struct AttrIter<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.len() < 4 {
            return None;
        }
        let type_id = u16::from_be_bytes([self.remaining[0], self.remaining[1]]);
        let len = u16::from_be_bytes([self.remaining[2], self.remaining[3]]) as usize;
        let start = 4;
        let end = start.checked_add(len)?;
        if self.remaining.len() < end {
            return None;
        }
        let payload = &self.remaining[start..end];
        self.remaining = &self.remaining[end..];
        Some((type_id, payload))
    }
}

impl<'a> AttrReader<'a> {
    /// Wraps a byte slice as an attribute stream.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Iterates the stream's top-level `(type_id, payload)` pairs in order.
    #[must_use]
    pub fn iter(&self) -> AttrIter<'a> {
        AttrIter { remaining: self.data }
    }

    /// Returns the payload of the first attribute matching `type_id`.
    #[must_use]
    pub fn find(&self, type_id: u16) -> Option<&'a [u8]> {
        self.iter().find(|(t, _)| *t == type_id).map(|(_, p)| p)
    }

    fn nested(&self, type_id: u16, name: &str) -> Result<AttrReader<'a>, TlvError> {
        self.find(type_id)
            .map(AttrReader::new)
            .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))
    }
}

/// Reads a required `u8` attribute.
pub fn get_u8(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<u8, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    payload
        .first()
        .copied()
        .ok_or_else(|| TlvError::ShortAttribute { name: name.to_string(), got: 0, expected: 1 })
}

/// Reads a required `u16` attribute (network byte order).
pub fn get_u16(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<u16, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    if payload.len() < 2 {
        return Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 2 });
    }
    Ok(u16::from_be_bytes([payload[0], payload[1]]))
}

/// Reads a required `u32` attribute (network byte order).
pub fn get_u32(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<u32, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    if payload.len() < 4 {
        return Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 4 });
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

fn get_u8_opt(reader: &AttrReader<'_>, type_id: u16, name: &str, default: u8) -> Result<u8, TlvError> {
    match reader.find(type_id) {
        None => Ok(default),
        Some(payload) => payload
            .first()
            .copied()
            .ok_or_else(|| TlvError::ShortAttribute { name: name.to_string(), got: 0, expected: 1 }),
    }
}

fn get_u32_opt(reader: &AttrReader<'_>, type_id: u16, name: &str, default: u32) -> Result<u32, TlvError> {
    match reader.find(type_id) {
        None => Ok(default),
        Some(payload) if payload.len() >= 4 => {
            Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
        }
        Some(payload) => Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 4 }),
    }
}

/// Reads a required NUL-terminated string attribute, bounded by `max_size` bytes.
pub fn get_str(reader: &AttrReader<'_>, type_id: u16, name: &str, max_size: usize) -> Result<String, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    let bound = max_size.min(payload.len());
    let nul_pos = payload[..bound].iter().position(|&b| b == 0);
    match nul_pos {
        Some(pos) => Ok(String::from_utf8_lossy(&payload[..pos]).into_owned()),
        None => Err(TlvError::MalformedString(name.to_string())),
    }
}

/// Reads a required raw IPv4 address attribute (4 bytes).
pub fn get_addr4(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Ipv4Addr, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    if payload.len() < 4 {
        return Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 4 });
    }
    Ok(Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]))
}

/// Reads a required raw IPv6 address attribute (16 bytes).
pub fn get_addr6(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Ipv6Addr, TlvError> {
    let payload = reader
        .find(type_id)
        .ok_or_else(|| TlvError::MissingAttribute(name.to_string()))?;
    if payload.len() < 16 {
        return Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 16 });
    }
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&payload[..16]);
    Ok(Ipv6Addr::from(octets))
}

fn proto_from_wire(value: u8) -> Result<L4Proto, TlvError> {
    L4Proto::from_wire(value).map_err(|_| TlvError::InvalidProtocol(value))
}

/// Reads a prefix-4 nested attribute: required `LEN`, optional `ADDR`.
///
/// Returns `Ok(None)` when `ADDR` is absent (the "unset" prefix case).
pub fn get_prefix4(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Option<Prefix4>, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let len = get_u8(&nested, tag::LEN, &format!("{name}.len"))?;
    match nested.find(tag::ADDR) {
        None => Ok(None),
        Some(payload) => {
            if payload.len() < 4 {
                return Err(TlvError::ShortAttribute {
                    name: format!("{name}.addr"),
                    got: payload.len(),
                    expected: 4,
                });
            }
            let addr = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
            Prefix4::new(addr, len)
                .map(Some)
                .map_err(|_: AddressError| TlvError::OutOfRange(name.to_string()))
        }
    }
}

/// Reads a prefix-6 nested attribute: required `LEN`, optional `ADDR`.
///
/// Returns `Ok(None)` when `ADDR` is absent (the "unset" prefix case).
pub fn get_prefix6(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Option<Prefix6>, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let len = get_u8(&nested, tag::LEN, &format!("{name}.len"))?;
    match nested.find(tag::ADDR) {
        None => Ok(None),
        Some(payload) => {
            if payload.len() < 16 {
                return Err(TlvError::ShortAttribute {
                    name: format!("{name}.addr"),
                    got: payload.len(),
                    expected: 16,
                });
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&payload[..16]);
            Prefix6::new(Ipv6Addr::from(octets), len)
                .map(Some)
                .map_err(|_: AddressError| TlvError::OutOfRange(name.to_string()))
        }
    }
}

/// Reads a transport-address-4 nested attribute: required `ADDR` + `PORT`.
pub fn get_taddr4(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<TransportAddr4, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let address = get_addr4(&nested, tag::ADDR, &format!("{name}.addr"))?;
    let port = get_u16(&nested, tag::PORT, &format!("{name}.port"))?;
    Ok(TransportAddr4::new(address, port))
}

/// Reads a transport-address-6 nested attribute: required `ADDR` + `PORT`.
pub fn get_taddr6(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<TransportAddr6, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let address = get_addr6(&nested, tag::ADDR, &format!("{name}.addr"))?;
    let port = get_u16(&nested, tag::PORT, &format!("{name}.port"))?;
    Ok(TransportAddr6::new(address, port))
}

/// Reads an EAM nested attribute: required `PREFIX6` + `PREFIX4`.
pub fn get_eam(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<EamtEntry, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let prefix6 = get_prefix6(&nested, tag::PREFIX6, &format!("{name}.prefix6"))?
        .ok_or_else(|| TlvError::MalformedNested(format!("{name}.prefix6")))?;
    let prefix4 = get_prefix4(&nested, tag::PREFIX4, &format!("{name}.prefix4"))?
        .ok_or_else(|| TlvError::MalformedNested(format!("{name}.prefix4")))?;
    Ok(EamtEntry { prefix6, prefix4 })
}

/// Reads a pool4-entry nested attribute (§6): optional `MARK`/`ITERATIONS`/`FLAGS`,
/// required `PROTO`/`PREFIX`/`PORT_MIN`/`PORT_MAX`.
pub fn get_pool4_entry(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Pool4Entry, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let mark = get_u32_opt(&nested, tag::MARK, &format!("{name}.mark"), 0)?;
    let iterations = get_u32_opt(&nested, tag::ITERATIONS, &format!("{name}.iterations"), 0)?;
    let flags = get_u8_opt(&nested, tag::FLAGS, &format!("{name}.flags"), 0)?;
    let proto = proto_from_wire(get_u8(&nested, tag::PROTO, &format!("{name}.proto"))?)?;
    let prefix = get_prefix4(&nested, tag::PREFIX4, &format!("{name}.prefix"))?
        .ok_or_else(|| TlvError::MalformedNested(format!("{name}.prefix")))?;
    let port_min = get_u16(&nested, tag::PORT_MIN, &format!("{name}.port_min"))?;
    let port_max = get_u16(&nested, tag::PORT_MAX, &format!("{name}.port_max"))?;
    Ok(Pool4Entry { mark, iterations, flags, proto, prefix, port_min, port_max })
}

/// Reads a BIB-entry nested attribute: required `SRC6`/`SRC4`/`PROTO`, optional `IS_STATIC`.
pub fn get_bib_entry(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<BibEntry, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let addr6 = get_taddr6(&nested, tag::SRC6, &format!("{name}.src6"))?;
    let addr4 = get_taddr4(&nested, tag::SRC4, &format!("{name}.src4"))?;
    let proto = proto_from_wire(get_u8(&nested, tag::PROTO, &format!("{name}.proto"))?)?;
    let is_static = get_u8_opt(&nested, tag::IS_STATIC, &format!("{name}.is_static"), 0)? != 0;
    Ok(BibEntry { addr6, addr4, proto, is_static })
}

/// Reads a mapping-rule nested attribute.
///
/// Returns `Ok(None)` when `PREFIX4` is absent (the whole rule is "unset"),
/// checked before `PREFIX6` is ever touched, matching the original
/// `jnla_get_mapping_rule`'s `if (!attrs[JNLAMR_PREFIX4]) { set = false; }`
/// short circuit.
pub fn get_mapping_rule(reader: &AttrReader<'_>, type_id: u16, name: &str) -> Result<Option<MappingRule>, TlvError> {
    let nested = reader.nested(type_id, name)?;
    if nested.find(tag::PREFIX4).is_none() {
        return Ok(None);
    }
    let prefix6 = get_prefix6(&nested, tag::PREFIX6, &format!("{name}.prefix6"))?
        .ok_or_else(|| TlvError::MalformedNested(format!("{name}.prefix6")))?;
    let prefix4 = get_prefix4(&nested, tag::PREFIX4, &format!("{name}.prefix4"))?
        .ok_or_else(|| TlvError::MalformedNested(format!("{name}.prefix4")))?;
    let o = get_u8(&nested, tag::EA_BITS_LENGTH, &format!("{name}.o"))?;
    let a = get_u8_opt(&nested, tag::PSID_OFFSET, &format!("{name}.a"), 6)?;
    Ok(Some(MappingRule { prefix6, prefix4, o, a }))
}

/// Reads a plateau-list nested attribute: repeated `u16` children, then
/// sort-descending/dedup/drop-zero via [`crate::validate::validate_plateaus`].
pub fn get_mtu_plateaus(
    reader: &AttrReader<'_>,
    type_id: u16,
    name: &str,
    max: usize,
) -> Result<MtuPlateaus, TlvError> {
    let nested = reader.nested(type_id, name)?;
    let mut values = Vec::new();
    for (t, payload) in nested.iter() {
        if t != tag::PLATEAU {
            continue;
        }
        validate::check_plateau_count(values.len() + 1, max)?;
        if payload.len() < 2 {
            return Err(TlvError::ShortAttribute { name: name.to_string(), got: payload.len(), expected: 2 });
        }
        values.push(u16::from_be_bytes([payload[0], payload[1]]));
    }
    Ok(validate::validate_plateaus(values)?)
}

/// A bounded-capacity attribute-stream writer with a transactional
/// cancel-on-failure discipline for nested containers.
pub struct AttrWriter {
    buf: Vec<u8>,
    max_len: usize,
}

impl AttrWriter {
    /// Creates a writer that will refuse to grow past `max_len` bytes.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self { buf: Vec::new(), max_len }
    }

    /// Consumes the writer, returning the bytes written so far.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn reserve(&mut self, extra: usize) -> Result<(), TlvError> {
        if self.buf.len().saturating_add(extra) > self.max_len {
            return Err(TlvError::OutputTooSmall);
        }
        Ok(())
    }

    fn put_header(&mut self, type_id: u16, len: u16) -> Result<(), TlvError> {
        self.reserve(4)?;
        self.buf.extend_from_slice(&type_id.to_be_bytes());
        self.buf.extend_from_slice(&len.to_be_bytes());
        Ok(())
    }

    /// Writes a `u8` attribute.
    pub fn put_u8(&mut self, type_id: u16, value: u8) -> Result<(), TlvError> {
        self.reserve(4 + 1)?;
        self.put_header(type_id, 1)?;
        self.buf.push(value);
        Ok(())
    }

    /// Writes a `u16` attribute (network byte order).
    pub fn put_u16(&mut self, type_id: u16, value: u16) -> Result<(), TlvError> {
        self.reserve(4 + 2)?;
        self.put_header(type_id, 2)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Writes a `u32` attribute (network byte order).
    pub fn put_u32(&mut self, type_id: u16, value: u32) -> Result<(), TlvError> {
        self.reserve(4 + 4)?;
        self.put_header(type_id, 4)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Writes a NUL-terminated string attribute.
    pub fn put_str(&mut self, type_id: u16, value: &str) -> Result<(), TlvError> {
        let bytes = value.as_bytes();
        let total = bytes.len() + 1;
        self.reserve(4 + total)?;
        self.put_header(type_id, total as u16)?;
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok(())
    }

    /// Writes a raw IPv4 address attribute.
    pub fn put_addr4(&mut self, type_id: u16, addr: Ipv4Addr) -> Result<(), TlvError> {
        self.reserve(4 + 4)?;
        self.put_header(type_id, 4)?;
        self.buf.extend_from_slice(&addr.octets());
        Ok(())
    }

    /// Writes a raw IPv6 address attribute.
    pub fn put_addr6(&mut self, type_id: u16, addr: Ipv6Addr) -> Result<(), TlvError> {
        self.reserve(4 + 16)?;
        self.put_header(type_id, 16)?;
        self.buf.extend_from_slice(&addr.octets());
        Ok(())
    }

    fn begin_nested(&mut self, type_id: u16) -> Result<usize, TlvError> {
        self.reserve(4)?;
        let mark = self.buf.len();
        self.buf.extend_from_slice(&type_id.to_be_bytes());
        self.buf.extend_from_slice(&0u16.to_be_bytes());
        Ok(mark)
    }

    fn cancel_nested(&mut self, mark: usize) {
        self.buf.truncate(mark);
    }

    fn end_nested(&mut self, mark: usize) -> Result<(), TlvError> {
        let payload_len = self.buf.len() - mark - 4;
        if payload_len > usize::from(u16::MAX) {
            self.cancel_nested(mark);
            return Err(TlvError::OutputTooSmall);
        }
        let len_bytes = (payload_len as u16).to_be_bytes();
        self.buf[mark + 2..mark + 4].copy_from_slice(&len_bytes);
        Ok(())
    }

    /// Opens a nested container, runs `body`, and either commits the
    /// container's length header or cancels the whole write on failure.
    fn write_nested<F>(&mut self, type_id: u16, body: F) -> Result<(), TlvError>
    where
        F: FnOnce(&mut Self) -> Result<(), TlvError>,
    {
        let mark = self.begin_nested(type_id)?;
        match body(self) {
            Ok(()) => self.end_nested(mark),
            Err(e) => {
                self.cancel_nested(mark);
                Err(e)
            }
        }
    }

    /// Writes a prefix-4 nested attribute. `None` writes only `LEN = 0`.
    pub fn put_prefix4(&mut self, type_id: u16, prefix: Option<&Prefix4>) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| match prefix {
            None => w.put_u8(tag::LEN, 0),
            Some(p) => {
                w.put_u8(tag::LEN, p.len())?;
                w.put_addr4(tag::ADDR, p.address())
            }
        })
    }

    /// Writes a prefix-6 nested attribute. `None` writes only `LEN = 0`.
    pub fn put_prefix6(&mut self, type_id: u16, prefix: Option<&Prefix6>) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| match prefix {
            None => w.put_u8(tag::LEN, 0),
            Some(p) => {
                w.put_u8(tag::LEN, p.len())?;
                w.put_addr6(tag::ADDR, p.address())
            }
        })
    }

    /// Writes a transport-address-4 nested attribute.
    pub fn put_taddr4(&mut self, type_id: u16, taddr: &TransportAddr4) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            w.put_addr4(tag::ADDR, taddr.address)?;
            w.put_u16(tag::PORT, taddr.port)
        })
    }

    /// Writes a transport-address-6 nested attribute.
    pub fn put_taddr6(&mut self, type_id: u16, taddr: &TransportAddr6) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            w.put_addr6(tag::ADDR, taddr.address)?;
            w.put_u16(tag::PORT, taddr.port)
        })
    }

    /// Writes an EAM nested attribute.
    pub fn put_eam(&mut self, type_id: u16, eam: &EamtEntry) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            w.put_prefix6(tag::PREFIX6, Some(&eam.prefix6))?;
            w.put_prefix4(tag::PREFIX4, Some(&eam.prefix4))
        })
    }

    /// Writes a pool4-entry nested attribute.
    pub fn put_pool4_entry(&mut self, type_id: u16, entry: &Pool4Entry) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            w.put_u32(tag::MARK, entry.mark)?;
            w.put_u32(tag::ITERATIONS, entry.iterations)?;
            w.put_u8(tag::FLAGS, entry.flags)?;
            w.put_u8(tag::PROTO, entry.proto.to_wire())?;
            w.put_prefix4(tag::PREFIX4, Some(&entry.prefix))?;
            w.put_u16(tag::PORT_MIN, entry.port_min)?;
            w.put_u16(tag::PORT_MAX, entry.port_max)
        })
    }

    /// Writes a BIB-entry nested attribute.
    pub fn put_bib_entry(&mut self, type_id: u16, bib: &BibEntry) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            w.put_taddr6(tag::SRC6, &bib.addr6)?;
            w.put_taddr4(tag::SRC4, &bib.addr4)?;
            w.put_u8(tag::PROTO, bib.proto.to_wire())?;
            if bib.is_static {
                w.put_u8(tag::IS_STATIC, 1)
            } else {
                Ok(())
            }
        })
    }

    /// Writes a mapping-rule nested attribute. `None` still writes an unset
    /// `PREFIX6` child (matching `jnla_put_mapping_rule`'s unset branch,
    /// which calls `jnla_put_prefix6(skb, JNLAMR_PREFIX6, NULL)`), but no
    /// `PREFIX4`, so the matching getter sees `PREFIX4` absent and reports
    /// the whole rule "unset".
    pub fn put_mapping_rule(&mut self, type_id: u16, rule: Option<&MappingRule>) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| match rule {
            None => w.put_prefix6(tag::PREFIX6, None),
            Some(r) => {
                w.put_prefix6(tag::PREFIX6, Some(&r.prefix6))?;
                w.put_prefix4(tag::PREFIX4, Some(&r.prefix4))?;
                w.put_u8(tag::EA_BITS_LENGTH, r.o)?;
                w.put_u8(tag::PSID_OFFSET, r.a)
            }
        })
    }

    /// Writes a plateau-list nested attribute.
    pub fn put_plateaus(&mut self, type_id: u16, plateaus: &MtuPlateaus) -> Result<(), TlvError> {
        self.write_nested(type_id, |w| {
            for v in plateaus.values() {
                w.put_u16(tag::PLATEAU, *v)?;
            }
            Ok(())
        })
    }
}
