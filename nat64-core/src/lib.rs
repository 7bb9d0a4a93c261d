// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(clippy::module_name_repetitions)]

//! Core support systems for a NAT64 (IPv6-to-IPv4 stateful) translator:
//! the `pool4` transport-address pool allocator and the `joold`
//! session-replication codec built on top of a typed TLV attribute layer.
//!
//! # Example
//!
//! ```
//! use nat64_core::addr::L4Proto;
//! use nat64_core::pool4::Pool4;
//! use std::net::Ipv4Addr;
//!
//! let pool = Pool4::default();
//! pool.register(Ipv4Addr::new(192, 0, 2, 1)).unwrap();
//! let taddr = pool.get_any(L4Proto::Udp, 2000).unwrap();
//! assert_eq!(taddr.address, Ipv4Addr::new(192, 0, 2, 1));
//! pool.return_port(L4Proto::Udp, taddr).unwrap();
//! ```
//!
//! # Limitations
//!
//! This crate is subject to the following limitations:
//!
//! - Only `/96` IPv6 prefixes are supported for RFC 6052 address
//!   derivation; general EAM-based translation is covered structurally
//!   but this crate does not itself run a full translation pipeline.
//! - The session table, the joold network transport and the packet
//!   datapath are out of scope: this crate only encodes/decodes the
//!   wire formats and dispatches control operations to caller-supplied
//!   callbacks.

pub mod addr;
pub mod config;
pub mod dispatch;
pub mod model;
pub mod pool4;
pub mod session;
pub mod tlv;
pub mod validate;

pub use config::Config;
pub use dispatch::{dispatch, DispatchError, DispatchOutcome, JoolCallbacks, Operation};
pub use pool4::{Pool4, Pool4Error};
pub use session::{SessionEntry, SessionWireError, TimerType, WIRE_SIZE};
