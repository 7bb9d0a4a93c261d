// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The concurrent IPv4 transport-address pool.
//!
//! A spinlocked intrusive-list pool re-expressed as an owned, `Vec`-backed
//! sequence guarded by a single coarse lock (the "pool guard"), sourced from
//! the `concurrency` crate so the same logic runs, unmodified, under
//! `std::sync`, `loom` or `shuttle`. There is no cross-referencing between a
//! section and its parent address: every access goes top-down through
//! [`Pool4`].

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use concurrency::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::addr::{L4Proto, TransportAddr4};

/// Errors raised by [`Pool4`]'s public operations.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum Pool4Error {
    /// `addr` already has a `PoolAddress` registered.
    #[error("address {0} is already registered")]
    DuplicateAddress(Ipv4Addr),
    /// `addr` has no `PoolAddress` registered.
    #[error("address {0} is not registered")]
    NotFound(Ipv4Addr),
    /// The pool's backing allocator refused to grow; `register` did not mutate the pool.
    #[error("pool4 allocator is out of memory")]
    OutOfMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SectionKind {
    OddLow,
    EvenLow,
    OddHigh,
    EvenHigh,
}

impl SectionKind {
    const ALL: [SectionKind; 4] =
        [SectionKind::OddLow, SectionKind::EvenLow, SectionKind::OddHigh, SectionKind::EvenHigh];

    fn bounds(self) -> (u16, u16) {
        match self {
            SectionKind::OddLow => (1, 1023),
            SectionKind::EvenLow => (0, 1022),
            SectionKind::OddHigh => (1025, 65535),
            SectionKind::EvenHigh => (1024, 65534),
        }
    }

    /// Picks the section a given port belongs to, by (parity, range).
    fn for_port(port: u16) -> SectionKind {
        let odd = port % 2 == 1;
        if port < 1024 {
            if odd {
                SectionKind::OddLow
            } else {
                SectionKind::EvenLow
            }
        } else if odd {
            SectionKind::OddHigh
        } else {
            SectionKind::EvenHigh
        }
    }
}

/// The twelve sections (3 protocols × 4 parity/range buckets) enrolled for
/// one IPv4 address.
#[derive(Debug, Clone)]
struct PoolAddress {
    address: Ipv4Addr,
    sections: [[BandSection; 4]; 3],
}

/// A parity/range bucket bound to its fixed band, so membership checks do
/// not depend on mutable cursor state.
#[derive(Debug, Clone)]
struct BandSection {
    band_low: u32,
    band_high: u32,
    next_port: u32,
    free_list: VecDeque<u16>,
}

impl BandSection {
    fn new(low: u16, high: u16) -> Self {
        Self {
            band_low: u32::from(low),
            band_high: u32::from(high),
            next_port: u32::from(low),
            free_list: VecDeque::new(),
        }
    }

    fn extract(&mut self) -> Option<u16> {
        if let Some(port) = self.free_list.pop_front() {
            return Some(port);
        }
        if self.next_port <= self.band_high {
            #[allow(clippy::cast_possible_truncation)]
            let port = self.next_port as u16;
            self.next_port += 2;
            return Some(port);
        }
        None
    }

    /// Appends `port` to the free list, using a fallible, non-sleeping
    /// reservation per §5's "allocations inside guarded sections must use a
    /// non-sleeping allocator path and report failure" requirement. Returns
    /// `false` (and leaves the port dropped) if the backing allocator refuses.
    fn give_back(&mut self, port: u16) -> bool {
        if self.free_list.try_reserve(1).is_err() {
            return false;
        }
        self.free_list.push_back(port);
        true
    }
}

fn proto_index(proto: L4Proto) -> usize {
    match proto {
        L4Proto::Tcp => 0,
        L4Proto::Udp => 1,
        L4Proto::Icmp => 2,
    }
}

fn kind_index(kind: SectionKind) -> usize {
    match kind {
        SectionKind::OddLow => 0,
        SectionKind::EvenLow => 1,
        SectionKind::OddHigh => 2,
        SectionKind::EvenHigh => 3,
    }
}

impl PoolAddress {
    fn new(address: Ipv4Addr) -> Self {
        let make_bands = || {
            let mut bands: [BandSection; 4] = [
                BandSection::new(0, 0),
                BandSection::new(0, 0),
                BandSection::new(0, 0),
                BandSection::new(0, 0),
            ];
            for kind in SectionKind::ALL {
                let (low, high) = kind.bounds();
                bands[kind_index(kind)] = BandSection::new(low, high);
            }
            bands
        };
        Self { address, sections: [make_bands(), make_bands(), make_bands()] }
    }

    fn section_mut(&mut self, proto: L4Proto, kind: SectionKind) -> &mut BandSection {
        &mut self.sections[proto_index(proto)][kind_index(kind)]
    }
}

/// A concurrent allocator of (IPv4 address, L4 port) pairs.
///
/// Every public operation takes the pool guard for its entire duration and
/// releases it on every exit path, including error returns; no guarded
/// operation performs blocking I/O or allocation that can sleep.
pub struct Pool4 {
    inner: Mutex<Vec<PoolAddress>>,
}

impl Default for Pool4 {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool4 {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(Vec::new()) }
    }

    /// Appends a new `PoolAddress` at the tail with all twelve sections
    /// initialized empty.
    ///
    /// Grows the backing storage with a non-sleeping, fallible reservation;
    /// if the allocator refuses, `Pool4Error::OutOfMemory` is returned and
    /// the pool is left unmutated.
    pub fn register(&self, addr: Ipv4Addr) -> Result<(), Pool4Error> {
        let mut guard = self.inner.lock().unwrap();
        if guard.iter().any(|pa| pa.address == addr) {
            return Err(Pool4Error::DuplicateAddress(addr));
        }
        guard.try_reserve(1).map_err(|_| Pool4Error::OutOfMemory)?;
        guard.push(PoolAddress::new(addr));
        Ok(())
    }

    /// Removes the `PoolAddress` for `addr` and releases all its free-list entries.
    pub fn unregister(&self, addr: Ipv4Addr) -> Result<(), Pool4Error> {
        let mut guard = self.inner.lock().unwrap();
        let before = guard.len();
        guard.retain(|pa| pa.address != addr);
        if guard.len() == before {
            return Err(Pool4Error::NotFound(addr));
        }
        Ok(())
    }

    /// Whether `addr` is currently enrolled.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.iter().any(|pa| pa.address == addr)
    }

    /// The enrolled addresses, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Ipv4Addr> {
        let guard = self.inner.lock().unwrap();
        guard.iter().map(|pa| pa.address).collect()
    }

    /// Scans enrolled addresses in insertion order, extracting from the
    /// first section (selected by `hint_port`'s parity/range) that yields one.
    ///
    /// `hint_port` only selects the section; the returned port need not
    /// equal `hint_port`; it shares its parity and range band.
    #[must_use]
    pub fn get_any(&self, proto: L4Proto, hint_port: u16) -> Option<TransportAddr4> {
        let kind = SectionKind::for_port(hint_port);
        let mut guard = self.inner.lock().unwrap();
        for pa in guard.iter_mut() {
            let address = pa.address;
            let section = pa.section_mut(proto, kind);
            if let Some(port) = section.extract() {
                return Some(TransportAddr4::new(address, port));
            }
        }
        debug!(?proto, hint_port, "pool4 section exhausted across all addresses");
        None
    }

    /// Locates the `PoolAddress` equal to `taddr.address` and extracts from
    /// the section matching `taddr.port`'s parity/range.
    #[must_use]
    pub fn get_similar(&self, proto: L4Proto, taddr: TransportAddr4) -> Option<TransportAddr4> {
        let kind = SectionKind::for_port(taddr.port);
        let mut guard = self.inner.lock().unwrap();
        let pa = guard.iter_mut().find(|pa| pa.address == taddr.address)?;
        let section = pa.section_mut(proto, kind);
        let port = section.extract();
        if port.is_none() {
            debug!(?proto, %taddr.address, "pool4 section exhausted for address");
        }
        port.map(|port| TransportAddr4::new(taddr.address, port))
    }

    /// Appends `taddr.port` to the tail of its section's free list.
    ///
    /// Caller invariant: a port is returned at most once per allocation; no
    /// deduplication is performed.
    pub fn return_port(&self, proto: L4Proto, taddr: TransportAddr4) -> Result<(), Pool4Error> {
        let kind = SectionKind::for_port(taddr.port);
        let mut guard = self.inner.lock().unwrap();
        let pa = guard
            .iter_mut()
            .find(|pa| pa.address == taddr.address)
            .ok_or(Pool4Error::NotFound(taddr.address))?;
        let section = pa.section_mut(proto, kind);
        if !section.give_back(taddr.port) {
            warn!(port = taddr.port, %taddr.address, "pool4 return_port: out of memory growing free list; port dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concurrency::concurrency_mode;

    #[test]
    fn register_duplicate_is_rejected_without_mutation() {
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        pool.register(addr).unwrap();
        assert_eq!(pool.register(addr), Err(Pool4Error::DuplicateAddress(addr)));
        assert_eq!(pool.snapshot(), vec![addr]);
    }

    #[test]
    fn contains_matches_snapshot_membership() {
        let pool = Pool4::new();
        let a = Ipv4Addr::new(192, 0, 2, 1);
        let b = Ipv4Addr::new(192, 0, 2, 2);
        pool.register(a).unwrap();
        assert!(pool.contains(a));
        assert!(!pool.contains(b));
        pool.unregister(a).unwrap();
        assert!(!pool.contains(a));
        assert!(pool.snapshot().is_empty());
    }

    #[test]
    fn unregister_missing_address_is_not_found() {
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        assert_eq!(pool.unregister(addr), Err(Pool4Error::NotFound(addr)));
    }

    #[test]
    fn scenario_1_reuse_after_return() {
        // Register 192.0.2.1; get_any(UDP, hint=1000) (even_low) yields
        // (192.0.2.1, 0); repeat yields (192.0.2.1, 2); return_port(UDP,
        // (192.0.2.1, 0)); next get_any(UDP, hint=1000) yields (192.0.2.1, 0).
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        pool.register(addr).unwrap();

        let first = pool.get_any(L4Proto::Udp, 1000).unwrap();
        assert_eq!(first, TransportAddr4::new(addr, 0));

        let second = pool.get_any(L4Proto::Udp, 1000).unwrap();
        assert_eq!(second, TransportAddr4::new(addr, 2));

        pool.return_port(L4Proto::Udp, first).unwrap();

        let third = pool.get_any(L4Proto::Udp, 1000).unwrap();
        assert_eq!(third, TransportAddr4::new(addr, 0));
    }

    #[test]
    fn scenario_2_exhaustion_spills_to_next_address() {
        // Register 192.0.2.1 then 192.0.2.2. Exhaust 192.0.2.1's odd_high
        // section entirely via 32,256 calls to get_any(TCP, hint=1025); the
        // 32,257th call yields (192.0.2.2, 1025).
        let pool = Pool4::new();
        let a = Ipv4Addr::new(192, 0, 2, 1);
        let b = Ipv4Addr::new(192, 0, 2, 2);
        pool.register(a).unwrap();
        pool.register(b).unwrap();

        // odd_high spans [1025, 65535] step 2: (65535 - 1025) / 2 + 1 = 32256 ports.
        for _ in 0..32_256 {
            let got = pool.get_any(L4Proto::Tcp, 1025).unwrap();
            assert_eq!(got.address, a);
        }
        let spill = pool.get_any(L4Proto::Tcp, 1025).unwrap();
        assert_eq!(spill, TransportAddr4::new(b, 1025));
    }

    #[test]
    fn scenario_6_get_similar_requires_exact_address() {
        let pool = Pool4::new();
        let other = Ipv4Addr::new(192, 0, 2, 2);
        pool.register(other).unwrap();

        let missing = Ipv4Addr::new(192, 0, 2, 1);
        assert_eq!(pool.get_similar(L4Proto::Tcp, TransportAddr4::new(missing, 443)), None);

        let got = pool.get_similar(L4Proto::Tcp, TransportAddr4::new(other, 443)).unwrap();
        assert_eq!(got.address, other);
        assert_eq!(got.port % 2, 1);
        assert!(got.port >= 1024);
    }

    #[test]
    fn boundary_ports_map_to_expected_sections() {
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        pool.register(addr).unwrap();

        assert_eq!(pool.get_any(L4Proto::Tcp, 0).unwrap().port, 0);
        assert_eq!(pool.get_any(L4Proto::Udp, 1023).unwrap().port, 1);
        assert_eq!(pool.get_any(L4Proto::Icmp, 1024).unwrap().port, 1024);
        assert_eq!(pool.get_any(L4Proto::Tcp, 65535).unwrap().port, 1025);
    }

    #[test]
    fn return_then_extract_yields_returned_port_before_rollover() {
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        pool.register(addr).unwrap();

        // Drain odd_high down to its last port, 65535.
        for _ in 0..32_255 {
            pool.get_any(L4Proto::Tcp, 1025).unwrap();
        }
        let last = pool.get_any(L4Proto::Tcp, 1025).unwrap();
        assert_eq!(last.port, 65535);
        assert_eq!(pool.get_any(L4Proto::Tcp, 1025), None);

        pool.return_port(L4Proto::Tcp, last).unwrap();
        let reused = pool.get_any(L4Proto::Tcp, 1025).unwrap();
        assert_eq!(reused.port, 65535);
    }

    #[test]
    fn bolero_contains_matches_snapshot_after_any_register_unregister_sequence() {
        bolero::check!().with_type().for_each(|ops: &Vec<(bool, u8)>| {
            let pool = Pool4::new();
            const CANDIDATES: [Ipv4Addr; 4] = [
                Ipv4Addr::new(192, 0, 2, 1),
                Ipv4Addr::new(192, 0, 2, 2),
                Ipv4Addr::new(192, 0, 2, 3),
                Ipv4Addr::new(192, 0, 2, 4),
            ];
            for &(register, idx) in ops {
                let addr = CANDIDATES[usize::from(idx % 4)];
                if register {
                    let _ = pool.register(addr);
                } else {
                    let _ = pool.unregister(addr);
                }
            }
            let snapshot = pool.snapshot();
            for addr in CANDIDATES {
                assert_eq!(pool.contains(addr), snapshot.contains(&addr));
            }
        });
    }

    #[test]
    fn return_port_on_unregistered_address_is_not_found() {
        let pool = Pool4::new();
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        assert_eq!(
            pool.return_port(L4Proto::Tcp, TransportAddr4::new(addr, 1025)),
            Err(Pool4Error::NotFound(addr))
        );
    }

    #[concurrency_mode(shuttle)]
    mod shuttle_tests {
        use super::*;
        use concurrency::sync::Arc;
        use concurrency::thread;

        #[test]
        fn concurrent_get_any_and_return_port_never_double_allocate() {
            shuttle::check_random(
                || {
                    let pool = Arc::new(Pool4::new());
                    let addr = Ipv4Addr::new(192, 0, 2, 1);
                    pool.register(addr).unwrap();

                    let allocator = {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            let first = pool.get_any(L4Proto::Udp, 1000).unwrap();
                            let second = pool.get_any(L4Proto::Udp, 1000).unwrap();
                            assert_ne!(first, second);
                            pool.return_port(L4Proto::Udp, first).unwrap();
                        })
                    };
                    let observer = {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            // Any concurrently observed allocation must belong to
                            // the registered address and the even_low band.
                            if let Some(taddr) = pool.get_any(L4Proto::Udp, 1000) {
                                assert_eq!(taddr.address, addr);
                                assert_eq!(taddr.port % 2, 0);
                                assert!(taddr.port <= 1022);
                            }
                        })
                    };
                    allocator.join().unwrap();
                    observer.join().unwrap();
                },
                100,
            );
        }
    }
}
