//! # Skein Nameserver Address Store
//!
//! Maps zones to reachable nameserver addresses and tracks per-address RTT.
//! The store starts out knowing only the root servers; it learns everything
//! below the root from referral responses fed to [`NameserverStore::learn_delegation`].
//!
//! Lookups are asynchronous: the answer is delivered through a callback that
//! never runs on the caller's stack, and an outstanding request can be
//! cancelled. After [`NameserverStore::cancel`] returns, the callback will
//! not be invoked.

use dashmap::DashMap;
use rand::seq::SliceRandom;
use skein_proto::{Message, Name, RData, RecordClass, RecordType};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub mod address;
pub mod hints;

pub use address::{NameserverAddress, RttSample};
pub use hints::{builtin_root_addrs, ROOT_HINTS};

/// Outcome of an address lookup.
#[derive(Debug, Clone)]
pub enum AddressOutcome {
    /// A nameserver address for the zone.
    Found(NameserverAddress),
    /// No address is known for the zone or any ancestor.
    Unreachable,
}

/// Handle to an outstanding address request; pass to [`NameserverStore::cancel`].
#[derive(Debug)]
pub struct AddressRequest {
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ZoneKey {
    zone: Name,
    class: RecordClass,
}

impl ZoneKey {
    fn new(zone: &Name, class: RecordClass) -> Self {
        Self {
            zone: zone.lowercased(),
            class,
        }
    }
}

/// The nameserver address store.
pub struct NameserverStore {
    zones: DashMap<ZoneKey, Vec<NameserverAddress>>,
    /// Requests that have been issued but neither delivered nor cancelled.
    /// Delivery and cancellation race to remove the entry; the winner
    /// decides whether the callback runs.
    pending: Arc<DashMap<u64, ()>>,
    next_request_id: AtomicU64,
}

impl NameserverStore {
    /// Creates a store seeded with the built-in IANA root hints.
    pub fn new() -> Self {
        Self::with_root_hints(hints::builtin_root_addrs())
    }

    /// Creates a store seeded with the given root server addresses.
    ///
    /// Tests point this at mock servers; production deployments may use it
    /// to load a hints file.
    pub fn with_root_hints(addrs: Vec<SocketAddr>) -> Self {
        let store = Self {
            zones: DashMap::new(),
            pending: Arc::new(DashMap::new()),
            next_request_id: AtomicU64::new(1),
        };
        store.seed_zone(&Name::root(), RecordClass::In, addrs);
        store
    }

    /// Replaces the address list for a zone.
    pub fn seed_zone(&self, zone: &Name, class: RecordClass, addrs: Vec<SocketAddr>) {
        let entries = addrs.into_iter().map(NameserverAddress::new).collect();
        self.zones.insert(ZoneKey::new(zone, class), entries);
    }

    /// Requests a reachable nameserver address for a zone.
    ///
    /// `notify` is invoked exactly once from a spawned task — never on this
    /// call stack — unless the request is cancelled first.
    pub fn lookup(
        &self,
        zone: &Name,
        class: RecordClass,
        notify: impl FnOnce(AddressOutcome) + Send + 'static,
    ) -> AddressRequest {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.pending.insert(id, ());

        let outcome = match self.select(zone, class) {
            Some(address) => {
                trace!(zone = %zone, addr = %address.socket_addr(), "nameserver selected");
                AddressOutcome::Found(address)
            }
            None => {
                debug!(zone = %zone, "no nameserver known for zone or any ancestor");
                AddressOutcome::Unreachable
            }
        };

        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            // Claim the request; a concurrent cancel may have taken it.
            if pending.remove(&id).is_some() {
                notify(outcome);
            }
        });

        AddressRequest { id }
    }

    /// Cancels an outstanding request. Idempotent. Once this returns, the
    /// request's callback will not be invoked.
    pub fn cancel(&self, request: &AddressRequest) {
        self.pending.remove(&request.id);
    }

    /// Picks the best known address for a zone, walking up through parent
    /// zones to the root. Lowest smoothed RTT wins; unmeasured addresses
    /// count as fastest, and ties are broken randomly.
    fn select(&self, zone: &Name, class: RecordClass) -> Option<NameserverAddress> {
        let mut current = zone.clone();
        loop {
            if let Some(entries) = self.zones.get(&ZoneKey::new(&current, class)) {
                if let Some(address) = pick_fastest(&entries) {
                    return Some(address);
                }
            }
            current = current.parent()?;
        }
    }

    /// Learns NS names and glue addresses from a referral response.
    ///
    /// The delegated zone is the owner of the NS RRset in the authority
    /// section; glue is taken from A/AAAA records in the additional section
    /// matching the NS targets.
    pub fn learn_delegation(&self, class: RecordClass, referral: &Message) {
        let mut zone: Option<Name> = None;
        let mut ns_names: Vec<Name> = Vec::new();

        for record in referral.authority() {
            if record.rtype() != RecordType::Ns {
                continue;
            }
            if zone.is_none() {
                zone = Some(record.name().clone());
            }
            if let Some(target) = record.rdata().as_ns() {
                ns_names.push(target.clone());
            }
        }

        let Some(zone) = zone else {
            return;
        };

        let mut addrs: Vec<SocketAddr> = Vec::new();
        for record in referral.additional() {
            if !ns_names.iter().any(|n| n == record.name()) {
                continue;
            }
            match record.rdata() {
                RData::A(v4) => addrs.push(SocketAddr::new(IpAddr::V4(*v4), 53)),
                RData::Aaaa(v6) => addrs.push(SocketAddr::new(IpAddr::V6(*v6), 53)),
                _ => {}
            }
        }

        if addrs.is_empty() {
            trace!(zone = %zone, "referral carried no usable glue");
            return;
        }

        debug!(zone = %zone, count = addrs.len(), "learned delegation");
        self.seed_zone(&zone, class, addrs);
    }

    /// Returns the number of zones with known addresses.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}

impl Default for NameserverStore {
    fn default() -> Self {
        Self::new()
    }
}

fn pick_fastest(entries: &[NameserverAddress]) -> Option<NameserverAddress> {
    let best_rtt = entries.iter().map(NameserverAddress::rtt_us).min()?;
    let candidates: Vec<&NameserverAddress> = entries
        .iter()
        .filter(|e| e.rtt_us() == best_rtt)
        .collect();
    candidates
        .choose(&mut rand::thread_rng())
        .map(|e| (*e).clone())
}
