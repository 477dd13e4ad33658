//! Nameserver addresses with RTT tracking.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// RTT assigned to an address that failed to respond. High enough that any
/// address with a real measurement wins selection.
const UNREACHABLE_RTT_US: u64 = 5 * 60 * 1_000_000;

/// An RTT feedback sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttSample {
    /// A measured round trip, in milliseconds.
    Measured(u32),
    /// The address did not respond.
    Unreachable,
}

/// A shared handle to one nameserver address.
///
/// Cloning is cheap; all clones feed the same RTT state, so feedback given
/// by a query updates the store's view of the address.
#[derive(Debug, Clone)]
pub struct NameserverAddress {
    inner: Arc<AddressEntry>,
}

#[derive(Debug)]
struct AddressEntry {
    addr: SocketAddr,
    /// Smoothed RTT in microseconds; zero means unmeasured.
    rtt_us: AtomicU64,
    failures: AtomicU64,
}

impl NameserverAddress {
    /// Creates an address entry with no RTT history.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(AddressEntry {
                addr,
                rtt_us: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the socket address.
    #[inline]
    pub fn socket_addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Feeds back an RTT observation.
    ///
    /// Measured samples update an exponential moving average (alpha 1/8);
    /// unreachable reports slam the RTT to a large penalty value so the
    /// address sinks to the bottom of the selection order.
    pub fn update_rtt(&self, sample: RttSample) {
        match sample {
            RttSample::Measured(ms) => {
                let sample_us = u64::from(ms) * 1000;
                let current = self.inner.rtt_us.load(Ordering::Relaxed);
                let updated = if current == 0 {
                    sample_us
                } else {
                    (current * 7 + sample_us) / 8
                };
                self.inner.rtt_us.store(updated, Ordering::Relaxed);
            }
            RttSample::Unreachable => {
                self.inner.failures.fetch_add(1, Ordering::Relaxed);
                self.inner
                    .rtt_us
                    .store(UNREACHABLE_RTT_US, Ordering::Relaxed);
            }
        }
    }

    /// Returns the smoothed RTT in microseconds; zero means unmeasured.
    #[inline]
    pub fn rtt_us(&self) -> u64 {
        self.inner.rtt_us.load(Ordering::Relaxed)
    }

    /// Returns the number of unreachable reports.
    #[inline]
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }
}
