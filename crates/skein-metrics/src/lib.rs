//! # Skein DNS Metrics
//!
//! Process-wide counters for the server frontend, plus the tracing
//! subscriber setup. Counters are plain atomics behind a global accessor;
//! the resolver engine keeps its own, finer-grained set.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub mod tracing_setup;

/// Global metrics instance.
static METRICS: OnceCell<DnsMetrics> = OnceCell::new();

/// Gets or initializes the global metrics instance.
pub fn metrics() -> &'static DnsMetrics {
    METRICS.get_or_init(DnsMetrics::new)
}

/// DNS server metrics.
pub struct DnsMetrics {
    start_time: Instant,
    queries_total: AtomicU64,
    responses_total: AtomicU64,
    servfail_total: AtomicU64,
    malformed_total: AtomicU64,
}

impl DnsMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            queries_total: AtomicU64::new(0),
            responses_total: AtomicU64::new(0),
            servfail_total: AtomicU64::new(0),
            malformed_total: AtomicU64::new(0),
        }
    }

    /// Returns the process uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Records a received query.
    pub fn record_query(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a sent response.
    pub fn record_response(&self) {
        self.responses_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a SERVFAIL sent to a client.
    pub fn record_servfail(&self) {
        self.servfail_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped malformed query.
    pub fn record_malformed(&self) {
        self.malformed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of queries received.
    pub fn queries_total(&self) -> u64 {
        self.queries_total.load(Ordering::Relaxed)
    }

    /// Returns the number of responses sent.
    pub fn responses_total(&self) -> u64 {
        self.responses_total.load(Ordering::Relaxed)
    }

    /// Returns the number of SERVFAILs sent.
    pub fn servfail_total(&self) -> u64 {
        self.servfail_total.load(Ordering::Relaxed)
    }
}

impl Default for DnsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = DnsMetrics::new();
        assert_eq!(m.queries_total(), 0);

        m.record_query();
        m.record_query();
        m.record_response();
        m.record_servfail();

        assert_eq!(m.queries_total(), 2);
        assert_eq!(m.responses_total(), 1);
        assert_eq!(m.servfail_total(), 1);
    }

    #[test]
    fn test_global_accessor() {
        let a = metrics() as *const DnsMetrics;
        let b = metrics() as *const DnsMetrics;
        assert_eq!(a, b);
    }
}
