//! # Skein DNS Resolver
//!
//! The per-query execution engine: cache probe, upstream selection,
//! nameserver address resolution, UDP exchange, response classification,
//! delegation and CNAME following, retry, and deadline handling.
//!
//! ## Modes
//!
//! - **Forwarding**: with configured forwarders, each query goes to one of
//!   them, picked uniformly at random.
//! - **Iterative**: with no forwarders, the engine walks the delegation tree
//!   from the root, asking the nameserver address store for a server at each
//!   zone cut.
//!
//! ## Deadlines
//!
//! Two independent deadlines bound each query. The *client* deadline caps
//! how long the caller waits: when it fires, the caller receives SERVFAIL
//! but resolution keeps going so the cache still learns the real answer.
//! The *lookup* deadline caps total resolver effort and abandons the query
//! outright.

use async_trait::async_trait;
use skein_proto::{Message, Question};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

pub mod classify;
pub mod engine;
pub mod fetch;
mod running;

pub use classify::{classify, Category, MAX_CNAME_CHAIN};
pub use engine::QueryEngine;
pub use fetch::FetchOutcome;

/// Resolver error.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The query was abandoned before any answer could be produced: the
    /// lookup deadline fired, or no nameserver was reachable.
    #[error("query abandoned without an answer")]
    Abandoned,
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upstream resolvers. Empty means iterative mode.
    pub forwarders: Vec<SocketAddr>,

    /// Timeout for one UDP exchange.
    pub query_timeout: Duration,

    /// Client deadline; `None` disables it.
    pub client_timeout: Option<Duration>,

    /// Lookup deadline; `None` disables it.
    pub lookup_timeout: Option<Duration>,

    /// Retries after the first UDP attempt times out.
    pub retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forwarders: Vec::new(),
            query_timeout: Duration::from_secs(2),
            client_timeout: Some(Duration::from_secs(4)),
            lookup_timeout: Some(Duration::from_secs(30)),
            retries: 3,
        }
    }
}

/// Resolver trait.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a DNS question into a response message.
    async fn resolve(&self, question: &Question) -> Result<Message>;
}

/// Counters kept by the engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Questions accepted by `resolve`.
    pub queries_total: AtomicU64,
    /// Questions answered straight from the cache.
    pub cache_hits: AtomicU64,
    /// Questions that spawned a running query.
    pub cache_misses: AtomicU64,
    /// UDP retries after timeouts.
    pub retries: AtomicU64,
    /// SERVFAIL answers produced.
    pub servfails: AtomicU64,
    /// Referrals followed.
    pub referrals_followed: AtomicU64,
    /// CNAME hops followed.
    pub cnames_followed: AtomicU64,
    /// Client deadlines that fired before an answer.
    pub client_deadlines: AtomicU64,
}

impl EngineMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
