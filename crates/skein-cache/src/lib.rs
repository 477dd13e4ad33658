//! # Skein DNS Cache
//!
//! Message and RRset caching for the resolver. Two views over the same data:
//!
//! - **Message cache**: complete responses keyed by their question section.
//! - **RRset cache**: individual RRsets keyed by (owner, type, class),
//!   populated from the answer and authority sections of every stored
//!   message.
//!
//! `update()` feeds both. Lookups adjust record TTLs for the time spent in
//! the cache. There is no negative caching; NXDOMAIN and NODATA responses
//! are not retained.

use skein_proto::{Message, Name, Question, RecordClass, RecordType, ResourceRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

pub mod entry;
pub mod key;

pub use entry::{MessageEntry, RRsetEntry};
pub use key::CacheKey;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached messages.
    pub max_messages: u64,

    /// Maximum number of cached RRsets.
    pub max_rrsets: u64,

    /// TTL floor applied to stored entries.
    pub min_ttl: Duration,

    /// TTL ceiling applied to stored entries.
    pub max_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_messages: 100_000,
            max_rrsets: 200_000,
            min_ttl: Duration::from_secs(5),
            max_ttl: Duration::from_secs(86400 * 7),
        }
    }
}

/// The resolver cache.
pub struct MessageCache {
    config: CacheConfig,
    messages: moka::sync::Cache<CacheKey, MessageEntry>,
    rrsets: moka::sync::Cache<CacheKey, RRsetEntry>,
    stats: CacheStats,
}

impl MessageCache {
    /// Creates a new cache.
    pub fn new(config: CacheConfig) -> Self {
        let messages = moka::sync::Cache::builder()
            .max_capacity(config.max_messages)
            .time_to_live(config.max_ttl)
            .build();
        let rrsets = moka::sync::Cache::builder()
            .max_capacity(config.max_rrsets)
            .time_to_live(config.max_ttl)
            .build();

        Self {
            config,
            messages,
            rrsets,
            stats: CacheStats::default(),
        }
    }

    /// Looks up a complete message for (name, type, class).
    ///
    /// Record TTLs in the returned message are aged by the entry's time in
    /// the cache.
    pub fn lookup_message(
        &self,
        name: &Name,
        rtype: RecordType,
        rclass: RecordClass,
    ) -> Option<Message> {
        let key = CacheKey::new(name, rtype, rclass);
        let entry = self.messages.get(&key)?;

        let now = Instant::now();
        if entry.is_expired(now) {
            self.messages.invalidate(&key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        Some(entry.message_with_adjusted_ttl(now))
    }

    /// Looks up a single RRset for (name, type, class).
    pub fn lookup_rrset(
        &self,
        name: &Name,
        rtype: RecordType,
        rclass: RecordClass,
    ) -> Option<Vec<ResourceRecord>> {
        let key = CacheKey::new(name, rtype, rclass);
        let entry = self.rrsets.get(&key)?;

        let now = Instant::now();
        if entry.is_expired(now) {
            self.rrsets.invalidate(&key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        Some(entry.records_with_adjusted_ttl(now))
    }

    /// Stores a message, keyed on its question section, and indexes every
    /// RRset from its answer and authority sections.
    pub fn update(&self, message: &Message) {
        let Some(question) = message.question() else {
            return;
        };

        let ttl = self.clamp_ttl(min_record_ttl(message));
        trace!(question = %question, ttl = ?ttl, "caching message");

        let key = CacheKey::from_question(question);
        self.messages
            .insert(key, MessageEntry::new(message.clone(), ttl));

        for record in message.answers().iter().chain(message.authority()) {
            self.index_rrset(message, record);
        }
    }

    /// Stores the RRset that `record` belongs to, collecting its siblings
    /// from the same message.
    fn index_rrset(&self, message: &Message, record: &ResourceRecord) {
        let members: Vec<ResourceRecord> = message
            .answers()
            .iter()
            .chain(message.authority())
            .filter(|r| {
                r.name() == record.name()
                    && r.rtype() == record.rtype()
                    && r.rclass() == record.rclass()
            })
            .cloned()
            .collect();

        let ttl = self.clamp_ttl(
            members
                .iter()
                .map(|r| Duration::from_secs(r.ttl() as u64))
                .min()
                .unwrap_or(self.config.min_ttl),
        );

        let key = CacheKey::new(record.name(), record.rtype(), record.rclass());
        self.rrsets.insert(key, RRsetEntry::new(members, ttl));
    }

    fn clamp_ttl(&self, ttl: Duration) -> Duration {
        ttl.max(self.config.min_ttl).min(self.config.max_ttl)
    }

    /// Removes everything from the cache.
    pub fn clear(&self) {
        self.messages.invalidate_all();
        self.rrsets.invalidate_all();
    }

    /// Returns the cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns the number of cached messages.
    pub fn len(&self) -> usize {
        self.messages.run_pending_tasks();
        self.messages.entry_count() as usize
    }

    /// Returns true if no messages are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Returns the smallest record TTL across all sections, or zero for a
/// message with no records.
fn min_record_ttl(message: &Message) -> Duration {
    message
        .answers()
        .iter()
        .chain(message.authority())
        .chain(message.additional())
        .map(|r| Duration::from_secs(r.ttl() as u64))
        .min()
        .unwrap_or(Duration::ZERO)
}

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of expired-entry misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Convenience wrapper: cache lookup by question.
impl MessageCache {
    /// Looks up a message by question.
    pub fn lookup_message_for(&self, question: &Question) -> Option<Message> {
        self.lookup_message(&question.qname, question.qtype, question.qclass)
    }

    /// Looks up an RRset by question.
    pub fn lookup_rrset_for(&self, question: &Question) -> Option<Vec<ResourceRecord>> {
        self.lookup_rrset(&question.qname, question.qtype, question.qclass)
    }
}
