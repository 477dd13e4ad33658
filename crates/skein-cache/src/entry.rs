//! Cache entries.

use skein_proto::{Message, ResourceRecord};
use std::time::{Duration, Instant};

/// A cached full message.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    message: Message,
    created_at: Instant,
    ttl: Duration,
}

impl MessageEntry {
    /// Creates a message entry with the given lifetime.
    pub fn new(message: Message, ttl: Duration) -> Self {
        Self {
            message,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Returns true once the entry's lifetime has elapsed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }

    /// Returns the remaining lifetime, zero if expired.
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.duration_since(self.created_at))
    }

    /// Returns the cached message with record TTLs aged by the entry's time
    /// in the cache.
    pub fn message_with_adjusted_ttl(&self, now: Instant) -> Message {
        let elapsed = now.duration_since(self.created_at).as_secs() as u32;
        let mut message = Message::response_for(match self.message.question() {
            Some(q) => q,
            None => return self.message.clone(),
        });
        message.set_rcode(self.message.rcode());
        message.add_answers(adjust(self.message.answers(), elapsed));
        message.add_authority_records(adjust(self.message.authority(), elapsed));
        message.add_additional_records(adjust(self.message.additional(), elapsed));
        message
    }

    /// Returns the stored message as-is.
    pub fn message(&self) -> &Message {
        &self.message
    }
}

/// A cached RRset: all records sharing one (name, type, class).
#[derive(Debug, Clone)]
pub struct RRsetEntry {
    records: Vec<ResourceRecord>,
    created_at: Instant,
    ttl: Duration,
}

impl RRsetEntry {
    /// Creates an RRset entry with the given lifetime.
    pub fn new(records: Vec<ResourceRecord>, ttl: Duration) -> Self {
        Self {
            records,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Returns true once the entry's lifetime has elapsed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }

    /// Returns the records with TTLs aged by the entry's time in the cache.
    pub fn records_with_adjusted_ttl(&self, now: Instant) -> Vec<ResourceRecord> {
        let elapsed = now.duration_since(self.created_at).as_secs() as u32;
        adjust(&self.records, elapsed)
    }

    /// Returns the stored records as-is.
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }
}

fn adjust(records: &[ResourceRecord], elapsed: u32) -> Vec<ResourceRecord> {
    records
        .iter()
        .map(|r| r.with_ttl(r.ttl().saturating_sub(elapsed).max(1)))
        .collect()
}
