//! Query engine entry point.

use crate::running::RunningQuery;
use crate::{EngineConfig, EngineMetrics, Resolver, ResolverError, Result};
use async_trait::async_trait;
use skein_cache::MessageCache;
use skein_nsas::NameserverStore;
use skein_proto::{Message, Question, ResponseCode};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// The resolver's front door.
///
/// `resolve` serves straight from the cache when it can; otherwise it spawns
/// a [`RunningQuery`] and waits for its single completion signal.
pub struct QueryEngine {
    config: EngineConfig,
    cache: Arc<MessageCache>,
    nsas: Arc<NameserverStore>,
    metrics: Arc<EngineMetrics>,
}

impl QueryEngine {
    /// Creates an engine over the given cache and nameserver store.
    pub fn new(config: EngineConfig, cache: Arc<MessageCache>, nsas: Arc<NameserverStore>) -> Self {
        Self {
            config,
            cache,
            nsas,
            metrics: Arc::new(EngineMetrics::default()),
        }
    }

    /// Returns the engine's counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Returns the cache shared with the running queries.
    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    /// Resolves a question.
    ///
    /// Exactly one of `Ok(answer)` or `Err` is produced per call. Cache hits
    /// return synchronously; everything else goes through a spawned running
    /// query, whose client deadline may answer SERVFAIL while resolution
    /// continues in the background.
    pub async fn resolve(&self, question: &Question) -> Result<Message> {
        EngineMetrics::bump(&self.metrics.queries_total);
        debug!(question = %question, "asked to resolve");

        let mut answer = Message::response_for(question);

        // A complete cached message with answers short-circuits everything.
        if let Some(cached) = self.cache.lookup_message_for(question) {
            if !cached.answers().is_empty() {
                trace!(question = %question, "full message cache hit");
                EngineMetrics::bump(&self.metrics.cache_hits);
                answer.set_rcode(ResponseCode::NoError);
                answer.add_answers(cached.answers().iter().cloned());
                answer.add_authority_records(cached.authority().iter().cloned());
                answer.add_additional_records(cached.additional().iter().cloned());
                return Ok(answer);
            }
        }

        // Perhaps just the one RRset is known.
        if let Some(rrset) = self.cache.lookup_rrset_for(question) {
            trace!(question = %question, "rrset cache hit");
            EngineMetrics::bump(&self.metrics.cache_hits);
            answer.set_rcode(ResponseCode::NoError);
            answer.add_answers(rrset);
            return Ok(answer);
        }

        EngineMetrics::bump(&self.metrics.cache_misses);
        debug!(question = %question, "cache miss, starting running query");

        let (reply_tx, reply_rx) = oneshot::channel();
        RunningQuery::spawn(
            question.clone(),
            answer,
            &self.config,
            Arc::clone(&self.cache),
            Arc::clone(&self.nsas),
            Arc::clone(&self.metrics),
            reply_tx,
        );

        match reply_rx.await {
            Ok(result) => result,
            // The query task can only drop the sender unsignalled if it
            // panicked; treat that as an abandoned lookup.
            Err(_) => Err(ResolverError::Abandoned),
        }
    }
}

#[async_trait]
impl Resolver for QueryEngine {
    async fn resolve(&self, question: &Question) -> Result<Message> {
        QueryEngine::resolve(self, question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_cache::CacheConfig;
    use skein_proto::{Name, ResourceRecord};
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    fn engine_with_empty_world() -> QueryEngine {
        QueryEngine::new(
            EngineConfig {
                lookup_timeout: Some(std::time::Duration::from_millis(200)),
                client_timeout: None,
                ..EngineConfig::default()
            },
            Arc::new(MessageCache::new(CacheConfig::default())),
            Arc::new(NameserverStore::with_root_hints(Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let engine = engine_with_empty_world();

        let question = Question::a(Name::from_str("cached.test").unwrap());
        let mut message = Message::response_for(&question);
        message.add_answer(ResourceRecord::a(
            Name::from_str("cached.test").unwrap(),
            300,
            Ipv4Addr::new(93, 184, 216, 34),
        ));
        engine.cache().update(&message);

        let answer = engine.resolve(&question).await.unwrap();
        assert_eq!(answer.rcode(), ResponseCode::NoError);
        assert_eq!(answer.answers().len(), 1);
        assert_eq!(engine.metrics().cache_hits.load(Ordering::Relaxed), 1);
        assert_eq!(engine.metrics().cache_misses.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_rrset_fallback_hit() {
        let engine = engine_with_empty_world();

        // Store a message answering a *different* question whose answer
        // section carries the RRset this query wants.
        let stored_question = Question::a(Name::from_str("other.test").unwrap());
        let mut message = Message::response_for(&stored_question);
        message.add_answer(ResourceRecord::a(
            Name::from_str("other.test").unwrap(),
            300,
            Ipv4Addr::new(1, 2, 3, 4),
        ));
        message.add_authority(ResourceRecord::ns(
            Name::from_str("test").unwrap(),
            3600,
            Name::from_str("ns.test").unwrap(),
        ));
        engine.cache().update(&message);

        // The NS RRset is only reachable through the rrset view.
        let question = Question::new(
            Name::from_str("test").unwrap(),
            skein_proto::RecordType::Ns,
            skein_proto::RecordClass::In,
        );
        let answer = engine.resolve(&question).await.unwrap();
        assert_eq!(answer.rcode(), ResponseCode::NoError);
        assert_eq!(answer.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_world_servfails() {
        let engine = engine_with_empty_world();
        let question = Question::a(Name::from_str("nowhere.test").unwrap());

        // No root hints at all: the address store reports unreachable and
        // the query stops without an answer.
        let result = engine.resolve(&question).await;
        assert!(matches!(result, Err(ResolverError::Abandoned)));
    }
}
