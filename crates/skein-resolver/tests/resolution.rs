//! End-to-end resolution tests against scripted mock servers.
//!
//! Each test spins one or more UDP servers on 127.0.0.1 that serve canned
//! answers, referrals, CNAME chains, delays or nothing at all, then drives
//! the engine against them.

use skein_cache::{CacheConfig, MessageCache};
use skein_nsas::NameserverStore;
use skein_proto::{Message, Name, Question, ResourceRecord, ResponseCode};
use skein_resolver::{EngineConfig, QueryEngine, ResolverError};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

// ============================================================================
// Mock server
// ============================================================================

/// What a mock server does with a query.
enum Reply {
    /// Send this response.
    Answer(Message),
    /// Send this response after a delay.
    Delayed(Message, Duration),
    /// Say nothing; let the client time out.
    Ignore,
}

type Responder = Arc<dyn Fn(&Message) -> Reply + Send + Sync>;

/// Binds a mock DNS server and returns its address.
async fn spawn_mock(responder: Responder) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        loop {
            let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(query) = Message::parse(&buf[..len]) else {
                continue;
            };
            match responder(&query) {
                Reply::Answer(response) => {
                    let _ = socket.send_to(&response.to_wire(), src).await;
                }
                Reply::Delayed(response, delay) => {
                    tokio::time::sleep(delay).await;
                    let _ = socket.send_to(&response.to_wire(), src).await;
                }
                Reply::Ignore => {}
            }
        }
    });

    addr
}

fn answer_a(query: &Message, addr: Ipv4Addr) -> Message {
    let mut response = Message::response_from(query);
    let question = query.question().unwrap();
    response.add_answer(ResourceRecord::a(question.qname.clone(), 300, addr));
    response
}

fn referral_to(query: &Message, zone: &str, nameserver: &str) -> Message {
    let mut response = Message::response_from(query);
    response.add_authority(ResourceRecord::ns(
        Name::from_str(zone).unwrap(),
        3600,
        Name::from_str(nameserver).unwrap(),
    ));
    response
}

fn cname_to(query: &Message, target: &str) -> Message {
    let mut response = Message::response_from(query);
    let question = query.question().unwrap();
    response.add_answer(ResourceRecord::cname(
        question.qname.clone(),
        300,
        Name::from_str(target).unwrap(),
    ));
    response
}

fn nxdomain(query: &Message) -> Message {
    let mut response = Message::response_from(query);
    response.set_rcode(ResponseCode::NXDomain);
    response
}

fn build_engine(
    config: EngineConfig,
    nsas: Arc<NameserverStore>,
) -> (QueryEngine, Arc<MessageCache>) {
    let cache = Arc::new(MessageCache::new(CacheConfig::default()));
    let engine = QueryEngine::new(config, Arc::clone(&cache), nsas);
    (engine, cache)
}

fn forwarding_config(upstream: SocketAddr) -> EngineConfig {
    EngineConfig {
        forwarders: vec![upstream],
        query_timeout: Duration::from_millis(500),
        client_timeout: None,
        lookup_timeout: Some(Duration::from_secs(5)),
        retries: 2,
    }
}

fn iterative_config() -> EngineConfig {
    EngineConfig {
        forwarders: Vec::new(),
        query_timeout: Duration::from_millis(500),
        client_timeout: None,
        lookup_timeout: Some(Duration::from_secs(5)),
        retries: 2,
    }
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_forwarding_immediate_answer() {
    let upstream = spawn_mock(Arc::new(|query: &Message| {
        Reply::Answer(answer_a(query, Ipv4Addr::new(1, 2, 3, 4)))
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let (engine, cache) = build_engine(forwarding_config(upstream), nsas);

    let question = Question::a(Name::from_str("x.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(
        answer.answers()[0].rdata().as_a(),
        Some(Ipv4Addr::new(1, 2, 3, 4))
    );
    assert_eq!(answer.questions().len(), 1);

    // The accumulated answer went into the cache.
    let cached = cache.lookup_message_for(&question).unwrap();
    assert_eq!(cached.answers().len(), 1);
}

#[tokio::test]
async fn test_forwarding_copies_servfail_verbatim() {
    let upstream = spawn_mock(Arc::new(|query: &Message| {
        let mut response = Message::response_from(query);
        response.set_rcode(ResponseCode::ServFail);
        Reply::Answer(response)
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let (engine, _cache) = build_engine(forwarding_config(upstream), nsas);

    let question = Question::a(Name::from_str("broken.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
}

#[tokio::test]
async fn test_retry_bound() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_mock = Arc::clone(&hits);
    let upstream = spawn_mock(Arc::new(move |_query: &Message| {
        hits_in_mock.fetch_add(1, Ordering::SeqCst);
        Reply::Ignore
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let config = EngineConfig {
        forwarders: vec![upstream],
        query_timeout: Duration::from_millis(60),
        client_timeout: None,
        lookup_timeout: Some(Duration::from_secs(10)),
        retries: 2,
    };
    let (engine, _cache) = build_engine(config, nsas);

    let question = Question::a(Name::from_str("silent.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    // Out of retries: SERVFAIL delivered through success.
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    // One initial attempt plus `retries` resends, no more.
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_lookup_deadline_abandons_query() {
    let upstream = spawn_mock(Arc::new(|_query: &Message| Reply::Ignore)).await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let config = EngineConfig {
        forwarders: vec![upstream],
        query_timeout: Duration::from_millis(500),
        client_timeout: None,
        lookup_timeout: Some(Duration::from_millis(100)),
        retries: 50,
    };
    let (engine, _cache) = build_engine(config, nsas);

    let started = Instant::now();
    let question = Question::a(Name::from_str("stuck.test").unwrap());
    let result = engine.resolve(&question).await;

    assert!(matches!(result, Err(ResolverError::Abandoned)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_client_deadline_with_eventual_answer() {
    let upstream = spawn_mock(Arc::new(|query: &Message| {
        Reply::Delayed(
            answer_a(query, Ipv4Addr::new(9, 9, 9, 9)),
            Duration::from_millis(300),
        )
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let config = EngineConfig {
        forwarders: vec![upstream],
        query_timeout: Duration::from_secs(2),
        client_timeout: Some(Duration::from_millis(100)),
        lookup_timeout: Some(Duration::from_secs(5)),
        retries: 1,
    };
    let (engine, cache) = build_engine(config, nsas);

    let question = Question::a(Name::from_str("slow.test").unwrap());
    let started = Instant::now();
    let answer = engine.resolve(&question).await.unwrap();
    let waited = started.elapsed();

    // The caller got SERVFAIL at the client deadline, well before the
    // upstream answered.
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    assert!(waited < Duration::from_millis(280), "waited {:?}", waited);

    // Resolution carried on: once the real answer arrives, it is cached.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let cached = cache.lookup_message_for(&question).unwrap();
    assert_eq!(cached.rcode(), ResponseCode::NoError);
    assert_eq!(
        cached.answers()[0].rdata().as_a(),
        Some(Ipv4Addr::new(9, 9, 9, 9))
    );
}

// ============================================================================
// Iterative resolution
// ============================================================================

#[tokio::test]
async fn test_iterative_referral_chain() {
    // Zone ".": refer everything to "b.".
    let root = spawn_mock(Arc::new(|query: &Message| {
        Reply::Answer(referral_to(query, "b", "ns.b"))
    }))
    .await;

    // Zone "b.": refer to "a.b.".
    let zone_b = spawn_mock(Arc::new(|query: &Message| {
        Reply::Answer(referral_to(query, "a.b", "ns.a.b"))
    }))
    .await;

    // Zone "a.b.": authoritative answer.
    let zone_ab = spawn_mock(Arc::new(|query: &Message| {
        Reply::Answer(answer_a(query, Ipv4Addr::new(10, 0, 0, 1)))
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![root]));
    nsas.seed_zone(
        &Name::from_str("b").unwrap(),
        skein_proto::RecordClass::In,
        vec![zone_b],
    );
    nsas.seed_zone(
        &Name::from_str("a.b").unwrap(),
        skein_proto::RecordClass::In,
        vec![zone_ab],
    );

    let (engine, cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("www.a.b").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(
        answer.answers()[0].rdata().as_a(),
        Some(Ipv4Addr::new(10, 0, 0, 1))
    );

    // The final answer is cached under the question.
    assert!(cache.lookup_message_for(&question).is_some());
    // So is the delegation observed on the way down, under its own key.
    assert!(cache
        .lookup_rrset(
            &Name::from_str("a.b").unwrap(),
            skein_proto::RecordType::Ns,
            skein_proto::RecordClass::In,
        )
        .is_some());
}

#[tokio::test]
async fn test_cname_follow() {
    // One server plays root and authoritative: alias.test is a CNAME to
    // real.test, which has an address.
    let server = spawn_mock(Arc::new(|query: &Message| {
        let qname = query.question().unwrap().qname.to_string();
        if qname == "alias.test." {
            Reply::Answer(cname_to(query, "real.test"))
        } else {
            Reply::Answer(answer_a(query, Ipv4Addr::new(10, 0, 0, 2)))
        }
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![server]));
    let (engine, _cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("alias.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    // Both the CNAME hop and the terminal address are in the answer.
    assert_eq!(answer.answers().len(), 2);
    assert_eq!(
        answer.answers()[0].rdata().as_cname().unwrap().to_string(),
        "real.test."
    );
    assert_eq!(
        answer.answers()[1].rdata().as_a(),
        Some(Ipv4Addr::new(10, 0, 0, 2))
    );
}

#[tokio::test]
async fn test_cname_loop_servfails() {
    // c0.loop.test -> c1.loop.test -> c2.loop.test -> ... forever.
    let server = spawn_mock(Arc::new(|query: &Message| {
        let qname = query.question().unwrap().qname.to_string();
        let index: usize = qname
            .split('.')
            .next()
            .unwrap()
            .trim_start_matches('c')
            .parse()
            .unwrap();
        Reply::Answer(cname_to(query, &format!("c{}.loop.test", index + 1)))
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![server]));
    let (engine, _cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("c0.loop.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    assert!(answer.answers().is_empty());
}

#[tokio::test]
async fn test_iterative_nxdomain_passthrough() {
    let server = spawn_mock(Arc::new(|query: &Message| Reply::Answer(nxdomain(query)))).await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![server]));
    let (engine, _cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("missing.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();
    assert_eq!(answer.rcode(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn test_iterative_malformed_rcode_servfails() {
    let server = spawn_mock(Arc::new(|query: &Message| {
        let mut response = Message::response_from(query);
        response.set_rcode(ResponseCode::Refused);
        Reply::Answer(response)
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![server]));
    let (engine, _cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("refused.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    // REFUSED is not NOERROR: copied verbatim as a terminal response.
    assert_eq!(answer.rcode(), ResponseCode::Refused);
}

#[tokio::test]
async fn test_iterative_answer_with_cname_in_one_message() {
    // The authoritative server returns the whole chain in one response.
    let server = spawn_mock(Arc::new(|query: &Message| {
        let question = query.question().unwrap();
        let mut response = Message::response_from(query);
        let real = Name::from_str("real.test").unwrap();
        response.add_answer(ResourceRecord::cname(
            question.qname.clone(),
            300,
            real.clone(),
        ));
        response.add_answer(ResourceRecord::a(real, 300, Ipv4Addr::new(10, 0, 0, 3)));
        Reply::Answer(response)
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(vec![server]));
    let (engine, _cache) = build_engine(iterative_config(), nsas);

    let question = Question::a(Name::from_str("alias2.test").unwrap());
    let answer = engine.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 2);
}

#[tokio::test]
async fn test_concurrent_queries_each_answered_once() {
    let upstream = spawn_mock(Arc::new(|query: &Message| {
        Reply::Answer(answer_a(query, Ipv4Addr::new(7, 7, 7, 7)))
    }))
    .await;

    let nsas = Arc::new(NameserverStore::with_root_hints(Vec::new()));
    let (engine, _cache) = build_engine(forwarding_config(upstream), nsas);
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..50 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let question = Question::a(Name::from_str(&format!("q{}.test", i)).unwrap());
            engine.resolve(&question).await
        }));
    }

    for handle in handles {
        let answer = handle.await.unwrap().unwrap();
        assert_eq!(answer.rcode(), ResponseCode::NoError);
        assert_eq!(answer.answers().len(), 1);
    }
}
