//! The per-question state machine.
//!
//! A `RunningQuery` owns everything one in-flight question needs: the
//! accumulating answer, the current zone cut, the CNAME hop counter, retry
//! budget, the two deadline timers, and the completion channel back to the
//! caller. It runs as a single task; timers, UDP fetches and nameserver
//! lookups all deliver into its event channel, so state is only ever touched
//! from one place.
//!
//! Completion discipline: the caller is signalled exactly once, through the
//! oneshot sender. `stop` is the single exit path; once `done` is set the
//! task keeps draining events until no fetch is outstanding, then falls off
//! the end of its loop, which releases every resource. An in-flight fetch
//! cannot be cancelled, so a stopped query may linger until its fetch
//! timeout lapses; nothing is signalled from those late completions.

use crate::classify::{classify, Category, MAX_CNAME_CHAIN};
use crate::fetch::{self, FetchOutcome};
use crate::{EngineConfig, EngineMetrics, ResolverError, Result};
use skein_cache::MessageCache;
use skein_nsas::{AddressOutcome, AddressRequest, NameserverAddress, NameserverStore, RttSample};
use skein_proto::{Message, Name, Question, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Events delivered to the query task.
enum Event {
    /// A UDP fetch completed.
    Fetched(FetchOutcome),
    /// The nameserver store produced an outcome.
    Address(AddressOutcome),
    /// The client deadline fired.
    ClientTimeout,
    /// The lookup deadline fired.
    LookupTimeout,
}

pub(crate) struct RunningQuery {
    /// The question currently being resolved; rebound on CNAME hops.
    question: Question,
    /// The answer being accumulated for the caller.
    answer: Message,

    /// Upstream resolvers; empty means iterative mode.
    forwarders: Arc<Vec<SocketAddr>>,
    /// The zone cut currently being queried, iterative mode only.
    cur_zone: Name,
    /// CNAME hops followed so far.
    cname_count: usize,

    query_timeout: Duration,
    client_timeout: Option<Duration>,
    lookup_timeout: Option<Duration>,
    retries_left: u32,

    /// UDP fetches in flight.
    queries_out: usize,
    /// Set once no more work may be scheduled.
    done: bool,
    /// The completion channel; `None` once the caller has been signalled.
    reply: Option<oneshot::Sender<Result<Message>>>,

    client_timer: Option<JoinHandle<()>>,
    lookup_timer: Option<JoinHandle<()>>,

    /// Outstanding nameserver address request, if any. At most one.
    nsas_request: Option<AddressRequest>,
    /// The address the current fetch was sent to, iterative mode only.
    current_address: Option<NameserverAddress>,
    /// When the current fetch was sent.
    sent_at: Option<Instant>,

    cache: Arc<MessageCache>,
    nsas: Arc<NameserverStore>,
    metrics: Arc<EngineMetrics>,

    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl RunningQuery {
    /// Spawns the query task. The caller hears back through `reply`,
    /// exactly once.
    pub(crate) fn spawn(
        question: Question,
        answer: Message,
        config: &EngineConfig,
        cache: Arc<MessageCache>,
        nsas: Arc<NameserverStore>,
        metrics: Arc<EngineMetrics>,
        reply: oneshot::Sender<Result<Message>>,
    ) {
        let (events_tx, events) = mpsc::unbounded_channel();

        let query = RunningQuery {
            question,
            answer,
            forwarders: Arc::new(config.forwarders.clone()),
            cur_zone: Name::root(),
            cname_count: 0,
            query_timeout: config.query_timeout,
            client_timeout: config.client_timeout,
            lookup_timeout: config.lookup_timeout,
            retries_left: config.retries,
            queries_out: 0,
            done: false,
            reply: Some(reply),
            client_timer: None,
            lookup_timer: None,
            nsas_request: None,
            current_address: None,
            sent_at: None,
            cache,
            nsas,
            metrics,
            events_tx,
            events,
        };

        tokio::spawn(query.run());
    }

    async fn run(mut self) {
        self.arm_timers();
        self.do_lookup();

        while !self.finished() {
            let Some(event) = self.events.recv().await else {
                break;
            };
            match event {
                Event::Fetched(outcome) => self.on_fetch_complete(outcome),
                Event::Address(outcome) => self.on_address(outcome),
                Event::ClientTimeout => self.on_client_timeout(),
                Event::LookupTimeout => {
                    debug!(question = %self.question, "lookup deadline reached");
                    self.stop(false);
                }
            }
        }

        trace!(question = %self.question, "query task finished");
    }

    /// True once the query can be torn down: stopped, and nothing in flight.
    fn finished(&self) -> bool {
        self.done && self.queries_out == 0
    }

    /// True in iterative mode, false when forwarding.
    fn iterative_mode(&self) -> bool {
        self.forwarders.is_empty()
    }

    fn arm_timers(&mut self) {
        if let Some(deadline) = self.lookup_timeout {
            let tx = self.events_tx.clone();
            self.lookup_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                let _ = tx.send(Event::LookupTimeout);
            }));
        }

        if let Some(deadline) = self.client_timeout {
            let tx = self.events_tx.clone();
            self.client_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                let _ = tx.send(Event::ClientTimeout);
            }));
        }
    }

    /// Probes the cache for the current question; on a miss, starts a send
    /// from the root.
    fn do_lookup(&mut self) {
        trace!(question = %self.question, "probing cache");
        if let Some(cached) = self.cache.lookup_message(
            &self.question.qname,
            self.question.qtype,
            self.question.qclass,
        ) {
            debug!(question = %self.question, "answering from cached message");
            if self.handle_recursive_answer(&cached) {
                self.stop(true);
            }
        } else {
            self.cur_zone = Name::root();
            self.send();
        }
    }

    /// Dispatches the next query: to a random forwarder, or through the
    /// nameserver store for the current zone.
    fn send(&mut self) {
        if !self.forwarders.is_empty() {
            use rand::Rng;
            let index = rand::thread_rng().gen_range(0..self.forwarders.len());
            let target = self.forwarders[index];
            debug!(upstream = %target, question = %self.question, "forwarding query");
            self.current_address = None;
            self.dispatch_fetch(target);
        } else {
            debug_assert!(
                self.nsas_request.is_none(),
                "only one address request may be outstanding"
            );
            trace!(zone = %self.cur_zone, "requesting nameserver address");
            let tx = self.events_tx.clone();
            let request = self
                .nsas
                .lookup(&self.cur_zone, self.question.qclass, move |outcome| {
                    let _ = tx.send(Event::Address(outcome));
                });
            self.nsas_request = Some(request);
        }
    }

    fn dispatch_fetch(&mut self, target: SocketAddr) {
        self.sent_at = Some(Instant::now());
        self.queries_out += 1;

        let query = Message::query(self.question.clone());
        let timeout = self.query_timeout;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = fetch::exchange(target, &query, timeout).await;
            let _ = tx.send(Event::Fetched(outcome));
        });
    }

    /// Outcome of the nameserver address request.
    fn on_address(&mut self, outcome: AddressOutcome) {
        if self.nsas_request.take().is_none() {
            // Cancelled; the outcome raced the cancel through the queue.
            return;
        }
        if self.done {
            return;
        }

        match outcome {
            AddressOutcome::Found(address) => {
                debug!(addr = %address.socket_addr(), "nameserver found, sending query");
                let target = address.socket_addr();
                self.current_address = Some(address);
                self.dispatch_fetch(target);
            }
            AddressOutcome::Unreachable => {
                debug!(zone = %self.cur_zone, "nameservers unreachable");
                self.make_servfail();
                self.stop(false);
            }
        }
    }

    /// UDP fetch completion, the main driver of the state machine.
    fn on_fetch_complete(&mut self, outcome: FetchOutcome) {
        self.queries_out -= 1;

        match outcome {
            FetchOutcome::Response(bytes) if !self.done => {
                self.feed_rtt();
                match Message::parse(&bytes) {
                    Ok(incoming) => {
                        let finished = if self.iterative_mode()
                            && incoming.rcode() == ResponseCode::NoError
                        {
                            self.handle_recursive_answer(&incoming)
                        } else {
                            copy_response_into(&incoming, &mut self.answer);
                            true
                        };
                        if finished {
                            self.stop(true);
                        }
                    }
                    Err(error) => {
                        debug!(error = %error, "unparseable response");
                        self.make_servfail();
                        self.stop(true);
                    }
                }
            }
            FetchOutcome::TimedOut if !self.done && self.retries_left > 0 => {
                self.retries_left -= 1;
                EngineMetrics::bump(&self.metrics.retries);
                debug!(
                    question = %self.question,
                    retries_left = self.retries_left,
                    "query timed out, resending"
                );
                if self.iterative_mode() {
                    self.penalize_current_address();
                }
                self.send();
            }
            _ => {
                // Out of retries, or the query was already stopped while
                // this fetch was in flight.
                debug!(question = %self.question, "query timed out, giving up");
                if self.iterative_mode() {
                    self.penalize_current_address();
                }
                let resume = self.reply.is_some();
                if resume {
                    self.make_servfail();
                }
                self.stop(resume);
            }
        }
    }

    /// Feeds the measured round trip back to the address store.
    fn feed_rtt(&mut self) {
        let Some(address) = &self.current_address else {
            return;
        };
        let rtt_ms = match self.sent_at {
            Some(sent) => {
                let elapsed = Instant::now().saturating_duration_since(sent);
                (elapsed.as_millis() as u32).max(1)
            }
            None => 1,
        };
        trace!(addr = %address.socket_addr(), rtt_ms, "rtt measured");
        address.update_rtt(RttSample::Measured(rtt_ms));
    }

    fn penalize_current_address(&mut self) {
        if let Some(address) = &self.current_address {
            address.update_rtt(RttSample::Unreachable);
        }
    }

    /// Acts on a NOERROR response in iterative mode. Returns true when the
    /// accumulated answer is final.
    fn handle_recursive_answer(&mut self, incoming: &Message) -> bool {
        let mut cname_target = self.question.qname.clone();
        let category = classify(
            &self.question,
            incoming,
            &mut cname_target,
            &mut self.cname_count,
            true,
        );
        trace!(category = ?category, question = %self.question, "response classified");

        match category {
            Category::Answer | Category::AnswerCname => {
                self.cache.update(incoming);
                copy_response_into(incoming, &mut self.answer);
                true
            }
            Category::Cname => {
                self.cache.update(incoming);
                if self.cname_count >= MAX_CNAME_CHAIN {
                    debug!(question = %self.question, "cname chain too long");
                    self.make_servfail();
                    return true;
                }
                EngineMetrics::bump(&self.metrics.cnames_followed);
                self.answer.add_answers(incoming.answers().iter().cloned());
                self.question = Question::new(
                    cname_target,
                    self.question.qtype,
                    self.question.qclass,
                );
                debug!(question = %self.question, "following cname chain");
                self.do_lookup();
                false
            }
            Category::NxDomain | Category::NxRrset => {
                copy_response_into(incoming, &mut self.answer);
                true
            }
            Category::Referral => {
                self.cache.update(incoming);
                self.nsas.learn_delegation(self.question.qclass, incoming);
                match incoming.first_ns_owner() {
                    Some(owner) => {
                        self.cur_zone = owner.clone();
                        EngineMetrics::bump(&self.metrics.referrals_followed);
                        debug!(zone = %self.cur_zone, "following referral");
                        // Straight to send: had the final answer been cached,
                        // the lookup before this hop would have found it.
                        self.send();
                        false
                    }
                    None => {
                        // A referral without an NS RRset; hand back the
                        // delegation as the best answer there is.
                        copy_response_into(incoming, &mut self.answer);
                        true
                    }
                }
            }
            error_category => {
                debug!(category = ?error_category, "error in response, returning SERVFAIL");
                self.make_servfail();
                true
            }
        }
    }

    /// The client deadline: answer SERVFAIL now, keep resolving so the
    /// cache still learns the real answer.
    fn on_client_timeout(&mut self) {
        debug!(question = %self.question, "client deadline reached");
        self.client_timer = None;
        if let Some(reply) = self.reply.take() {
            EngineMetrics::bump(&self.metrics.client_deadlines);
            self.answer.make_error(ResponseCode::ServFail);
            let _ = reply.send(Ok(self.answer.clone()));
        }
    }

    fn make_servfail(&mut self) {
        EngineMetrics::bump(&self.metrics.servfails);
        self.answer.make_error(ResponseCode::ServFail);
    }

    /// The single exit path.
    ///
    /// Signals the caller if it has not been signalled yet, cancels the
    /// timers, and tears down whatever can be torn down. If a fetch is
    /// still in flight the teardown is left to its completion, which will
    /// land back here through the event loop.
    fn stop(&mut self, resume: bool) {
        self.done = true;

        if resume {
            // The accumulated answer goes into the cache under the original
            // question key, even when the client deadline already answered
            // the caller; intermediate responses were cached as they were
            // classified.
            self.cache.update(&self.answer);
        }

        if let Some(reply) = self.reply.take() {
            if resume {
                let _ = reply.send(Ok(self.answer.clone()));
            } else {
                let _ = reply.send(Err(ResolverError::Abandoned));
            }
        }

        if let Some(timer) = self.lookup_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.client_timer.take() {
            timer.abort();
        }

        if self.queries_out > 0 {
            trace!(
                outstanding = self.queries_out,
                "stopped with fetches in flight, draining"
            );
            return;
        }

        if let Some(request) = self.nsas_request.take() {
            self.nsas.cancel(&request);
        }
    }
}

/// Copies a terminal response into the accumulated answer: RCODE taken over,
/// all three record sections appended after whatever (CNAME hops) is already
/// there.
fn copy_response_into(incoming: &Message, answer: &mut Message) {
    answer.set_rcode(incoming.rcode());
    answer.add_answers(incoming.answers().iter().cloned());
    answer.add_authority_records(incoming.authority().iter().cloned());
    answer.add_additional_records(incoming.additional().iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_proto::ResourceRecord;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    #[test]
    fn test_copy_response_appends_after_cname_prefix() {
        let question = Question::a(Name::from_str("alias.test").unwrap());
        let mut answer = Message::response_for(&question);
        answer.add_answer(ResourceRecord::cname(
            Name::from_str("alias.test").unwrap(),
            300,
            Name::from_str("real.test").unwrap(),
        ));

        let terminal_question = Question::a(Name::from_str("real.test").unwrap());
        let mut terminal = Message::response_for(&terminal_question);
        terminal.add_answer(ResourceRecord::a(
            Name::from_str("real.test").unwrap(),
            300,
            Ipv4Addr::new(10, 0, 0, 2),
        ));

        copy_response_into(&terminal, &mut answer);

        assert_eq!(answer.answers().len(), 2);
        assert_eq!(answer.rcode(), ResponseCode::NoError);
        assert!(answer.answers()[0].rdata().as_cname().is_some());
        assert_eq!(
            answer.answers()[1].rdata().as_a(),
            Some(Ipv4Addr::new(10, 0, 0, 2))
        );
    }

    #[test]
    fn test_copy_response_takes_rcode() {
        let question = Question::a(Name::from_str("gone.test").unwrap());
        let mut answer = Message::response_for(&question);

        let mut negative = Message::response_for(&question);
        negative.set_rcode(ResponseCode::NXDomain);

        copy_response_into(&negative, &mut answer);
        assert_eq!(answer.rcode(), ResponseCode::NXDomain);
    }
}
