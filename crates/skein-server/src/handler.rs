//! Query handler interface.

use async_trait::async_trait;
use skein_proto::Message;
use std::net::SocketAddr;
use std::time::Instant;

use super::Protocol;

/// Context for one DNS query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Client address.
    pub client: SocketAddr,

    /// Protocol the query arrived over.
    pub protocol: Protocol,

    /// When the query was received.
    pub received_at: Instant,
}

impl QueryContext {
    /// Creates a new query context.
    pub fn new(client: SocketAddr, protocol: Protocol) -> Self {
        Self {
            client,
            protocol,
            received_at: Instant::now(),
        }
    }

    /// Returns the maximum response size for this transport.
    pub fn max_response_size(&self) -> usize {
        match self.protocol {
            // No EDNS: plain UDP is capped at 512 bytes.
            Protocol::Udp => skein_proto::MAX_UDP_MESSAGE_SIZE,
        }
    }

    /// Returns the time elapsed since the query was received.
    pub fn elapsed(&self) -> std::time::Duration {
        self.received_at.elapsed()
    }
}

/// Query handler trait.
///
/// Implement this to turn queries into responses.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Handles a DNS query, returning the response to send back.
    async fn handle(&self, query: Message, context: QueryContext) -> Message;
}

/// A handler that answers REFUSED to everything. Useful for tests.
pub struct RefusedHandler;

#[async_trait]
impl QueryHandler for RefusedHandler {
    async fn handle(&self, query: Message, _context: QueryContext) -> Message {
        let mut response = Message::response_from(&query);
        response.set_rcode(skein_proto::ResponseCode::Refused);
        response
    }
}
