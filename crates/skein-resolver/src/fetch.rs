//! One-shot UDP query exchange.
//!
//! A fetch sends a single query datagram and waits for a matching response
//! within its own timeout. The outcome is binary: a response buffer, or a
//! timeout. Socket errors count as timeouts; the caller's retry and RTT
//! penalty handling is the right disposition for both.

use bytes::Bytes;
use skein_proto::Message;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

/// Result of a UDP exchange.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A datagram with a matching message ID arrived.
    Response(Bytes),
    /// Nothing usable arrived within the timeout.
    TimedOut,
}

/// Sends `query` to `target` over UDP and waits for the response.
///
/// Datagrams whose message ID does not match the query are ignored; the
/// wait continues until the deadline.
pub async fn exchange(target: SocketAddr, query: &Message, timeout: Duration) -> FetchOutcome {
    let deadline = Instant::now() + timeout;
    match exchange_inner(target, query, deadline).await {
        Ok(bytes) => FetchOutcome::Response(bytes),
        Err(error) => {
            trace!(target = %target, error = %error, "udp exchange failed");
            FetchOutcome::TimedOut
        }
    }
}

async fn exchange_inner(
    target: SocketAddr,
    query: &Message,
    deadline: Instant,
) -> io::Result<Bytes> {
    let bind_addr: SocketAddr = if target.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(target).await?;

    let wire = query.to_wire();
    socket.send(&wire).await?;

    let expected_id = query.id().to_be_bytes();
    let mut buf = vec![0u8; 65535];

    loop {
        let len = timeout_at(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "query timed out"))??;

        if len >= 2 && buf[..2] == expected_id {
            return Ok(Bytes::copy_from_slice(&buf[..len]));
        }

        trace!(target = %target, "ignoring datagram with mismatched id");
    }
}
