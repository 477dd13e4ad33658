//! # Skein DNS Server
//!
//! Async UDP listener infrastructure. Every inbound datagram is parsed,
//! handed to the configured [`QueryHandler`] on its own task, and the
//! response is truncated to the 512-byte plain-UDP limit if needed.
//!
//! TCP and encrypted transports are out of scope for this resolver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

pub mod handler;
pub mod udp;

pub use handler::{QueryContext, QueryHandler};
pub use udp::UdpServer;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket-level failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad listener configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// DNS transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain UDP.
    Udp,
}

impl Protocol {
    /// Returns the default port for this protocol.
    pub const fn default_port(&self) -> u16 {
        53
    }

    /// Returns the protocol name.
    pub const fn name(&self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// UDP listen addresses.
    pub udp_listen: Vec<SocketAddr>,

    /// Graceful shutdown timeout.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            udp_listen: vec!["0.0.0.0:53".parse().unwrap()],
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// DNS server instance: all configured listeners plus shutdown plumbing.
pub struct DnsServer {
    config: ServerConfig,
    handler: Arc<dyn QueryHandler>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DnsServer {
    /// Creates a new DNS server.
    pub fn new(config: ServerConfig, handler: Arc<dyn QueryHandler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            shutdown_tx,
        }
    }

    /// Starts all configured listeners and runs until shutdown.
    pub async fn run(&self) -> Result<()> {
        let mut handles = Vec::new();

        for addr in &self.config.udp_listen {
            let server = UdpServer::bind(*addr, self.handler.clone()).await?;
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    result = server.run() => result,
                    _ = shutdown_rx.recv() => Ok(()),
                }
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| ServerError::Io(std::io::Error::other(e)))??;
        }

        Ok(())
    }

    /// Initiates graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol() {
        assert_eq!(Protocol::Udp.default_port(), 53);
        assert_eq!(Protocol::Udp.name(), "UDP");
    }
}
