//! Listener configuration.

use super::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Network listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// UDP listen addresses.
    pub udp: Vec<SocketAddr>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            udp: vec!["127.0.0.1:53".parse().unwrap()],
        }
    }
}

impl ListenerConfig {
    /// Validates the listener section.
    pub fn validate(&self) -> Result<()> {
        if self.udp.is_empty() {
            return Err(ConfigError::Validation(
                "at least one UDP listener is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ListenerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_no_listeners_rejected() {
        let config = ListenerConfig { udp: Vec::new() };
        assert!(config.validate().is_err());
    }
}
