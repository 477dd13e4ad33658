//! Resolver configuration.

use super::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolver mode.
    pub mode: ResolverMode,

    /// Upstream servers for forward mode.
    pub forwarders: Vec<SocketAddr>,

    /// Root server addresses overriding the built-in hints.
    pub root_hints: Vec<SocketAddr>,

    /// Timeout for one upstream exchange (milliseconds).
    pub query_timeout_ms: u64,

    /// Client deadline (milliseconds); -1 disables it.
    pub client_timeout_ms: i64,

    /// Lookup deadline (milliseconds); -1 disables it.
    pub lookup_timeout_ms: i64,

    /// Retries after the first timed-out attempt.
    pub retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: ResolverMode::Iterative,
            forwarders: Vec::new(),
            root_hints: Vec::new(),
            query_timeout_ms: 2000,
            client_timeout_ms: 4000,
            lookup_timeout_ms: 30_000,
            retries: 3,
        }
    }
}

impl ResolverConfig {
    /// Validates the resolver section.
    pub fn validate(&self) -> Result<()> {
        if self.mode == ResolverMode::Forward && self.forwarders.is_empty() {
            return Err(ConfigError::Validation(
                "forward mode requires at least one forwarder".to_string(),
            ));
        }

        if self.query_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.query_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.client_timeout_ms < -1 || self.lookup_timeout_ms < -1 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.*_timeout_ms".to_string(),
                message: "use a duration in milliseconds, or -1 to disable".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the query timeout as a duration.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Returns the client deadline; `None` when disabled with -1.
    pub fn client_timeout(&self) -> Option<Duration> {
        millis_or_disabled(self.client_timeout_ms)
    }

    /// Returns the lookup deadline; `None` when disabled with -1.
    pub fn lookup_timeout(&self) -> Option<Duration> {
        millis_or_disabled(self.lookup_timeout_ms)
    }

    /// Returns the forwarders in effect: empty in iterative mode.
    pub fn effective_forwarders(&self) -> Vec<SocketAddr> {
        match self.mode {
            ResolverMode::Forward => self.forwarders.clone(),
            ResolverMode::Iterative => Vec::new(),
        }
    }
}

fn millis_or_disabled(ms: i64) -> Option<Duration> {
    if ms < 0 {
        None
    } else {
        Some(Duration::from_millis(ms as u64))
    }
}

/// Resolver mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Iterative resolution from the root zone.
    Iterative,

    /// Forward all queries to configured upstream resolvers.
    Forward,
}

impl Default for ResolverMode {
    fn default() -> Self {
        Self::Iterative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ResolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_forward_mode_needs_forwarders() {
        let config = ResolverConfig {
            mode: ResolverMode::Forward,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_timeouts() {
        let config = ResolverConfig {
            client_timeout_ms: -1,
            lookup_timeout_ms: 15_000,
            ..Default::default()
        };
        assert_eq!(config.client_timeout(), None);
        assert_eq!(config.lookup_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_iterative_mode_ignores_forwarders() {
        let config = ResolverConfig {
            mode: ResolverMode::Iterative,
            forwarders: vec!["8.8.8.8:53".parse().unwrap()],
            ..Default::default()
        };
        assert!(config.effective_forwarders().is_empty());
    }
}
