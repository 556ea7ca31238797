//! Configuration management for cleannet
//!
//! Strongly-typed configuration with TOML support. Every section has
//! sensible defaults so an empty file (or no file at all) yields a working
//! engine.

use crate::error::{Error, Result};
use crate::packet::ports;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fallback public resolver used when no upstream address is configured
/// and the collaborator supplies no system resolver.
pub const FALLBACK_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream resolver settings
    pub upstream: UpstreamConfig,

    /// Engine tuning
    pub engine: EngineConfig,

    /// Block-list source
    pub blocklist: BlocklistConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.upstream.port == 0 {
            return Err(Error::config_value("upstream.port", "must be 1-65535"));
        }
        if self.engine.max_in_flight == 0 {
            return Err(Error::config_value(
                "engine.max_in_flight",
                "must be at least 1",
            ));
        }
        if self.engine.upstream_timeout_ms == 0 {
            return Err(Error::config_value(
                "engine.upstream_timeout_ms",
                "must be non-zero; an unbounded upstream wait would pin a worker",
            ));
        }
        if self.engine.read_buffer_size == 0 {
            return Err(Error::config_value(
                "engine.read_buffer_size",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Upstream resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Resolver address; falls back to a well-known public resolver when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,

    /// Resolver port
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: ports::DNS,
        }
    }
}

impl UpstreamConfig {
    /// The resolver address to use, applying the fallback
    pub fn resolver_addr(&self) -> IpAddr {
        self.address.unwrap_or(FALLBACK_RESOLVER)
    }
}

/// Engine tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of queries processed concurrently
    pub max_in_flight: usize,

    /// Bound on a single upstream send+receive round trip, milliseconds
    pub upstream_timeout_ms: u64,

    /// Tunnel read buffer size; must hold the largest expected packet
    pub read_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            upstream_timeout_ms: 5000,
            read_buffer_size: crate::packet::MAX_PACKET_SIZE,
        }
    }
}

impl EngineConfig {
    /// Upstream timeout as a [`Duration`]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

/// Block-list source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocklistConfig {
    /// Path to a pattern file, one pattern per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Inline patterns, merged with the file contents
    pub patterns: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Output format: text, json, compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.resolver_addr(), FALLBACK_RESOLVER);
        assert_eq!(config.engine.max_in_flight, 64);
        assert_eq!(config.engine.read_buffer_size, 32767);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [upstream]
            address = "9.9.9.9"
            port = 53

            [engine]
            max_in_flight = 16
            upstream_timeout_ms = 2000

            [blocklist]
            patterns = ["ads.example.com", "*.tracker.net"]
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(
            config.upstream.resolver_addr(),
            "9.9.9.9".parse::<IpAddr>().unwrap()
        );
        assert_eq!(config.engine.max_in_flight, 16);
        assert_eq!(
            config.engine.upstream_timeout(),
            Duration::from_millis(2000)
        );
        assert_eq!(config.blocklist.patterns.len(), 2);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.blocklist.file.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.upstream.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.engine.upstream_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let serialized = config.to_toml().unwrap();
        let parsed = Config::from_toml(&serialized).unwrap();
        assert_eq!(parsed.engine.max_in_flight, config.engine.max_in_flight);
        assert_eq!(parsed.upstream.port, config.upstream.port);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/cleannet.toml");
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }
}
