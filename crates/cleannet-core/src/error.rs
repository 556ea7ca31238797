//! Error types for cleannet-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.
//!
//! Per-packet errors never propagate past the engine: a packet that fails to
//! parse is dropped without a reply, exactly as if it had been lost in
//! transit. The typed variants exist so the codec and engine boundaries stay
//! explicit about what went wrong.

use thiserror::Error;

/// Main error type for cleannet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IP/UDP framing could not be parsed
    #[error("Malformed packet: {message}")]
    MalformedPacket {
        /// Detailed error message
        message: String,
        /// Offset in packet where error occurred
        offset: Option<usize>,
    },

    /// Packet is too small to process
    #[error("Packet too small: expected at least {expected} bytes, got {actual}")]
    PacketTooSmall {
        /// Minimum expected size
        expected: usize,
        /// Actual packet size
        actual: usize,
    },

    /// The transport protocol is not UDP
    #[error("Unsupported transport protocol: {protocol}")]
    UnsupportedTransport {
        /// IP protocol number of the offending packet
        protocol: u8,
    },

    /// UDP payload is not a valid DNS message
    #[error("Not a DNS message: {0}")]
    NotDns(String),

    /// Upstream resolver round trip failed (send, receive, or timeout)
    #[error("Upstream resolver failure: {0}")]
    Upstream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Block-list file error
    #[error("Block-list file error for '{path}': {message}")]
    Blocklist {
        /// Path to the block-list file
        path: String,
        /// Error message
        message: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a malformed packet error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPacket {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a malformed packet error with offset
    pub fn malformed_at(message: impl Into<String>, offset: usize) -> Self {
        Self::MalformedPacket {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Create a not-DNS error
    pub fn not_dns(message: impl Into<String>) -> Self {
        Self::NotDns(message.into())
    }

    /// Create an upstream failure error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
