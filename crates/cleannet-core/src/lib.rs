//! # cleannet Core
//!
//! Platform-independent DNS interception and filtering engine.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Packet codec** - raw IPv4/IPv6 + UDP parsing and reply synthesis
//! - **DNS codec** - query inspection and block-response construction
//! - **Block list** - wildcard domain matching over a swappable trie
//! - **Interception engine** - the forward-or-block orchestrator
//! - **Configuration** - TOML-based configuration system
//!
//! ## Example
//!
//! ```rust,no_run
//! use cleannet_core::{Blocklist, Config, Engine, UdpForwarder};
//! use std::sync::Arc;
//!
//! # async fn run(tunnel_reader: tokio::fs::File, tunnel_writer: tokio::fs::File) -> cleannet_core::Result<()> {
//! let config = Config::default();
//! let blocklist = Arc::new(Blocklist::from_patterns(["*.ads.example.com"]));
//! let forwarder = UdpForwarder::new(
//!     config.upstream.resolver_addr(),
//!     config.engine.upstream_timeout(),
//! );
//!
//! let engine = Engine::new(blocklist, forwarder, tunnel_writer, &config.engine);
//! engine.run(tunnel_reader).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocklist;
pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod packet;

// Re-exports for convenience
pub use blocklist::{Blocklist, WildcardTrie};
pub use config::Config;
pub use engine::{Engine, Forwarder, NoProtection, SocketProtector, UdpForwarder};
pub use error::{Error, Result};
pub use packet::PacketEnvelope;
