//! DNS interception engine
//!
//! The orchestrator: reads raw packets from the tunnel, drives the codec
//! and the block-list matcher, performs the upstream round trip when
//! forwarding, and emits synthesized reply packets.
//!
//! Each packet moves through Received → Parsed → Classified → Replied or
//! Dropped. Parse failures drop silently: answering malformed traffic would
//! amplify it, and a dropped query looks like ordinary packet loss to the
//! client.
//!
//! Concurrency: one ingestion loop dispatches packets to a bounded set of
//! workers, so a slow upstream round trip never stalls ingestion. All
//! replies funnel through a single writer task that owns the tunnel's write
//! half; concurrent writes would interleave bytes and corrupt the stream.

mod forwarder;
mod stats;

pub use forwarder::{Forwarder, NoProtection, SocketProtector, UdpForwarder};
pub use stats::{EngineStats, StatsSnapshot};

use crate::blocklist::Blocklist;
use crate::config::EngineConfig;
use crate::dns::{self, DnsQuery};
use crate::error::Result;
use crate::packet::{self, PacketEnvelope};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Queue depth between workers and the tunnel writer task
const REPLY_QUEUE_DEPTH: usize = 256;

/// The DNS interception engine.
///
/// Generic over its [`Forwarder`] so tests can stub the upstream round trip
/// and hosts can substitute their own transport.
pub struct Engine<F> {
    inner: Arc<EngineInner<F>>,
    shutdown_tx: watch::Sender<bool>,
    writer: JoinHandle<()>,
}

struct EngineInner<F> {
    blocklist: Arc<Blocklist>,
    forwarder: F,
    reply_tx: mpsc::Sender<Vec<u8>>,
    workers: Arc<Semaphore>,
    shutdown_rx: watch::Receiver<bool>,
    stats: EngineStats,
    read_buffer_size: usize,
}

impl<F: Forwarder + 'static> Engine<F> {
    /// Create an engine writing replies to `tunnel_writer`.
    ///
    /// The writer half is moved into a dedicated task; it is the only place
    /// reply bytes ever reach the tunnel.
    pub fn new<W>(
        blocklist: Arc<Blocklist>,
        forwarder: F,
        tunnel_writer: W,
        config: &EngineConfig,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer = spawn_writer(tunnel_writer, reply_rx, shutdown_rx.clone());

        Self {
            inner: Arc::new(EngineInner {
                blocklist,
                forwarder,
                reply_tx,
                workers: Arc::new(Semaphore::new(config.max_in_flight)),
                shutdown_rx,
                stats: EngineStats::default(),
                read_buffer_size: config.read_buffer_size,
            }),
            shutdown_tx,
            writer,
        }
    }

    /// Ingestion loop: read raw packets from the tunnel until it closes or
    /// the engine is shut down.
    pub async fn run<R>(&self, mut tunnel_reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.inner.read_buffer_size];
        let mut shutdown = self.inner.shutdown_rx.clone();

        info!("DNS interception engine running");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Engine shutting down");
                    break;
                }
                read = tunnel_reader.read(&mut buf) => {
                    match read {
                        Ok(0) => {
                            info!("Tunnel closed");
                            break;
                        }
                        Ok(n) => self.handle_packet(buf[..n].to_vec()).await,
                        Err(e) => {
                            warn!("Tunnel read error: {e}");
                            return Err(e.into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Classify and handle a single inbound raw packet.
    ///
    /// Waits for a worker slot (bounding in-flight queries), then processes
    /// the packet on its own task. During shutdown the packet is discarded.
    pub async fn handle_packet(&self, raw: Vec<u8>) {
        self.inner.stats.packets_received.fetch_add(1, Relaxed);

        let permit = match self.inner.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            // Semaphore is closed by shutdown()
            Err(_) => {
                self.inner.stats.packets_dropped.fetch_add(1, Relaxed);
                return;
            }
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.process(&raw).await;
            drop(permit);
        });
    }

    /// Replace the active block list at runtime (atomic swap).
    pub fn update_blocklist<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.blocklist.update(patterns);
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stop the engine: ingestion exits, in-flight workers are interrupted,
    /// and replies arriving afterwards are discarded.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.inner.workers.close();
    }

    /// Wait for the writer task to drain and exit (after [`shutdown`]).
    ///
    /// [`shutdown`]: Engine::shutdown
    pub async fn join_writer(self) {
        drop(self.inner);
        let _ = self.writer.await;
    }
}

impl<F: Forwarder> EngineInner<F> {
    /// Per-packet pipeline: parse, classify, block or forward, emit.
    async fn process(&self, raw: &[u8]) {
        let envelope = match PacketEnvelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!("Discarding invalid IP packet: {e}");
                self.stats.packets_dropped.fetch_add(1, Relaxed);
                return;
            }
        };

        let query = match DnsQuery::parse(envelope.payload()) {
            Ok(query) => query,
            Err(e) => {
                trace!("Discarding non-DNS payload: {e}");
                self.stats.packets_dropped.fetch_add(1, Relaxed);
                return;
            }
        };

        let domain = query.match_name();
        if self.blocklist.matches(&domain) {
            debug!(%domain, "Blocking query");
            let response = dns::build_block_response(&query);
            if self.emit(&envelope, &response).await {
                self.stats.queries_blocked.fetch_add(1, Relaxed);
            } else {
                self.stats.packets_dropped.fetch_add(1, Relaxed);
            }
        } else {
            trace!(%domain, "Forwarding query");
            let mut shutdown = self.shutdown_rx.clone();
            let answer = tokio::select! {
                _ = shutdown.changed() => {
                    trace!(%domain, "Shutdown during upstream round trip");
                    self.stats.packets_dropped.fetch_add(1, Relaxed);
                    return;
                }
                answer = self.forwarder.forward(envelope.payload(), envelope.dst_port) => answer,
            };

            match answer {
                Ok(payload) => {
                    if self.emit(&envelope, &payload).await {
                        self.stats.queries_forwarded.fetch_add(1, Relaxed);
                    } else {
                        self.stats.packets_dropped.fetch_add(1, Relaxed);
                    }
                }
                Err(e) => {
                    debug!(%domain, "Upstream round trip failed: {e}");
                    self.stats.upstream_failures.fetch_add(1, Relaxed);
                    self.stats.packets_dropped.fetch_add(1, Relaxed);
                }
            }
        }
    }

    /// Wrap `payload` in a reply packet for `envelope` and queue it for the
    /// writer. Returns false if synthesis failed or the engine is stopping.
    async fn emit(&self, envelope: &PacketEnvelope, payload: &[u8]) -> bool {
        match packet::build_reply(envelope, payload) {
            Ok(reply) => self.reply_tx.send(reply).await.is_ok(),
            Err(e) => {
                warn!("Failed to synthesize reply packet: {e}");
                false
            }
        }
    }
}

/// Single writer task: the only owner of the tunnel's write half.
fn spawn_writer<W>(
    mut writer: W,
    mut replies: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                reply = replies.recv() => {
                    let Some(reply) = reply else { break };
                    if let Err(e) = writer.write_all(&reply).await {
                        warn!("Tunnel write error: {e}");
                        break;
                    }
                    if let Err(e) = writer.flush().await {
                        warn!("Tunnel flush error: {e}");
                        break;
                    }
                }
            }
        }
    })
}
