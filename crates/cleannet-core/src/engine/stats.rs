//! Engine statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all engine workers
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Raw packets received from the tunnel
    pub packets_received: AtomicU64,
    /// Queries answered with a synthesized block response
    pub queries_blocked: AtomicU64,
    /// Queries forwarded upstream and relayed back
    pub queries_forwarded: AtomicU64,
    /// Packets dropped (parse failures, failed synthesis, shutdown)
    pub packets_dropped: AtomicU64,
    /// Upstream round trips that failed or timed out
    pub upstream_failures: AtomicU64,
}

impl EngineStats {
    /// Take a consistent-enough snapshot of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            queries_blocked: self.queries_blocked.load(Ordering::Relaxed),
            queries_forwarded: self.queries_forwarded.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Raw packets received from the tunnel
    pub packets_received: u64,
    /// Queries answered with a synthesized block response
    pub queries_blocked: u64,
    /// Queries forwarded upstream and relayed back
    pub queries_forwarded: u64,
    /// Packets dropped
    pub packets_dropped: u64,
    /// Upstream round trips that failed or timed out
    pub upstream_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_snapshot() {
        let stats = EngineStats::default();
        stats.packets_received.fetch_add(3, Ordering::Relaxed);
        stats.queries_blocked.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_received, 3);
        assert_eq!(snapshot.queries_blocked, 2);
        assert_eq!(snapshot.packets_dropped, 0);
    }
}
