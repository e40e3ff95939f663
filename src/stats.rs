//! Relay counters, shared between the relay loop and the HTTP `/stats` endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    datagrams: AtomicU64,
    decode_failures: AtomicU64,
    emitted: AtomicU64,
    suppressed: AtomicU64,
    restarts: AtomicU64,
}

/// Cheaply clonable handle; clones share counters.
#[derive(Clone, Debug, Default)]
pub struct RelayStats {
    inner: Arc<Counters>,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub decode_failures: u64,
    pub emitted: u64,
    pub suppressed: u64,
    pub restarts: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_datagram(&self) {
        self.inner.datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.inner.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_restart(&self) {
        self.inner.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.inner.datagrams.load(Ordering::Relaxed),
            decode_failures: self.inner.decode_failures.load(Ordering::Relaxed),
            emitted: self.inner.emitted.load(Ordering::Relaxed),
            suppressed: self.inner.suppressed.load(Ordering::Relaxed),
            restarts: self.inner.restarts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let stats = RelayStats::new();
        let other = stats.clone();
        stats.record_datagram();
        other.record_datagram();
        other.record_emitted();
        stats.record_restart();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                datagrams: 2,
                emitted: 1,
                restarts: 1,
                ..Default::default()
            }
        );
    }
}
