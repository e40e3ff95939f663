//! Mid-price derivation and update sampling.
//!
//! [`PriceAggregator::observe`] turns a bid/ask pair into a [`MarketData`] and decides whether
//! it may go out. At most one value is emitted per sampling interval; the first pair seen in an
//! interval wins and later ones in the same interval are dropped, not queued or averaged.
//!
//! Intervals are measured on the monotonic clock from the aggregator's creation, so wall-clock
//! adjustments cannot cause duplicate or missing samples.

use std::time::Duration;
use tokio::time::Instant;

use crate::types::{MarketData, OrderEntry};

/// Default sampling interval: one update per second.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Integer mid price, truncated toward zero.
///
/// Computed in 128 bits so extreme inputs cannot overflow; for inputs whose sum fits in
/// 64 bits this equals `(ask + bid) / 2`.
pub fn mid_price(bid: i64, ask: i64) -> i64 {
    ((ask as i128 + bid as i128) / 2) as i64
}

/// Builds the price point for a bid/ask pair: bid's time, mid price.
pub fn derive(bid: &OrderEntry, ask: &OrderEntry) -> MarketData {
    MarketData {
        time: bid.time,
        price: mid_price(bid.price, ask.price),
    }
}

/// Result of feeding one pair to the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    Emit(MarketData),
    Suppressed,
}

impl Observation {
    pub fn emitted(self) -> Option<MarketData> {
        match self {
            Observation::Emit(data) => Some(data),
            Observation::Suppressed => None,
        }
    }
}

/// Stateful sampler. Owned by a single relay loop.
#[derive(Debug)]
pub struct PriceAggregator {
    origin: Instant,
    interval: Duration,
    last_bucket: Option<u128>,
}

impl PriceAggregator {
    /// Aggregator with intervals anchored at `origin`. A zero interval is clamped to 1ns.
    pub fn new(interval: Duration, origin: Instant) -> Self {
        Self {
            origin,
            interval: interval.max(Duration::from_nanos(1)),
            last_bucket: None,
        }
    }

    /// Aggregator anchored at the current instant.
    pub fn starting_now(interval: Duration) -> Self {
        Self::new(interval, Instant::now())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn bucket(&self, now: Instant) -> u128 {
        now.saturating_duration_since(self.origin).as_nanos() / self.interval.as_nanos()
    }

    /// Derives the mid price and applies the sampling rule at `now`.
    pub fn observe(&mut self, bid: &OrderEntry, ask: &OrderEntry, now: Instant) -> Observation {
        let data = derive(bid, ask);
        let bucket = self.bucket(now);
        if self.last_bucket == Some(bucket) {
            return Observation::Suppressed;
        }
        self.last_bucket = Some(bucket);
        Observation::Emit(data)
    }
}
