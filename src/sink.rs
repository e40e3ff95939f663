//! Push sinks: where emitted price points go.
//!
//! The relay only needs a non-blocking "publish" capability. [`BroadcastSink`] fans each value
//! out to every subscriber through a bounded broadcast topic; each subscriber has its own queue,
//! so a slow consumer loses its oldest updates instead of stalling datagram intake.

use log::trace;
use tokio::sync::broadcast;

use crate::types::MarketData;

/// Event name subscribers see for each published price point.
pub const RECEIVE_NEW_DATA: &str = "ReceiveNewData";

/// Destination for emitted price points. Must not block.
pub trait PriceSink: Send + Sync {
    fn publish(&self, data: MarketData);
}

/// Broadcast topic shared by the relay (publisher) and the WebSocket handlers (subscribers).
/// Clone shares the same topic.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<MarketData>,
}

impl BroadcastSink {
    /// `capacity` is the per-subscriber queue depth (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketData> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl PriceSink for BroadcastSink {
    fn publish(&self, data: MarketData) {
        // No subscribers is fine: the value is simply dropped.
        if let Ok(n) = self.tx.send(data) {
            trace!("published time={} price={} to {} subscribers", data.time, data.price, n);
        }
    }
}

/// In-memory sink that records every publish, for tests. Clone shares the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryPriceSink {
    published: std::sync::Arc<std::sync::Mutex<Vec<MarketData>>>,
}

impl InMemoryPriceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<MarketData> {
        self.published
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl PriceSink for InMemoryPriceSink {
    fn publish(&self, data: MarketData) {
        if let Ok(mut v) = self.published.lock() {
            v.push(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber_in_order() {
        let sink = BroadcastSink::new(8);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);
        sink.publish(MarketData { time: 1, price: 10 });
        sink.publish(MarketData { time: 2, price: 20 });
        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap(), MarketData { time: 1, price: 10 });
            assert_eq!(rx.recv().await.unwrap(), MarketData { time: 2, price: 20 });
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let sink = BroadcastSink::new(1);
        sink.publish(MarketData { time: 1, price: 1 });
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let sink = BroadcastSink::new(2);
        let mut slow = sink.subscribe();
        for i in 0..5 {
            sink.publish(MarketData { time: i, price: i });
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(slow.recv().await.unwrap().time, 3);
        assert_eq!(slow.recv().await.unwrap().time, 4);
    }

    #[test]
    fn in_memory_sink_shares_buffer_between_clones() {
        let sink = InMemoryPriceSink::new();
        let clone = sink.clone();
        clone.publish(MarketData { time: 5, price: 50 });
        assert_eq!(sink.published(), vec![MarketData { time: 5, price: 50 }]);
    }
}
