//! # Price Relay
//!
//! Relays a binary multicast quote feed to WebSocket dashboards: joins a UDP multicast group,
//! decodes 80-byte best bid/ask datagrams, derives the mid price, samples it to at most one
//! update per interval, and publishes it to every connected subscriber.
//!
//! ## Pipeline
//!
//! socket ([`MulticastReceiver`]) → [`decode_quote`] → [`PriceAggregator::observe`] →
//! [`PriceSink::publish`] ([`BroadcastSink`]) → [`api`] WebSocket sessions.
//!
//! [`relay::run`] wires the pipeline together and owns the fault/restart policy.
//!
//! ## Example
//!
//! ```rust
//! use price_relay::{encode_quote, InMemoryPriceSink, MarketData, OrderEntry, Relay};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sink = InMemoryPriceSink::new();
//! let mut relay = Relay::new(sink.clone(), Duration::from_secs(1));
//! let bid = OrderEntry { id: 1, time: 7, price: 1000, quantity: 1, kind: 1, symbol: 0 };
//! let ask = OrderEntry { id: 2, time: 7, price: 1002, quantity: 1, kind: 1, symbol: 0 };
//! relay.process(&encode_quote(&bid, &ask), tokio::time::Instant::now()).unwrap();
//! assert_eq!(sink.published(), vec![MarketData { time: 7, price: 1001 }]);
//! # }
//! ```

pub mod aggregator;
pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod feed;
pub mod receiver;
pub mod relay;
pub mod sink;
pub mod stats;
pub mod types;

pub use aggregator::{derive, mid_price, Observation, PriceAggregator};
pub use codec::{decode_order_entry, decode_quote, encode_order_entry, encode_quote};
pub use config::{MulticastConfig, RelayConfig, RestartPolicy, XAxis};
pub use error::{DecodeError, RecvError, RelayError};
pub use feed::{FeedPublisher, QuoteGenerator, QuoteGeneratorConfig};
pub use receiver::{Datagram, DatagramSource, MulticastReceiver};
pub use relay::{supervise, Relay};
pub use sink::{BroadcastSink, InMemoryPriceSink, PriceSink};
pub use stats::{RelayStats, StatsSnapshot};
pub use types::{MarketData, OrderEntry, ORDER_ENTRY_SIZE, QUOTE_DATAGRAM_SIZE};
