//! Synthetic quote feed: deterministic bid/ask generator and a multicast publisher.
//!
//! Used by the `feed_sim` binary for demos and by tests. Same seed ⇒ same sequence of quotes.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use socket2::{Domain, Protocol, Socket, Type};

use crate::codec::encode_quote;
use crate::error::RelayError;
use crate::types::{symbol_from_code, OrderEntry};

/// Wire `type` for limit orders, as published by the exchange.
pub const LIMIT_ORDER: i32 = 1;

/// Configuration for the synthetic quote generator. All ranges are inclusive.
#[derive(Clone, Debug)]
pub struct QuoteGeneratorConfig {
    /// RNG seed. Same seed ⇒ same stream.
    pub seed: u64,
    /// Up to four ASCII characters.
    pub symbol: String,
    /// Starting mid price, in feed price units.
    pub start_price: i64,
    /// Largest mid-price move per quote, either direction.
    pub max_step: i64,
    /// Bid/ask spread range. Values below 1 are raised to 1.
    pub spread_min: i64,
    pub spread_max: i64,
    pub quantity_min: i64,
    pub quantity_max: i64,
    /// Feed time of the first quote and the increment between quotes.
    pub start_time: i64,
    pub time_step: i64,
}

impl Default for QuoteGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            symbol: "BTC".into(),
            start_price: 10_000,
            max_step: 5,
            spread_min: 1,
            spread_max: 4,
            quantity_min: 1,
            quantity_max: 100,
            start_time: 1,
            time_step: 1,
        }
    }
}

/// Deterministic random walk of best bid/ask. Create with [`QuoteGenerator::new`].
pub struct QuoteGenerator {
    rng: StdRng,
    config: QuoteGeneratorConfig,
    symbol: i32,
    mid: i64,
    next_id: i64,
    next_time: i64,
}

impl QuoteGenerator {
    pub fn new(config: QuoteGeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            symbol: symbol_from_code(&config.symbol),
            mid: config.start_price,
            next_id: 1,
            next_time: config.start_time,
            config,
        }
    }

    /// Next `(best_bid, best_ask)`. `bid.price < ask.price` always holds.
    pub fn next_quote(&mut self) -> (OrderEntry, OrderEntry) {
        let step = self.config.max_step.max(0);
        self.mid = self.mid.saturating_add(self.rng.gen_range(-step..=step));

        let spread_min = self.config.spread_min.max(1);
        let spread = self.rng.gen_range(spread_min..=self.config.spread_max.max(spread_min));
        let bid_price = self.mid.saturating_sub(spread / 2);
        let ask_price = bid_price.saturating_add(spread);

        let qty_min = self.config.quantity_min;
        let qty_max = self.config.quantity_max.max(qty_min);
        let time = self.next_time;
        self.next_time = self.next_time.saturating_add(self.config.time_step);

        let bid = OrderEntry {
            id: self.next_id,
            time,
            price: bid_price,
            quantity: self.rng.gen_range(qty_min..=qty_max),
            kind: LIMIT_ORDER,
            symbol: self.symbol,
        };
        let ask = OrderEntry {
            id: self.next_id + 1,
            time,
            price: ask_price,
            quantity: self.rng.gen_range(qty_min..=qty_max),
            kind: LIMIT_ORDER,
            symbol: self.symbol,
        };
        self.next_id += 2;
        (bid, ask)
    }

    /// Returns exactly `n` quotes. Advances the generator state.
    pub fn take_quotes(&mut self, n: usize) -> Vec<(OrderEntry, OrderEntry)> {
        (0..n).map(|_| self.next_quote()).collect()
    }
}

/// Sends quote datagrams to a multicast group (or any UDP destination).
pub struct FeedPublisher {
    socket: UdpSocket,
    target: SocketAddr,
}

impl FeedPublisher {
    /// Opens an unbound sender. `ttl` 1 keeps packets on the local subnet. Loopback stays
    /// enabled so receivers on the same host see the feed.
    pub fn open(group: Ipv4Addr, port: u16, ttl: u32) -> Result<Self, RelayError> {
        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(RelayError::Socket)?;
        socket.set_multicast_ttl_v4(ttl).map_err(RelayError::Socket)?;
        socket.set_multicast_loop_v4(true).map_err(RelayError::Socket)?;
        Ok(Self {
            socket: socket.into(),
            target: SocketAddr::V4(SocketAddrV4::new(group, port)),
        })
    }

    /// Sender to an arbitrary address (e.g. unicast loopback in tests).
    pub fn to_addr(target: SocketAddr) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
            .map_err(RelayError::Socket)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Publishes one 80-byte quote datagram.
    pub fn publish(&self, bid: &OrderEntry, ask: &OrderEntry) -> Result<(), RelayError> {
        self.publish_raw(&encode_quote(bid, ask))
    }

    /// Publishes arbitrary bytes (malformed-datagram testing).
    pub fn publish_raw(&self, payload: &[u8]) -> Result<(), RelayError> {
        self.socket
            .send_to(payload, self.target)
            .map(|_| ())
            .map_err(RelayError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let c = QuoteGeneratorConfig {
            seed: 42,
            ..Default::default()
        };
        let a = QuoteGenerator::new(c.clone()).take_quotes(20);
        let b = QuoteGenerator::new(c).take_quotes(20);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_stream() {
        let a = QuoteGenerator::new(QuoteGeneratorConfig {
            seed: 1,
            ..Default::default()
        })
        .take_quotes(10);
        let b = QuoteGenerator::new(QuoteGeneratorConfig {
            seed: 2,
            ..Default::default()
        })
        .take_quotes(10);
        assert_ne!(a, b, "different seeds should produce different quotes");
    }

    #[test]
    fn quotes_are_uncrossed_with_increasing_ids_and_times() {
        let quotes = QuoteGenerator::new(QuoteGeneratorConfig {
            seed: 7,
            time_step: 1000,
            ..Default::default()
        })
        .take_quotes(200);
        let mut last_time = i64::MIN;
        for (i, (bid, ask)) in quotes.iter().enumerate() {
            assert!(bid.price < ask.price, "quote {} crossed", i);
            assert_eq!(bid.id, 1 + 2 * i as i64);
            assert_eq!(ask.id, bid.id + 1);
            assert!(bid.time > last_time);
            last_time = bid.time;
            assert_eq!(bid.symbol_code().as_deref(), Some("BTC"));
        }
    }

    #[test]
    fn degenerate_ranges_are_clamped() {
        let (bid, ask) = QuoteGenerator::new(QuoteGeneratorConfig {
            spread_min: 0,
            spread_max: 0,
            max_step: -3,
            quantity_min: 5,
            quantity_max: 1,
            ..Default::default()
        })
        .next_quote();
        assert_eq!(ask.price - bid.price, 1);
        assert_eq!(bid.quantity, 5);
    }

    #[test]
    fn publisher_sends_quote_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let publisher = FeedPublisher::to_addr(receiver.local_addr().unwrap()).unwrap();
        let (bid, ask) = QuoteGenerator::new(QuoteGeneratorConfig::default()).next_quote();
        publisher.publish(&bid, &ask).unwrap();
        let mut buf = [0u8; 128];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(n, 80);
        assert_eq!(crate::codec::decode_quote(&buf[..n]).unwrap(), (bid, ask));
    }
}
