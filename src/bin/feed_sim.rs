//! Publishes synthetic best bid/ask quotes to the relay's multicast group.
//!
//! Env: `MULTICAST_GROUP`, `MULTICAST_PORT` (shared with the relay), `FEED_RATE_HZ` (default 10),
//! `FEED_SEED` (default 0), `FEED_SYMBOL` (default `BTC`), `FEED_COUNT` (default unlimited).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info};
use price_relay::{FeedPublisher, QuoteGenerator, QuoteGeneratorConfig, RelayConfig};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    let config = match RelayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let rate_hz: u64 = env_parse("FEED_RATE_HZ").filter(|&r| r > 0).unwrap_or(10);
    let count: Option<u64> = env_parse("FEED_COUNT");

    let start_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let mut generator = QuoteGenerator::new(QuoteGeneratorConfig {
        seed: env_parse("FEED_SEED").unwrap_or(0),
        symbol: std::env::var("FEED_SYMBOL").unwrap_or_else(|_| "BTC".into()),
        start_time,
        time_step: (1000 / rate_hz).max(1) as i64,
        ..Default::default()
    });

    let publisher = match FeedPublisher::open(config.multicast.group, config.multicast.port, 1) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(
        "publishing quotes to {} at {} Hz",
        publisher.target(),
        rate_hz
    );

    let mut ticker = tokio::time::interval(Duration::from_micros((1_000_000 / rate_hz).max(1)));
    let mut sent = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut listening = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            signal = &mut ctrl_c, if listening => match signal {
                Ok(()) => break,
                Err(e) => {
                    error!("cannot listen for ctrl-c: {}", e);
                    listening = false;
                    continue;
                }
            },
        }
        let (bid, ask) = generator.next_quote();
        if let Err(e) = publisher.publish(&bid, &ask) {
            error!("publish failed: {}", e);
            std::process::exit(1);
        }
        sent += 1;
        if count.map(|c| sent >= c).unwrap_or(false) {
            break;
        }
    }
    info!("published {} quotes", sent);
}
