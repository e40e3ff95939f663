//! The relay loop: receive, decode, sample, publish.
//!
//! One loop per service instance. Datagrams are handled strictly in arrival order and the sink
//! sees emitted values in that same order. Publishing never blocks, so a slow subscriber cannot
//! hold up the socket.
//!
//! Fault handling:
//! - short or malformed datagram: dropped, loop continues
//! - socket fault: loop ends (or is restarted under [`RestartPolicy::Backoff`])
//! - shutdown: loop ends normally
//!
//! The source is closed on every exit path.

use std::io;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::aggregator::{Observation, PriceAggregator};
use crate::codec::decode_quote;
use crate::config::{RelayConfig, RestartPolicy};
use crate::error::{DecodeError, RecvError, RelayError};
use crate::receiver::{DatagramSource, MulticastReceiver};
use crate::sink::PriceSink;
use crate::stats::RelayStats;

/// Aggregator, sink, and counters for one relay instance. Survives restarts of the source.
pub struct Relay<S> {
    aggregator: PriceAggregator,
    sink: S,
    stats: RelayStats,
}

impl<S: PriceSink> Relay<S> {
    pub fn new(sink: S, sample_interval: Duration) -> Self {
        Self {
            aggregator: PriceAggregator::starting_now(sample_interval),
            sink,
            stats: RelayStats::new(),
        }
    }

    /// Shares `stats` with someone else (e.g. the HTTP layer).
    pub fn with_stats(mut self, stats: RelayStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Handles one datagram observed at `now`. Publishes when the sampler allows it.
    pub fn process(&mut self, datagram: &[u8], now: Instant) -> Result<Observation, DecodeError> {
        self.stats.record_datagram();
        let (bid, ask) = decode_quote(datagram).map_err(|e| {
            self.stats.record_decode_failure();
            e
        })?;
        let observation = self.aggregator.observe(&bid, &ask, now);
        match observation {
            Observation::Emit(data) => {
                self.stats.record_emitted();
                self.sink.publish(data);
            }
            Observation::Suppressed => self.stats.record_suppressed(),
        }
        Ok(observation)
    }

    /// Pumps `source` until shutdown (`Ok`) or a transport fault (`Err`). Closes `source` either way.
    pub async fn drive<D: DatagramSource>(
        &mut self,
        source: &mut D,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        let result = self.pump(source, shutdown).await;
        source.close();
        result
    }

    async fn pump<D: DatagramSource>(
        &mut self,
        source: &mut D,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        loop {
            let datagram = match source.next_datagram(shutdown).await {
                Ok(d) => d,
                Err(RecvError::Cancelled) => return Ok(()),
                Err(RecvError::Closed) => {
                    return Err(RelayError::Transport(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "datagram source closed",
                    )))
                }
                Err(RecvError::Transport(e)) => return Err(RelayError::Transport(e)),
            };
            trace!(
                "datagram len={} from={:?}",
                datagram.payload.len(),
                datagram.source
            );
            if let Err(e) = self.process(&datagram.payload, Instant::now()) {
                debug!("dropping datagram from {:?}: {}", datagram.source, e);
            }
        }
    }
}

/// Sleeps for `delay` unless shutdown comes first. Returns `true` if shut down.
async fn shutdown_during(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = crate::receiver::wait_for_shutdown(shutdown) => true,
    }
}

/// Opens a source with `open` and drives it under `policy`.
///
/// The first open failing is a startup fault and is returned without retry. Under
/// [`RestartPolicy::Backoff`], later transport faults close the source, wait, and reopen;
/// failed reopens keep backing off until shutdown.
pub async fn supervise<D, F, S>(
    mut open: F,
    relay: &mut Relay<S>,
    policy: RestartPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), RelayError>
where
    D: DatagramSource,
    F: FnMut() -> Result<D, RelayError>,
    S: PriceSink,
{
    let mut source = open().map_err(|e| {
        error!("relay startup failed: {}", e);
        e
    })?;
    info!("relay started");

    loop {
        let fault = match relay.drive(&mut source, &mut shutdown).await {
            Ok(()) => {
                info!("relay stopped");
                return Ok(());
            }
            Err(e) => e,
        };

        let (initial, max) = match policy {
            RestartPolicy::Never => {
                error!("relay stopped on fault: {}", fault);
                return Err(fault);
            }
            RestartPolicy::Backoff { initial, max } => (initial, max),
        };

        warn!("relay fault: {}", fault);
        let mut delay = initial;
        source = loop {
            warn!("reopening datagram source in {:?}", delay);
            if shutdown_during(delay, &mut shutdown).await {
                info!("relay stopped");
                return Ok(());
            }
            delay = (delay * 2).min(max);
            match open() {
                Ok(s) => break s,
                Err(e) => warn!("reopen failed: {}", e),
            }
        };
        relay.stats.record_restart();
        info!("relay restarted");
    }
}

/// Runs the relay against the configured multicast group until shutdown or a fatal fault.
pub async fn run<S: PriceSink>(
    config: &RelayConfig,
    sink: S,
    stats: RelayStats,
    shutdown: watch::Receiver<bool>,
) -> Result<(), RelayError> {
    let mut relay = Relay::new(sink, config.sample_interval).with_stats(stats);
    let multicast = config.multicast;
    supervise(
        move || MulticastReceiver::open(multicast),
        &mut relay,
        config.restart,
        shutdown,
    )
    .await
}
