//! Service configuration from environment variables.
//!
//! Every setting has a default matching the production feed (`239.255.0.1:54001`, one update
//! per second, no restart on transport fault). See [`RelayConfig::from_env`] for the variable list.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::RelayError;

pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);
pub const DEFAULT_PORT: u16 = 54001;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Where the feed comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MulticastConfig {
    pub group: Ipv4Addr,
    /// `0` binds an ephemeral port.
    pub port: u16,
    /// Local interface used for the group membership; `0.0.0.0` lets the OS choose.
    pub interface: Ipv4Addr,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// What the relay does after a transport fault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Log and stop.
    #[default]
    Never,
    /// Close, wait, reopen. Delay doubles per consecutive failure up to `max`.
    Backoff { initial: Duration, max: Duration },
}

/// What dashboards receive as `x` in `price_update` messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum XAxis {
    /// The price point's feed time.
    #[default]
    Time,
    /// Per-connection counter starting at 0.
    Sequence,
}

/// Full service configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub multicast: MulticastConfig,
    pub http_port: u16,
    pub sample_interval: Duration,
    pub broadcast_capacity: usize,
    pub restart: RestartPolicy,
    pub x_axis: XAxis,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            multicast: MulticastConfig::default(),
            http_port: DEFAULT_HTTP_PORT,
            sample_interval: crate::aggregator::DEFAULT_SAMPLE_INTERVAL,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            restart: RestartPolicy::Never,
            x_axis: XAxis::Time,
        }
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: Option<String>) -> Result<Option<T>, RelayError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(|e| RelayError::Config {
            var,
            reason: format!("{:?}: {}", s, e),
        }),
    }
}

fn positive_millis(var: &'static str, raw: Option<String>, default: Duration) -> Result<Duration, RelayError> {
    match parse::<u64>(var, raw)? {
        None => Ok(default),
        Some(0) => Err(RelayError::Config {
            var,
            reason: "must be greater than 0".into(),
        }),
        Some(ms) => Ok(Duration::from_millis(ms)),
    }
}

impl RelayConfig {
    /// Load from the process environment.
    ///
    /// - `MULTICAST_GROUP` (default `239.255.0.1`), `MULTICAST_PORT` (default `54001`),
    ///   `MULTICAST_INTERFACE` (default `0.0.0.0`)
    /// - `PORT`: HTTP/WebSocket listen port (default `8080`)
    /// - `SAMPLE_INTERVAL_MS` (default `1000`), `BROADCAST_CAPACITY` (default `64`)
    /// - `RESTART_POLICY=never|backoff`, `RESTART_BACKOFF_MS` (default `500`),
    ///   `RESTART_BACKOFF_MAX_MS` (default `30000`)
    /// - `X_AXIS=time|sequence`
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RelayConfig::from_env`] with a custom variable source. For tests.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let defaults = Self::default();

        let group = parse::<Ipv4Addr>("MULTICAST_GROUP", get("MULTICAST_GROUP"))?
            .unwrap_or(defaults.multicast.group);
        if !group.is_multicast() {
            return Err(RelayError::Config {
                var: "MULTICAST_GROUP",
                reason: format!("{} is not a multicast address", group),
            });
        }
        let multicast = MulticastConfig {
            group,
            port: parse("MULTICAST_PORT", get("MULTICAST_PORT"))?.unwrap_or(defaults.multicast.port),
            interface: parse("MULTICAST_INTERFACE", get("MULTICAST_INTERFACE"))?
                .unwrap_or(defaults.multicast.interface),
        };

        let http_port = parse("PORT", get("PORT"))?.unwrap_or(defaults.http_port);
        let sample_interval = positive_millis(
            "SAMPLE_INTERVAL_MS",
            get("SAMPLE_INTERVAL_MS"),
            defaults.sample_interval,
        )?;
        let broadcast_capacity = match parse::<usize>("BROADCAST_CAPACITY", get("BROADCAST_CAPACITY"))? {
            None => defaults.broadcast_capacity,
            Some(0) => {
                return Err(RelayError::Config {
                    var: "BROADCAST_CAPACITY",
                    reason: "must be greater than 0".into(),
                })
            }
            Some(n) => n,
        };

        let restart = match get("RESTART_POLICY").map(|s| s.trim().to_ascii_lowercase()) {
            None => RestartPolicy::Never,
            Some(s) if s.is_empty() || s == "never" => RestartPolicy::Never,
            Some(s) if s == "backoff" => {
                let initial = positive_millis(
                    "RESTART_BACKOFF_MS",
                    get("RESTART_BACKOFF_MS"),
                    Duration::from_millis(500),
                )?;
                let max = positive_millis(
                    "RESTART_BACKOFF_MAX_MS",
                    get("RESTART_BACKOFF_MAX_MS"),
                    Duration::from_secs(30),
                )?;
                RestartPolicy::Backoff {
                    initial,
                    max: max.max(initial),
                }
            }
            Some(other) => {
                return Err(RelayError::Config {
                    var: "RESTART_POLICY",
                    reason: format!("unknown policy {:?} (expected never or backoff)", other),
                })
            }
        };

        let x_axis = match get("X_AXIS").map(|s| s.trim().to_ascii_lowercase()) {
            None => XAxis::Time,
            Some(s) if s.is_empty() || s == "time" => XAxis::Time,
            Some(s) if s == "sequence" => XAxis::Sequence,
            Some(other) => {
                return Err(RelayError::Config {
                    var: "X_AXIS",
                    reason: format!("unknown axis {:?} (expected time or sequence)", other),
                })
            }
        };

        Ok(Self {
            multicast,
            http_port,
            sample_interval,
            broadcast_capacity,
            restart,
            x_axis,
        })
    }
}
