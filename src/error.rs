//! Error types for decoding, receiving, and running the relay.

use std::io;
use std::net::Ipv4Addr;

/// A datagram (or the tail of one) too short to hold a full record.
///
/// Per-packet and recoverable: the relay drops the datagram and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("record at offset {offset} needs {needed} bytes, buffer has {available}")]
    OutOfRange {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Outcome of a receive that did not yield a datagram.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// Shutdown was requested while waiting. Not a fault.
    #[error("receive cancelled")]
    Cancelled,
    /// The receiver was already closed.
    #[error("receiver is closed")]
    Closed,
    #[error("socket receive failed: {0}")]
    Transport(#[source] io::Error),
}

/// Startup, transport, and configuration faults.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to create or configure socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to bind 0.0.0.0:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to join multicast group {group}: {source}")]
    Join {
        group: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    #[error("transport fault: {0}")]
    Transport(#[source] io::Error),
    #[error("invalid {var}: {reason}")]
    Config { var: &'static str, reason: String },
}

impl RelayError {
    /// Startup faults are never retried, whatever the restart policy.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            RelayError::Socket(_) | RelayError::Bind { .. } | RelayError::Join { .. }
        )
    }
}
