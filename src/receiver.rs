//! UDP multicast receiver.
//!
//! [`MulticastReceiver::open`] binds `0.0.0.0:<port>` with `SO_REUSEADDR` (so an old and a new
//! instance can overlap during restarts) and joins the group right away. A failed join is a
//! startup fault. [`DatagramSource::next_datagram`] waits for one packet or for shutdown.
//! The socket is released by [`DatagramSource::close`] or on drop, whichever comes first.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::config::MulticastConfig;
use crate::error::{RecvError, RelayError};

/// Large enough for any UDP payload.
const RECV_BUFFER_SIZE: usize = 65536;

/// One received packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: Option<SocketAddr>,
}

/// Anything the relay loop can pull datagrams from.
///
/// `shutdown` flips to `true` (or its sender is dropped) when the caller wants to stop;
/// implementations must then return [`RecvError::Cancelled`] promptly.
pub trait DatagramSource: Send {
    fn next_datagram(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> impl Future<Output = Result<Datagram, RecvError>> + Send;

    /// Releases the underlying resource. Must be idempotent.
    fn close(&mut self);
}

/// Waits until `shutdown` reads `true` or its sender goes away.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Socket joined to one multicast group.
#[derive(Debug)]
pub struct MulticastReceiver {
    socket: Option<UdpSocket>,
    config: MulticastConfig,
    local_addr: SocketAddr,
    buf: Vec<u8>,
}

impl MulticastReceiver {
    /// Creates, binds, and joins. Must be called inside a Tokio runtime.
    pub fn open(config: MulticastConfig) -> Result<Self, RelayError> {
        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(RelayError::Socket)?;
        socket.set_reuse_address(true).map_err(RelayError::Socket)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket
            .bind(&bind_addr.into())
            .map_err(|source| RelayError::Bind {
                port: config.port,
                source,
            })?;
        socket
            .join_multicast_v4(&config.group, &config.interface)
            .map_err(|source| RelayError::Join {
                group: config.group,
                source,
            })?;

        socket.set_nonblocking(true).map_err(RelayError::Socket)?;
        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(RelayError::Socket)?;
        let local_addr = socket.local_addr().map_err(RelayError::Socket)?;

        info!(
            "multicast receiver joined group={} port={} local={}",
            config.group,
            config.port,
            local_addr
        );
        Ok(Self {
            socket: Some(socket),
            config,
            local_addr,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Address the socket is bound to (useful when `port` was 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

impl DatagramSource for MulticastReceiver {
    async fn next_datagram(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Datagram, RecvError> {
        let socket = self.socket.as_ref().ok_or(RecvError::Closed)?;
        if *shutdown.borrow_and_update() {
            return Err(RecvError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => Err(RecvError::Cancelled),
            received = socket.recv_from(&mut self.buf) => {
                let (len, source) = received.map_err(RecvError::Transport)?;
                Ok(Datagram {
                    payload: self.buf[..len].to_vec(),
                    source: Some(source),
                })
            }
        }
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.leave_multicast_v4(self.config.group, self.config.interface) {
                debug!("leave multicast group {} failed: {}", self.config.group, e);
            }
            info!("multicast receiver closed local={}", self.local_addr);
        }
    }
}

impl Drop for MulticastReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_shutdown_returns_when_flag_set() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_for_shutdown(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("returns promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        wait_for_shutdown(&mut rx).await;
    }
}
