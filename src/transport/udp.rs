//! UDP transport - OSC over a connected datagram socket
//!
//! The socket is connected to the console so only its datagrams are
//! received. A background task decodes every datagram and forwards the
//! resulting messages; undecodable datagrams are logged and dropped.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{osc, InboundMessage, OutboundCommand, Transport};
use crate::error::TransportError;

/// Largest datagram the receive loop accepts
const MAX_DATAGRAM: usize = 4096;

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    sent: AtomicU64,
    recv_task: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind `bind`, connect to `remote`, and start the receive loop
    ///
    /// Returns the transport and the stream of decoded inbound messages.
    /// The stream ends when the transport is dropped.
    pub async fn connect(
        bind: SocketAddr,
        remote: SocketAddr,
    ) -> Result<(Self, mpsc::UnboundedReceiver<InboundMessage>)> {
        let socket = UdpSocket::bind(bind)
            .await
            .with_context(|| format!("Failed to bind UDP socket on {}", bind))?;
        socket
            .connect(remote)
            .await
            .with_context(|| format!("Failed to connect UDP socket to {}", remote))?;

        let local = socket.local_addr().context("Failed to read local address")?;
        info!("📡 UDP transport {} → {}", local, remote);

        let socket = Arc::new(socket);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let recv_task = tokio::spawn(Self::receive_loop(Arc::clone(&socket), inbound_tx));

        Ok((
            Self {
                socket,
                remote,
                sent: AtomicU64::new(0),
                recv_task,
            },
            inbound_rx,
        ))
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    /// Datagrams sent so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    async fn receive_loop(socket: Arc<UdpSocket>, tx: mpsc::UnboundedSender<InboundMessage>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = match socket.recv(&mut buf).await {
                Ok(len) => len,
                Err(e) => {
                    // ICMP port unreachable surfaces here while the console is offline
                    debug!("UDP receive error: {}", e);
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    continue;
                }
            };

            match osc::decode(&buf[..len]) {
                Ok(messages) => {
                    for msg in messages {
                        trace!(addr = %msg.address, value = %msg.value, "OSC in");
                        if tx.send(msg).is_err() {
                            debug!("Inbound receiver dropped, stopping UDP receive loop");
                            return;
                        }
                    }
                }
                Err(e) => debug!("{}", e),
            }
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn name(&self) -> &str {
        "udp"
    }

    async fn send(&self, command: OutboundCommand) -> Result<(), TransportError> {
        let bytes = osc::encode(&command)?;
        let written = self.socket.send(&bytes).await?;
        if written != bytes.len() {
            warn!(
                "Short UDP write for {} ({} of {} bytes)",
                command.address,
                written,
                bytes.len()
            );
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        trace!(addr = %command.address, query = command.is_query(), "OSC out");
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}
