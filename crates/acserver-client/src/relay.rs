//! Raw pass-through to wire-level external plugins.
//!
//! Every inbound datagram is copied unmodified to each external endpoint, and
//! whatever an endpoint sends back is forwarded verbatim to the server.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ExternalPluginConfig;
use crate::error::ClientResult;
use crate::requests::ServerRequests;

/// Largest datagram the server sends.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[derive(Debug)]
struct RelayEndpoint {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    // Taken by `spawn_forwarders`; datagrams mirrored before that stay queued.
    pending: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

#[derive(Debug, Default)]
pub struct ExternalPluginRelay {
    endpoints: Vec<RelayEndpoint>,
}

impl ExternalPluginRelay {
    /// Bind one local socket per configured plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote address does not resolve or a local port
    /// cannot be bound.
    pub async fn bind(plugins: &[ExternalPluginConfig]) -> ClientResult<Self> {
        let mut endpoints = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let remote = plugin.remote_addr()?;
            let local = SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                plugin.listening_port,
            ));
            let socket = UdpSocket::bind(local).await?;
            info!(
                listening_port = plugin.listening_port,
                remote = %remote,
                "External plugin relay bound"
            );
            let (outbound, pending) = mpsc::unbounded_channel();
            endpoints.push(RelayEndpoint {
                socket: Arc::new(socket),
                remote,
                outbound,
                pending: Mutex::new(Some(pending)),
            });
        }
        Ok(Self { endpoints })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Queue an inbound datagram for every endpoint without waiting.
    pub fn mirror(&self, datagram: &[u8]) {
        for endpoint in &self.endpoints {
            if endpoint.outbound.send(datagram.to_vec()).is_err() {
                warn!(remote = %endpoint.remote, "External plugin relay stopped, datagram not mirrored");
            }
        }
    }

    /// Spawn the tasks serving each endpoint: one draining the mirror queue
    /// to the plugin, one forwarding the plugin's replies to the server.
    ///
    /// A second call only spawns forwarders; the mirror queues are drained
    /// by the first.
    #[must_use]
    pub fn spawn_forwarders(&self, requests: &ServerRequests) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(self.endpoints.len().saturating_mul(2));
        for endpoint in &self.endpoints {
            if let Some(pending) = endpoint.pending.lock().take() {
                tasks.push(tokio::spawn(drain_mirror_queue(
                    endpoint.socket.clone(),
                    endpoint.remote,
                    pending,
                )));
            }
            tasks.push(tokio::spawn(forward_replies(
                endpoint.socket.clone(),
                endpoint.remote,
                requests.clone(),
            )));
        }
        tasks
    }
}

async fn drain_mirror_queue(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    mut pending: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(datagram) = pending.recv().await {
        if let Err(e) = socket.send_to(&datagram, remote).await {
            warn!(%remote, error = %e, "Failed to mirror datagram to external plugin");
        }
    }
}

async fn forward_replies(socket: Arc<UdpSocket>, expected: SocketAddr, requests: ServerRequests) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let Some(datagram) = buf.get(..len) else {
                    continue;
                };
                if from != expected {
                    debug!(%from, %expected, "Relaying datagram from unexpected peer");
                }
                requests.send_raw(datagram.to_vec());
            }
            Err(e) => {
                warn!(remote = %expected, error = %e, "External plugin receive error");
            }
        }
    }
}
