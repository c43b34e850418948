//! UDP transport driving a [`SessionClient`].

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::client::SessionClient;
use crate::error::{ClientError, ClientResult};
use crate::relay::MAX_DATAGRAM_SIZE;

/// Run `client` over UDP until `shutdown` resolves or the server turns out to
/// speak another protocol version.
///
/// Receive and send errors are logged and survived. The client is
/// disconnected, and its session finalized, before this returns.
///
/// # Errors
///
/// Returns an error if the listening socket cannot be bound, the remote
/// address does not resolve, or on a protocol version mismatch.
pub async fn run_udp<F>(client: SessionClient, shutdown: F) -> ClientResult<()>
where
    F: Future<Output = ()>,
{
    let config = client.config().clone();
    let remote = config.remote_addr()?;
    let local = SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        config.listening_port,
    ));
    let socket = match UdpSocket::bind(local).await {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            error!(error = %e, port = config.listening_port, "Failed to bind plugin UDP socket");
            return Err(e.into());
        }
    };

    let mut outbound = client.take_outbound().ok_or(ClientError::TransportAttached)?;
    client.connect().await?;
    info!(local = %local, remote = %remote, "Plugin UDP transport running");

    let send_socket = socket.clone();
    let sender = tokio::spawn(async move {
        while let Some(datagram) = outbound.recv().await {
            if let Err(e) = send_socket.send_to(&datagram, remote).await {
                warn!(error = %e, remote = %remote, "UDP send error");
            }
        }
        debug!("Outbound queue closed");
    });

    tokio::pin!(shutdown);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let result = loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    let Some(datagram) = buf.get(..len) else {
                        continue;
                    };
                    if from.ip() != remote.ip() {
                        debug!(%from, "Datagram from unexpected peer");
                    }
                    if let Err(e) = client.handle_datagram(datagram) {
                        if e.is_fatal() {
                            break Err(e);
                        }
                        warn!(error = %e, "Failed to handle datagram");
                    }
                }
                Err(e) => warn!(error = %e, "UDP receive error"),
            },
        }
    };

    client.disconnect();
    sender.abort();
    result
}
