//! Tests for the UDP transport against a fake server on localhost.

use std::sync::Arc;
use std::time::Duration;

use openracing_acserver_client::{
    ClientConfig, ClientError, PluginContext, SessionClient, SessionEvent, SessionPlugin, run_udp,
};
use openracing_acserver_protocol::{Message, PROTOCOL_VERSION, decode, encode};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<&'static str>>,
}

impl SessionPlugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(&self, event: &SessionEvent, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        self.events.lock().push(event.name());
        Ok(())
    }
}

fn free_port() -> Result<u16, std::io::Error> {
    let probe = std::net::UdpSocket::bind("127.0.0.1:0")?;
    Ok(probe.local_addr()?.port())
}

async fn recv_message(server: &UdpSocket) -> Result<Message, Box<dyn std::error::Error>> {
    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), server.recv_from(&mut buf)).await??;
    let datagram = buf.get(..len).ok_or("datagram larger than buffer")?;
    Ok(decode(datagram)?)
}

#[tokio::test]
async fn test_chat_command_round_trip_over_udp() -> TestResult {
    let server = UdpSocket::bind("127.0.0.1:0").await?;
    let server_port = server.local_addr()?.port();
    let client_port = free_port()?;

    let config = ClientConfig::builder()
        .listening_port(client_port)
        .remote("127.0.0.1", server_port)
        .admin_password("pitwall")
        .build()?;
    let client = SessionClient::new(config)?;
    let recorder = Arc::new(Recorder::default());
    client.register_plugin(recorder.clone())?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(run_udp(client.clone(), async move {
        stop_rx.await.unwrap_or_default();
    }));

    let client_addr = ("127.0.0.1", client_port);
    // Give the transport a moment to bind before sending.
    tokio::time::sleep(Duration::from_millis(100)).await;
    server
        .send_to(&encode(&Message::Version { version: PROTOCOL_VERSION })?, client_addr)
        .await?;
    server
        .send_to(
            &encode(&Message::Chat {
                car_id: 2,
                message: "/admin pitwall".to_string(),
            })?,
            client_addr,
        )
        .await?;

    assert_eq!(
        recv_message(&server).await?,
        Message::SendChat {
            car_id: 2,
            message: "You are now admin".to_string(),
        }
    );

    stop_tx.send(()).map_err(|()| "transport already stopped")?;
    tokio::time::timeout(Duration::from_secs(5), task).await???;

    assert!(!client.is_connected());
    let events = recorder.events.lock().clone();
    assert_eq!(events.first(), Some(&"connected"));
    assert!(events.contains(&"protocol_version"));
    assert!(events.contains(&"chat"));
    assert_eq!(events.last(), Some(&"disconnected"));
    Ok(())
}

#[tokio::test]
async fn test_version_mismatch_stops_transport() -> TestResult {
    let server = UdpSocket::bind("127.0.0.1:0").await?;
    let server_port = server.local_addr()?.port();
    let client_port = free_port()?;

    let config = ClientConfig::builder()
        .listening_port(client_port)
        .remote("127.0.0.1", server_port)
        .build()?;
    let client = SessionClient::new(config)?;
    let task = tokio::spawn(run_udp(client.clone(), std::future::pending()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    server
        .send_to(&encode(&Message::Version { version: 2 })?, ("127.0.0.1", client_port))
        .await?;

    let result = tokio::time::timeout(Duration::from_secs(5), task).await??;
    assert!(matches!(
        result,
        Err(ClientError::ProtocolVersionMismatch { received: 2, .. })
    ));
    assert!(!client.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_second_transport_is_rejected() -> TestResult {
    let config = ClientConfig::builder().listening_port(free_port()?).build()?;
    let client = SessionClient::new(config)?;
    let outbound = client.take_outbound();
    assert!(outbound.is_some());

    let result = run_udp(client.clone(), std::future::ready(())).await;
    assert!(matches!(result, Err(ClientError::TransportAttached)));
    assert!(!client.is_connected());
    Ok(())
}
