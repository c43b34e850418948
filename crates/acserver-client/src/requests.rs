//! Outbound request handle.

use openracing_acserver_protocol::{
    CURRENT_SESSION_INDEX, Message, SetSessionMessage, encode,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ClientResult;

/// Cloneable handle for sending requests to the server.
///
/// Sends are fire-and-forget: datagrams are queued on an unbounded channel
/// drained by the transport, so callers never block. Requests made while no
/// transport is attached are dropped.
#[derive(Debug, Clone)]
pub struct ServerRequests {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    log_requests: bool,
}

impl ServerRequests {
    /// Create a handle and the receiver the transport drains.
    #[must_use]
    pub fn channel(log_requests: bool) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, log_requests }, rx)
    }

    /// Encode and queue one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded, e.g. a chat line
    /// longer than the wire allows.
    pub fn send(&self, message: &Message) -> ClientResult<()> {
        let bytes = encode(message)?;
        if self.log_requests {
            info!(request = message.kind().name(), ?message, "Server request");
        } else {
            debug!(request = message.kind().name(), "Server request");
        }
        self.send_raw(bytes);
        Ok(())
    }

    /// Queue an already encoded datagram verbatim.
    pub fn send_raw(&self, datagram: Vec<u8>) {
        if self.tx.send(datagram).is_err() {
            debug!("No transport attached; dropping outbound datagram");
        }
    }

    pub fn set_realtime_interval(&self, interval_ms: u16) -> ClientResult<()> {
        self.send(&Message::SetRealtimeInterval { interval_ms })
    }

    pub fn get_car_info(&self, car_id: u8) -> ClientResult<()> {
        self.send(&Message::GetCarInfo { car_id })
    }

    pub fn send_chat(&self, car_id: u8, message: impl Into<String>) -> ClientResult<()> {
        self.send(&Message::SendChat {
            car_id,
            message: message.into(),
        })
    }

    pub fn broadcast_chat(&self, message: impl Into<String>) -> ClientResult<()> {
        self.send(&Message::BroadcastChat {
            message: message.into(),
        })
    }

    /// Request info for `session_index`, or the running session when `None`.
    pub fn get_session_info(&self, session_index: Option<i16>) -> ClientResult<()> {
        self.send(&Message::GetSessionInfo {
            session_index: session_index.unwrap_or(CURRENT_SESSION_INDEX),
        })
    }

    pub fn set_session(&self, session: SetSessionMessage) -> ClientResult<()> {
        self.send(&Message::SetSession(session))
    }

    pub fn kick_user(&self, car_id: u8) -> ClientResult<()> {
        self.send(&Message::KickUser { car_id })
    }

    pub fn next_session(&self) -> ClientResult<()> {
        self.send(&Message::NextSession)
    }

    pub fn restart_session(&self) -> ClientResult<()> {
        self.send(&Message::RestartSession)
    }

    pub fn admin_command(&self, command: impl Into<String>) -> ClientResult<()> {
        self.send(&Message::AdminCommand {
            command: command.into(),
        })
    }
}
