//! Observer interfaces for session traffic.

use openracing_acserver_protocol::Message;
use openracing_acserver_session::{DriverInfo, IncidentInfo, LapInfo, SessionInfo, SessionReport};

use crate::requests::ServerRequests;

/// Derived notifications, raised after the state store has been updated.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    /// The server announced a supported protocol version.
    ProtocolVersion { version: u8 },
    /// Session info applied to the running session.
    SessionInfo(Box<SessionInfo>),
    /// A new session has become current.
    NewSession(Box<SessionInfo>),
    EndSession { report_file: String },
    NewConnection(DriverInfo),
    ConnectionClosed(DriverInfo),
    CarInfo(DriverInfo),
    CarUpdate(DriverInfo),
    LapCompleted { driver: DriverInfo, lap: LapInfo },
    Collision(IncidentInfo),
    ClientLoaded { car_id: u8 },
    Chat { car_id: u8, message: String },
    ServerError { message: String },
    /// A burst of realtime updates is complete.
    BulkCarUpdateFinished,
    /// The server stayed silent through a keep-alive probe.
    ServerTimeout,
    /// The server answered a keep-alive probe.
    ServerAlive,
}

impl SessionEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ProtocolVersion { .. } => "protocol_version",
            Self::SessionInfo(_) => "session_info",
            Self::NewSession(_) => "new_session",
            Self::EndSession { .. } => "end_session",
            Self::NewConnection(_) => "new_connection",
            Self::ConnectionClosed(_) => "connection_closed",
            Self::CarInfo(_) => "car_info",
            Self::CarUpdate(_) => "car_update",
            Self::LapCompleted { .. } => "lap_completed",
            Self::Collision(_) => "collision",
            Self::ClientLoaded { .. } => "client_loaded",
            Self::Chat { .. } => "chat",
            Self::ServerError { .. } => "server_error",
            Self::BulkCarUpdateFinished => "bulk_car_update_finished",
            Self::ServerTimeout => "server_timeout",
            Self::ServerAlive => "server_alive",
        }
    }
}

/// What a plugin sees alongside each callback.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    pub requests: &'a ServerRequests,
    /// The running session, already updated for the current message.
    pub session: &'a SessionInfo,
}

/// An in-process observer of server traffic.
///
/// Callbacks run in wire order while the client's state lock is held; they
/// must not call back into the [`crate::SessionClient`]. Use the context's
/// request handle to talk to the server. Errors and panics are contained
/// per plugin.
pub trait SessionPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Every decoded inbound message.
    fn on_message(&self, _message: &Message, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_event(&self, _event: &SessionEvent, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Receives finalized session reports.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    fn accept(&self, report: &SessionReport) -> anyhow::Result<()>;
}
