//! UDP plugin client for the Assetto Corsa dedicated server.
//!
//! A [`SessionClient`] consumes the server's plugin datagrams, keeps a
//! [`openracing_acserver_session::SessionStore`] current, and fans messages and
//! derived [`SessionEvent`]s out to registered [`SessionPlugin`]s. Finalized
//! sessions go to [`ReportSink`]s. Chat lines starting with `/` are treated as
//! admin commands.
//!
//! The client itself does no socket I/O: [`run_udp`] drives it over UDP, and
//! tests can feed [`SessionClient::handle_datagram`] directly.
//!
//! ```no_run
//! use openracing_acserver_client::{ClientConfig, SessionClient, run_udp};
//!
//! # async fn example() -> Result<(), openracing_acserver_client::ClientError> {
//! let config = ClientConfig::builder().remote("127.0.0.1", 11000).build()?;
//! let client = SessionClient::new(config)?;
//! run_udp(client, async {
//!     tokio::signal::ctrl_c().await.unwrap_or_default();
//! })
//! .await
//! # }
//! ```

#![deny(static_mut_refs)]

pub mod client;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod keepalive;
pub mod plugin;
pub mod relay;
pub mod requests;
pub mod transport;

pub use client::{HANDSHAKE_GRACE, SessionClient};
pub use commands::{CommandOutcome, CommandProcessor};
pub use config::{ClientConfig, ClientConfigBuilder, ExternalPluginConfig};
pub use dispatcher::{EventDispatcher, PluginStats};
pub use error::{ClientError, ClientResult};
pub use keepalive::{ActivityMarker, KeepAliveStatus, PROBE_GRACE};
pub use plugin::{PluginContext, ReportSink, SessionEvent, SessionPlugin};
pub use relay::{ExternalPluginRelay, MAX_DATAGRAM_SIZE};
pub use requests::ServerRequests;
pub use transport::run_udp;
