//! The session client: state store, dispatch and background tasks behind one
//! coarse lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use openracing_acserver_protocol::{
    Direction, Message, PROTOCOL_VERSION, SessionInfoMessage, decode,
};
use openracing_acserver_session::{
    Clock, DriverInfo, SessionInfo, SessionStore, SystemClock,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::CommandProcessor;
use crate::config::{ClientConfig, ExternalPluginConfig};
use crate::dispatcher::{EventDispatcher, PluginStats};
use crate::error::{ClientError, ClientResult};
use crate::keepalive::{ActivityMarker, KeepAliveStatus, supervise};
use crate::plugin::{PluginContext, ReportSink, SessionEvent, SessionPlugin};
use crate::relay::ExternalPluginRelay;
use crate::requests::ServerRequests;

/// How long after connecting the client waits for the server to volunteer
/// session info before asking for it.
pub const HANDSHAKE_GRACE: Duration = Duration::from_secs(3);

struct PendingRotation {
    generation: u64,
    message: SessionInfoMessage,
}

struct ClientState {
    connected: bool,
    store: SessionStore,
    dispatcher: EventDispatcher,
    commands: CommandProcessor,
    external_plugins: Vec<ExternalPluginConfig>,
    relay: Option<Arc<ExternalPluginRelay>>,
    pending_rotation: Option<PendingRotation>,
    rotation_generation: u64,
    runtime: Option<Handle>,
    tasks: Vec<JoinHandle<()>>,
}

impl ClientState {
    fn dispatch(&mut self, requests: &ServerRequests, event: &SessionEvent) {
        let ClientState {
            store, dispatcher, ..
        } = self;
        let ctx = PluginContext {
            requests,
            session: store.current(),
        };
        dispatcher.dispatch_event(event, &ctx);
    }

    fn driver(&self, connection_id: usize) -> Option<DriverInfo> {
        self.store.current().driver(connection_id).cloned()
    }

    /// Finalize the running session, hand it to the sinks and make `next`
    /// current.
    fn rotate(&mut self, next: &SessionInfoMessage) -> SessionEvent {
        self.finalize_current();
        self.store.apply_session_info(next, true);
        info!(
            session = %self.store.current().session_name,
            session_type = ?self.store.current().session_type,
            "Session rotated"
        );
        SessionEvent::NewSession(Box::new(self.store.current().clone()))
    }

    fn finalize_current(&mut self) {
        if let Some(report) = self.store.finalize_and_rotate() {
            let accepted = self.dispatcher.publish_report(&report);
            info!(
                session = %report.session.session_name,
                accepted,
                "Session report published"
            );
        }
    }

    fn flush_requests(&mut self, requests: &ServerRequests) {
        for message in self.store.take_requests() {
            if let Err(e) = requests.send(&message) {
                warn!(request = message.kind().name(), error = %e, "Failed to queue request");
            }
        }
    }
}

struct ClientInner {
    config: ClientConfig,
    requests: ServerRequests,
    outbound: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    activity: ActivityMarker,
    state: Mutex<ClientState>,
}

/// A connection to one dedicated server's plugin interface.
///
/// Cheap to clone; all clones share the same state. Every entry point takes
/// the state lock for the duration of one message, so store mutations and
/// plugin callbacks happen strictly in wire order.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("remote_host", &self.inner.config.remote_host)
            .field("remote_port", &self.inner.config.remote_port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Create a client using the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> ClientResult<Self> {
        config.validate()?;
        let (requests, outbound) = ServerRequests::channel(config.log_server_requests);
        let state = ClientState {
            connected: false,
            store: SessionStore::new(config.store_config(), clock),
            dispatcher: EventDispatcher::new(),
            commands: CommandProcessor::new(config.admin_password.clone()),
            external_plugins: config.external_plugins.clone(),
            relay: None,
            pending_rotation: None,
            rotation_generation: 0,
            runtime: None,
            tasks: Vec::new(),
        };
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                requests,
                outbound: Mutex::new(Some(outbound)),
                activity: ActivityMarker::new(),
                state: Mutex::new(state),
            }),
        })
    }

    fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Take the queue of encoded outbound datagrams. Only the first caller
    /// gets it; it belongs to whichever transport drives this client.
    #[must_use]
    pub fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.inner.outbound.lock().take()
    }

    #[must_use]
    pub fn requests(&self) -> ServerRequests {
        self.inner.requests.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().connected
    }

    /// Snapshot of the running session.
    #[must_use]
    pub fn current_session(&self) -> SessionInfo {
        self.inner.state.lock().store.current().clone()
    }

    /// The last finalized session, if any.
    #[must_use]
    pub fn previous_session(&self) -> Option<SessionInfo> {
        self.inner.state.lock().store.previous().cloned()
    }

    #[must_use]
    pub fn plugin_stats(&self) -> Vec<PluginStats> {
        self.inner.state.lock().dispatcher.stats()
    }

    fn registration_guard(&self) -> ClientResult<parking_lot::MutexGuard<'_, ClientState>> {
        let state = self.inner.state.lock();
        if state.connected {
            return Err(ClientError::RegistrationWhileConnected);
        }
        Ok(state)
    }

    pub fn register_plugin(&self, plugin: Arc<dyn SessionPlugin>) -> ClientResult<()> {
        self.registration_guard()?.dispatcher.register_plugin(plugin);
        Ok(())
    }

    pub fn register_report_sink(&self, sink: Arc<dyn ReportSink>) -> ClientResult<()> {
        self.registration_guard()?.dispatcher.register_sink(sink);
        Ok(())
    }

    pub fn register_external_plugin(&self, plugin: ExternalPluginConfig) -> ClientResult<()> {
        self.registration_guard()?.external_plugins.push(plugin);
        Ok(())
    }

    /// Start a connection: bind relays and start the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if already connected or a relay socket cannot be
    /// bound.
    pub async fn connect(&self) -> ClientResult<()> {
        let plugins = {
            let state = self.inner.state.lock();
            if state.connected {
                return Err(ClientError::AlreadyConnected);
            }
            state.external_plugins.clone()
        };

        let runtime = Handle::try_current().map_err(std::io::Error::other)?;
        let relay = Arc::new(ExternalPluginRelay::bind(&plugins).await?);

        let mut state = self.inner.state.lock();
        if state.connected {
            return Err(ClientError::AlreadyConnected);
        }
        state.connected = true;
        state.store.reset();
        state.pending_rotation = None;
        self.inner.activity.touch();

        let mut tasks = relay.spawn_forwarders(&self.inner.requests);
        tasks.push(self.spawn_handshake_grace(&runtime));
        if let Some(interval) = self.inner.config.keep_alive_interval() {
            tasks.push(self.spawn_keep_alive(&runtime, interval));
        }
        state.tasks = tasks;
        state.relay = Some(relay);
        state.runtime = Some(runtime);

        info!(
            remote_host = %self.inner.config.remote_host,
            remote_port = self.inner.config.remote_port,
            external_plugins = plugins.len(),
            "Connected to server plugin interface"
        );
        state.dispatch(&self.inner.requests, &SessionEvent::Connected);
        Ok(())
    }

    fn spawn_handshake_grace(&self, runtime: &Handle) -> JoinHandle<()> {
        let weak = self.downgrade();
        runtime.spawn(async move {
            tokio::time::sleep(HANDSHAKE_GRACE).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let state = inner.state.lock();
            if state.connected && !state.store.has_session() {
                debug!("No session info after handshake grace; requesting it");
                if let Err(e) = inner.requests.get_session_info(None) {
                    warn!(error = %e, "Failed to request session info");
                }
            }
        })
    }

    fn spawn_keep_alive(&self, runtime: &Handle, interval: Duration) -> JoinHandle<()> {
        let requests = self.inner.requests.clone();
        let weak = self.downgrade();
        runtime.spawn(supervise(
            self.inner.activity.clone(),
            interval,
            move || {
                debug!("Server quiet; probing with a session info request");
                if let Err(e) = requests.get_session_info(None) {
                    warn!(error = %e, "Failed to send keep-alive probe");
                }
            },
            move |status| {
                if let Some(inner) = weak.upgrade() {
                    Self::from_inner(inner).on_keep_alive(status);
                }
            },
        ))
    }

    fn on_keep_alive(&self, status: KeepAliveStatus) {
        let mut state = self.inner.state.lock();
        if !state.connected {
            return;
        }
        let event = match status {
            KeepAliveStatus::Timeout => {
                info!("Server did not answer the keep-alive probe");
                SessionEvent::ServerTimeout
            }
            KeepAliveStatus::Alive => {
                debug!("Server answered the keep-alive probe");
                SessionEvent::ServerAlive
            }
        };
        state.dispatch(&self.inner.requests, &event);
    }

    /// Feed one raw datagram from the server.
    ///
    /// Undecodable datagrams are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ProtocolVersionMismatch`] when the server speaks
    /// another protocol version; the client has disconnected by then.
    pub fn handle_datagram(&self, datagram: &[u8]) -> ClientResult<()> {
        self.inner.activity.touch();
        let relay = self.inner.state.lock().relay.clone();
        if let Some(relay) = relay {
            relay.mirror(datagram);
        }

        match decode(datagram) {
            Ok(message) => self.handle_message(&message),
            Err(e) => {
                warn!(
                    len = datagram.len(),
                    tag = datagram.first().copied(),
                    error = %e,
                    "Dropping undecodable datagram"
                );
                Ok(())
            }
        }
    }

    /// Apply one decoded message and notify plugins.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ProtocolVersionMismatch`] when the server speaks
    /// another protocol version.
    pub fn handle_message(&self, message: &Message) -> ClientResult<()> {
        if message.kind().direction() == Direction::Outbound {
            debug!(kind = message.kind().name(), "Ignoring request-only message from server");
            return Ok(());
        }

        let mut guard = self.inner.state.lock();
        if !guard.connected {
            debug!(kind = message.kind().name(), "Not connected; dropping message");
            return Ok(());
        }

        if let Message::Version { version } = message
            && *version != PROTOCOL_VERSION
        {
            error!(
                expected = PROTOCOL_VERSION,
                received = *version,
                "Protocol version mismatch; disconnecting"
            );
            drop(guard);
            self.disconnect();
            return Err(ClientError::version_mismatch(PROTOCOL_VERSION, *version));
        }

        let state = &mut *guard;
        let events = self.apply(state, message);

        let requests = &self.inner.requests;
        {
            let ClientState {
                store, dispatcher, ..
            } = &mut *state;
            let ctx = PluginContext {
                requests,
                session: store.current(),
            };
            dispatcher.dispatch_message(message, &ctx);
        }
        for event in &events {
            state.dispatch(requests, event);
        }
        if let Message::Chat { car_id, message } = message {
            self.run_command(state, *car_id, message);
        }
        state.flush_requests(requests);
        Ok(())
    }

    fn apply(&self, state: &mut ClientState, message: &Message) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match message {
            Message::Version { version } => {
                info!(version, "Server protocol version accepted");
                events.push(SessionEvent::ProtocolVersion { version: *version });
            }
            Message::SessionInfo(info) => {
                if state.pending_rotation.is_some() {
                    debug!("Session rotation pending; not applying session info");
                } else if state.store.apply_session_info(info, false) {
                    events.push(SessionEvent::SessionInfo(Box::new(
                        state.store.current().clone(),
                    )));
                }
            }
            Message::NewSession(info) => events.extend(self.begin_rotation(state, info)),
            Message::EndSession { report_file } => events.push(SessionEvent::EndSession {
                report_file: report_file.clone(),
            }),
            Message::NewConnection(connection) => {
                let id = state.store.apply_new_connection(connection);
                events.extend(state.driver(id).map(SessionEvent::NewConnection));
            }
            Message::ConnectionClosed(connection) => {
                if let Some(id) = state.store.apply_connection_closed(connection) {
                    events.extend(state.driver(id).map(SessionEvent::ConnectionClosed));
                }
            }
            Message::CarInfo(info) => {
                if let Some(id) = state.store.apply_car_info(info) {
                    events.extend(state.driver(id).map(SessionEvent::CarInfo));
                }
            }
            Message::CarUpdate(update) => {
                let outcome = state.store.apply_car_update(update);
                if outcome.bulk_finished {
                    events.push(SessionEvent::BulkCarUpdateFinished);
                }
                events.extend(state.driver(outcome.connection_id).map(SessionEvent::CarUpdate));
            }
            Message::LapCompleted(lap) => {
                let outcome = state.store.apply_lap_completed(lap);
                if let Some(driver) = state.driver(outcome.connection_id) {
                    events.push(SessionEvent::LapCompleted {
                        driver,
                        lap: outcome.lap,
                    });
                }
            }
            Message::ClientEvent(event) => {
                events.push(SessionEvent::Collision(state.store.apply_client_event(event)));
            }
            Message::ClientLoaded { car_id } => {
                events.push(SessionEvent::ClientLoaded { car_id: *car_id });
            }
            Message::Chat { car_id, message } => events.push(SessionEvent::Chat {
                car_id: *car_id,
                message: message.clone(),
            }),
            Message::Error { message } => {
                if self.inner.config.log_server_errors {
                    warn!(error = %message, "Server reported an error");
                } else {
                    debug!(error = %message, "Server reported an error");
                }
                events.push(SessionEvent::ServerError {
                    message: message.clone(),
                });
            }
            // Request kinds are filtered out before the lock is taken.
            _ => {}
        }
        events
    }

    fn begin_rotation(
        &self,
        state: &mut ClientState,
        info: &SessionInfoMessage,
    ) -> Option<SessionEvent> {
        if !state.store.has_session() {
            state.store.apply_session_info(info, true);
            return Some(SessionEvent::NewSession(Box::new(
                state.store.current().clone(),
            )));
        }

        let delay = self.inner.config.new_session_start_delay();
        if delay.is_zero() {
            return Some(state.rotate(info));
        }

        state.rotation_generation = state.rotation_generation.wrapping_add(1);
        let generation = state.rotation_generation;
        let superseded = state
            .pending_rotation
            .replace(PendingRotation {
                generation,
                message: info.clone(),
            })
            .is_some();
        info!(
            delay_ms = self.inner.config.new_session_start_delay_ms,
            superseded, "Deferring session rotation"
        );

        if let Some(runtime) = &state.runtime {
            let weak = self.downgrade();
            let task = runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = weak.upgrade() {
                    Self::from_inner(inner).complete_rotation(generation);
                }
            });
            state.tasks.retain(|task| !task.is_finished());
            state.tasks.push(task);
        }
        None
    }

    fn complete_rotation(&self, generation: u64) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if !state.connected {
            return;
        }
        let pending = match state.pending_rotation.take() {
            Some(pending) if pending.generation == generation => pending,
            other => {
                state.pending_rotation = other;
                return;
            }
        };
        let event = state.rotate(&pending.message);
        state.dispatch(&self.inner.requests, &event);
        state.flush_requests(&self.inner.requests);
    }

    fn run_command(&self, state: &mut ClientState, car_id: u8, text: &str) {
        let is_admin = state.store.is_admin(car_id);
        let Some(outcome) = state.commands.process(car_id, text, is_admin) else {
            return;
        };
        if outcome.grant_admin {
            state.store.get_or_create_driver(car_id);
            if state.store.mark_admin(car_id) {
                info!(car_id, "Admin rights granted");
            }
        }
        for request in &outcome.requests {
            if let Err(e) = self.inner.requests.send(request) {
                warn!(car_id, error = %e, "Failed to send command reply");
            }
        }
    }

    /// Finalize the running session and stop all background work.
    pub fn disconnect(&self) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if !state.connected {
            return;
        }
        state.connected = false;
        state.pending_rotation = None;
        state.rotation_generation = state.rotation_generation.wrapping_add(1);

        state.finalize_current();
        state.store.reset();
        state.dispatch(&self.inner.requests, &SessionEvent::Disconnected);

        for task in state.tasks.drain(..) {
            task.abort();
        }
        state.relay = None;
        state.runtime = None;
        info!("Disconnected from server plugin interface");
    }
}

