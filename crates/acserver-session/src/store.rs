//! Session and driver state store.
//!
//! Owns the current and previous [`SessionInfo`] plus the car-slot map. Every
//! operation applies one decoded server message; requests the store wants sent
//! back to the server are queued and drained with [`SessionStore::take_requests`].

use std::collections::HashMap;
use std::sync::Arc;

use openracing_acserver_protocol::{
    CarInfoMessage, CarUpdateMessage, ClientEventKind, ClientEventMessage, ConnectionMessage,
    LapCompletedMessage, Message, SessionInfoMessage,
};
use tracing::{debug, info, warn};

use crate::aggregator::{RealtimeAggregator, update_proximity};
use crate::clock::Clock;
use crate::finalizer::finalize_session;
use crate::model::{
    DriverInfo, IncidentInfo, IncidentKind, LapInfo, SessionInfo, SessionReport, SessionType,
};

/// Conversion factor from m/s to km/h.
const MPS_TO_KMH: f32 = 3.6;

/// Settings the store needs from the client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of car slots to query when the first session info arrives.
    pub capacity: u8,
    pub realtime_update_interval_ms: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 24,
            realtime_update_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NoSession,
    Active,
}

/// Result of applying one car update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarUpdateOutcome {
    pub connection_id: usize,
    /// The update opened a new burst; the previous one is complete and
    /// proximity metrics have been refreshed.
    pub bulk_finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LapOutcome {
    pub connection_id: usize,
    pub lap: LapInfo,
}

pub struct SessionStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    phase: Phase,
    current: SessionInfo,
    previous: Option<SessionInfo>,
    car_map: HashMap<u8, usize>,
    aggregator: RealtimeAggregator,
    requests: Vec<Message>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("drivers", &self.current.drivers.len())
            .field("mapped_cars", &self.car_map.len())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let current = SessionInfo::new(
            clock.now(),
            config.realtime_update_interval_ms,
            config.capacity,
        );
        Self {
            config,
            clock,
            phase: Phase::NoSession,
            current,
            previous: None,
            car_map: HashMap::new(),
            aggregator: RealtimeAggregator::new(),
            requests: Vec::new(),
        }
    }

    fn fresh_session(&self) -> SessionInfo {
        SessionInfo::new(
            self.clock.now(),
            self.config.realtime_update_interval_ms,
            self.config.capacity,
        )
    }

    /// Whether any session info has been applied since construction or reset.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.phase == Phase::Active
    }

    #[must_use]
    pub fn current(&self) -> &SessionInfo {
        &self.current
    }

    #[must_use]
    pub fn previous(&self) -> Option<&SessionInfo> {
        self.previous.as_ref()
    }

    #[must_use]
    pub fn driver_for_car(&self, car_id: u8) -> Option<&DriverInfo> {
        self.car_map
            .get(&car_id)
            .and_then(|&index| self.current.drivers.get(index))
    }

    #[must_use]
    pub fn connection_for_car(&self, car_id: u8) -> Option<usize> {
        self.car_map.get(&car_id).copied()
    }

    #[must_use]
    pub fn connected_drivers(&self) -> usize {
        self.current
            .drivers
            .iter()
            .filter(|driver| driver.is_connected())
            .count()
    }

    /// Drain the requests queued for the server, in the order they were made.
    pub fn take_requests(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.requests)
    }

    /// Apply a session-info or new-session message.
    ///
    /// Returns `false` when the message describes a session other than the
    /// running one and was therefore not applied.
    pub fn apply_session_info(&mut self, msg: &SessionInfoMessage, is_new: bool) -> bool {
        if !is_new && msg.session_index != msg.current_session_index {
            debug!(
                session_index = msg.session_index,
                current = msg.current_session_index,
                "Ignoring info for a non-current session"
            );
            return false;
        }

        let now = self.clock.now();
        let session = &mut self.current;
        session.server_name.clone_from(&msg.server_name);
        session.track_name.clone_from(&msg.track);
        session.track_config.clone_from(&msg.track_config);
        session.session_name.clone_from(&msg.name);
        session.session_type = SessionType::from(msg.session_type);
        session.session_index = msg.session_index;
        session.session_count = msg.session_count;
        session.session_duration_minutes = msg.time_minutes;
        session.lap_count = msg.laps;
        session.wait_time_seconds = msg.wait_time_seconds;
        session.ambient_temp = msg.ambient_temp;
        session.road_temp = msg.road_temp;
        session.weather.clone_from(&msg.weather);
        session.elapsed_ms = msg.elapsed_ms;
        if is_new {
            session.timestamp = now;
        }

        if self.phase == Phase::NoSession {
            self.phase = Phase::Active;
            self.current.missed_session_start = !is_new;
            info!(
                track = %self.current.track_name,
                session = %self.current.session_name,
                missed_start = self.current.missed_session_start,
                "First session info received"
            );
            self.requests.push(Message::SetRealtimeInterval {
                interval_ms: self.config.realtime_update_interval_ms,
            });
            for car_id in 0..self.config.capacity {
                self.requests.push(Message::GetCarInfo { car_id });
            }
        }
        true
    }

    /// Register a newly connected driver and return its connection id.
    pub fn apply_new_connection(&mut self, msg: &ConnectionMessage) -> usize {
        let now = self.clock.now();
        if let Some(stale) = self.car_map.get(&msg.car_id).copied() {
            warn!(
                car_id = msg.car_id,
                stale_connection = stale,
                "Car slot already mapped on new connection; replacing"
            );
            if let Some(driver) = self.current.drivers.get_mut(stale) {
                driver.disconnected_timestamp.get_or_insert(now);
            }
        }

        let connection_id = self.current.drivers.len();
        let mut driver = DriverInfo::new(connection_id, msg.car_id);
        driver.driver_name.clone_from(&msg.driver_name);
        driver.driver_guid.clone_from(&msg.driver_guid);
        driver.car_model.clone_from(&msg.car_model);
        driver.car_skin.clone_from(&msg.car_skin);
        driver.connected_timestamp = Some(now);
        self.current.drivers.push(driver);
        self.car_map.insert(msg.car_id, connection_id);
        self.requests.push(Message::GetCarInfo { car_id: msg.car_id });

        debug!(car_id = msg.car_id, connection_id, name = %msg.driver_name, "Driver connected");
        connection_id
    }

    /// Mark a driver disconnected. Returns its connection id when the slot
    /// matched the departing driver.
    pub fn apply_connection_closed(&mut self, msg: &ConnectionMessage) -> Option<usize> {
        let Some(connection_id) = self.car_map.get(&msg.car_id).copied() else {
            warn!(car_id = msg.car_id, "Connection closed for an unmapped car slot");
            return None;
        };
        let now = self.clock.now();
        let Some(driver) = self.current.drivers.get_mut(connection_id) else {
            warn!(car_id = msg.car_id, connection_id, "Car slot points past the driver list");
            self.car_map.remove(&msg.car_id);
            return None;
        };
        if !driver.driver_guid.is_empty() && driver.driver_guid != msg.driver_guid {
            warn!(
                car_id = msg.car_id,
                expected = %driver.driver_guid,
                received = %msg.driver_guid,
                "Driver GUID mismatch on connection closed"
            );
            return None;
        }
        driver.disconnected_timestamp = Some(now);
        self.car_map.remove(&msg.car_id);
        debug!(car_id = msg.car_id, connection_id, "Driver disconnected");
        Some(connection_id)
    }

    /// Overwrite a driver's descriptive fields. Car info for empty slots is
    /// ignored.
    pub fn apply_car_info(&mut self, msg: &CarInfoMessage) -> Option<usize> {
        if !msg.is_connected {
            return None;
        }
        let connection_id = self.driver_index(msg.car_id, false);
        let driver = self.current.drivers.get_mut(connection_id)?;
        driver.car_model.clone_from(&msg.car_model);
        driver.car_skin.clone_from(&msg.car_skin);
        driver.driver_name.clone_from(&msg.driver_name);
        driver.driver_team.clone_from(&msg.driver_team);
        driver.driver_guid.clone_from(&msg.driver_guid);
        Some(connection_id)
    }

    /// Look up the driver in `car_id`, creating a placeholder when the server
    /// never announced the connection. Placeholders trigger a car-info request.
    pub fn get_or_create_driver(&mut self, car_id: u8) -> usize {
        self.driver_index(car_id, true)
    }

    fn driver_index(&mut self, car_id: u8, request_info: bool) -> usize {
        if let Some(&index) = self.car_map.get(&car_id) {
            return index;
        }
        let connection_id = self.current.drivers.len();
        let mut driver = DriverInfo::new(connection_id, car_id);
        driver.connected_timestamp = if self.current.missed_session_start {
            None
        } else {
            Some(self.clock.now())
        };
        self.current.drivers.push(driver);
        self.car_map.insert(car_id, connection_id);
        if request_info {
            self.requests.push(Message::GetCarInfo { car_id });
        }
        debug!(car_id, connection_id, "Created driver for unannounced car");
        connection_id
    }

    pub fn apply_car_update(&mut self, msg: &CarUpdateMessage) -> CarUpdateOutcome {
        let now = self.clock.now();
        let boundary = self.aggregator.observe(msg.car_id, self.connected_drivers());
        let bulk_finished =
            boundary && !RealtimeAggregator::in_grace_period(self.current.timestamp, now);
        if bulk_finished {
            update_proximity(&mut self.current.drivers);
        }

        let connection_id = self.get_or_create_driver(msg.car_id);
        if let Some(driver) = self.current.drivers.get_mut(connection_id) {
            driver.current_speed_kmh = msg.velocity.length() * MPS_TO_KMH;
            driver.gear = msg.gear;
            driver.engine_rpm = msg.engine_rpm;
            driver
                .start_spline_pos
                .get_or_insert(msg.normalized_spline_pos);
            driver.end_spline_pos = msg.normalized_spline_pos;
            if let Some(last) = driver.last_position {
                driver.distance_this_lap += last.distance_to(&msg.position);
            }
            driver.last_position = Some(msg.position);
        }

        CarUpdateOutcome {
            connection_id,
            bulk_finished,
        }
    }

    pub fn apply_lap_completed(&mut self, msg: &LapCompletedMessage) -> LapOutcome {
        let now = self.clock.now();
        let connection_id = self.get_or_create_driver(msg.car_id);

        for (position, entry) in (1u16..).zip(msg.leaderboard.iter()) {
            if let Some(driver) = self
                .car_map
                .get(&entry.car_id)
                .and_then(|&index| self.current.drivers.get_mut(index))
            {
                driver.position = position;
            }
        }

        let standing = (1u16..)
            .zip(msg.leaderboard.iter())
            .find(|(_, entry)| entry.car_id == msg.car_id);
        let recorded = self.current.laps_for(connection_id).count();
        let lap_no = match standing {
            Some((_, entry)) => entry.laps,
            None => u16::try_from(recorded).unwrap_or(u16::MAX).saturating_add(1),
        };
        let position = standing.map_or(0, |(position, _)| position);

        let lap_length = self
            .current
            .drivers
            .get_mut(connection_id)
            .map_or(0.0, |driver| std::mem::take(&mut driver.distance_this_lap));

        let lap = LapInfo {
            connection_id,
            timestamp: now,
            lap_time_ms: msg.lap_time_ms,
            lap_length,
            lap_no,
            position,
            cuts: msg.cuts,
            grip_level: msg.grip_level,
        };
        self.current.laps.push(lap.clone());
        debug!(car_id = msg.car_id, lap_no, lap_time_ms = msg.lap_time_ms, "Lap completed");

        LapOutcome { connection_id, lap }
    }

    pub fn apply_client_event(&mut self, msg: &ClientEventMessage) -> IncidentInfo {
        let now = self.clock.now();
        let connection_id = self.get_or_create_driver(msg.car_id);
        let (kind, other_connection_id) = match msg.kind {
            ClientEventKind::CollisionWithCar { other_car_id } => (
                IncidentKind::CollisionWithCar,
                Some(self.get_or_create_driver(other_car_id)),
            ),
            ClientEventKind::CollisionWithEnvironment => {
                (IncidentKind::CollisionWithEnvironment, None)
            }
        };

        for index in std::iter::once(connection_id).chain(other_connection_id) {
            if let Some(driver) = self.current.drivers.get_mut(index) {
                driver.incidents = driver.incidents.saturating_add(1);
            }
        }

        let incident = IncidentInfo {
            kind,
            timestamp: now,
            connection_id,
            other_connection_id,
            impact_speed: msg.impact_speed,
            world_position: msg.world_position,
            relative_position: msg.relative_position,
        };
        self.current.incidents.push(incident.clone());
        incident
    }

    /// Grant admin rights to the driver in `car_id`.
    pub fn mark_admin(&mut self, car_id: u8) -> bool {
        let Some(driver) = self
            .car_map
            .get(&car_id)
            .and_then(|&index| self.current.drivers.get_mut(index))
        else {
            return false;
        };
        driver.is_admin = true;
        true
    }

    #[must_use]
    pub fn is_admin(&self, car_id: u8) -> bool {
        self.driver_for_car(car_id)
            .is_some_and(|driver| driver.is_admin)
    }

    /// Finalize the current session and start a fresh one.
    ///
    /// Returns `None` for a session without drivers; such a session does not
    /// displace the previous one. Connected drivers are carried into the new
    /// session with new connection ids.
    pub fn finalize_and_rotate(&mut self) -> Option<SessionReport> {
        let now = self.clock.now();
        let fresh = self.fresh_session();
        let mut finished = std::mem::replace(&mut self.current, fresh);
        self.car_map.clear();
        self.aggregator.reset();

        if finished.drivers.is_empty() {
            debug!("Rotating a session without drivers; no report");
            return None;
        }

        finalize_session(&mut finished);

        for driver in finished.drivers.iter().filter(|d| d.is_connected()) {
            let connection_id = self.current.drivers.len();
            self.current.drivers.push(driver.carried_over(connection_id));
            self.car_map.insert(driver.car_id, connection_id);
        }

        info!(
            session = %finished.session_name,
            drivers = finished.drivers.len(),
            laps = finished.laps.len(),
            carried_over = self.current.drivers.len(),
            "Session finalized"
        );

        let report = SessionReport {
            session: finished.clone(),
            finalized_at: now,
        };
        self.previous = Some(finished);
        Some(report)
    }

    /// Forget the current session entirely, keeping the previous one.
    pub fn reset(&mut self) {
        self.current = self.fresh_session();
        self.phase = Phase::NoSession;
        self.car_map.clear();
        self.aggregator.reset();
        self.requests.clear();
    }
}
