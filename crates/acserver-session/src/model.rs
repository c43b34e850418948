//! Session, driver, lap and incident records.

use chrono::{DateTime, Utc};
use openracing_acserver_protocol::Vector3;
use serde::{Deserialize, Serialize};

/// Kind of session as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Booking,
    #[default]
    Practice,
    Qualifying,
    Race,
    /// A code this client does not know; kept so it can be reported back.
    Other(u8),
}

impl SessionType {
    #[must_use]
    pub fn is_race(self) -> bool {
        self == Self::Race
    }
}

impl From<u8> for SessionType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Booking,
            1 => Self::Practice,
            2 => Self::Qualifying,
            3 => Self::Race,
            other => Self::Other(other),
        }
    }
}

impl From<SessionType> for u8 {
    fn from(session_type: SessionType) -> Self {
        match session_type {
            SessionType::Booking => 0,
            SessionType::Practice => 1,
            SessionType::Qualifying => 2,
            SessionType::Race => 3,
            SessionType::Other(code) => code,
        }
    }
}

/// One driver's record within a session.
///
/// `connection_id` equals the driver's index in [`SessionInfo::drivers`] and is
/// never renumbered while the session is current.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverInfo {
    pub connection_id: usize,
    pub car_id: u8,
    pub driver_guid: String,
    pub driver_name: String,
    pub driver_team: String,
    pub car_model: String,
    pub car_skin: String,
    /// `None` when the driver was already on the server before the client
    /// saw the session start.
    pub connected_timestamp: Option<DateTime<Utc>>,
    pub disconnected_timestamp: Option<DateTime<Utc>>,
    pub ballast_kg: u16,
    pub is_admin: bool,

    pub position: u16,
    pub best_lap_ms: u32,
    pub total_time_ms: u32,
    pub lap_count: u16,
    pub incidents: u32,
    pub gap: String,
    pub start_position: u16,

    pub current_speed_kmh: f32,
    pub gear: u8,
    pub engine_rpm: u16,
    pub start_spline_pos: Option<f32>,
    pub end_spline_pos: f32,
    pub last_position: Option<Vector3>,
    /// Distance covered since the last completed lap, in metres.
    pub distance_this_lap: f32,
    pub current_distance_to_closest_car: f32,
}

impl DriverInfo {
    #[must_use]
    pub fn new(connection_id: usize, car_id: u8) -> Self {
        Self {
            connection_id,
            car_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.disconnected_timestamp.is_none()
    }

    /// Copy of this driver for the next session: identity kept, counters reset.
    #[must_use]
    pub fn carried_over(&self, connection_id: usize) -> Self {
        Self {
            connection_id,
            car_id: self.car_id,
            driver_guid: self.driver_guid.clone(),
            driver_name: self.driver_name.clone(),
            driver_team: self.driver_team.clone(),
            car_model: self.car_model.clone(),
            car_skin: self.car_skin.clone(),
            connected_timestamp: self.connected_timestamp,
            disconnected_timestamp: None,
            ballast_kg: self.ballast_kg,
            is_admin: self.is_admin,
            ..Self::default()
        }
    }
}

/// A completed lap. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapInfo {
    pub connection_id: usize,
    pub timestamp: DateTime<Utc>,
    pub lap_time_ms: u32,
    /// Distance driven during the lap, in metres.
    pub lap_length: f32,
    pub lap_no: u16,
    pub position: u16,
    pub cuts: u8,
    pub grip_level: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    CollisionWithCar,
    CollisionWithEnvironment,
}

/// A collision reported by the server. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentInfo {
    pub kind: IncidentKind,
    pub timestamp: DateTime<Utc>,
    pub connection_id: usize,
    /// The other car involved; `None` for single-car incidents.
    pub other_connection_id: Option<usize>,
    pub impact_speed: f32,
    pub world_position: Vector3,
    pub relative_position: Vector3,
}

/// Everything known about one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub server_name: String,
    pub track_name: String,
    pub track_config: String,
    pub session_name: String,
    pub session_type: SessionType,
    pub session_index: u8,
    pub session_count: u8,
    pub session_duration_minutes: u16,
    pub lap_count: u16,
    pub wait_time_seconds: u16,
    /// Session start.
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: i32,
    pub ambient_temp: u8,
    pub road_temp: u8,
    pub weather: String,
    pub realtime_update_interval_ms: u16,
    pub max_clients: u8,
    pub drivers: Vec<DriverInfo>,
    pub laps: Vec<LapInfo>,
    pub incidents: Vec<IncidentInfo>,
    pub missed_session_start: bool,
}

impl SessionInfo {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, realtime_update_interval_ms: u16, max_clients: u8) -> Self {
        Self {
            server_name: String::new(),
            track_name: String::new(),
            track_config: String::new(),
            session_name: String::new(),
            session_type: SessionType::default(),
            session_index: 0,
            session_count: 0,
            session_duration_minutes: 0,
            lap_count: 0,
            wait_time_seconds: 0,
            timestamp,
            elapsed_ms: 0,
            ambient_temp: 0,
            road_temp: 0,
            weather: String::new(),
            realtime_update_interval_ms,
            max_clients,
            drivers: Vec::new(),
            laps: Vec::new(),
            incidents: Vec::new(),
            missed_session_start: false,
        }
    }

    #[must_use]
    pub fn driver(&self, connection_id: usize) -> Option<&DriverInfo> {
        self.drivers.get(connection_id)
    }

    /// Laps recorded for one driver, in completion order.
    pub fn laps_for(&self, connection_id: usize) -> impl Iterator<Item = &LapInfo> {
        self.laps
            .iter()
            .filter(move |lap| lap.connection_id == connection_id)
    }

    /// Drivers ordered by finishing position; unranked drivers last.
    #[must_use]
    pub fn standings(&self) -> Vec<&DriverInfo> {
        let mut ordered: Vec<&DriverInfo> = self.drivers.iter().collect();
        ordered.sort_by_key(|driver| match driver.position {
            0 => u16::MAX,
            position => position,
        });
        ordered
    }
}

/// A finalized session handed to report sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: SessionInfo,
    pub finalized_at: DateTime<Utc>,
}
