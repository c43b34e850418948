//! Typed protocol messages and the tag registration table.
//!
//! Every datagram starts with a one-byte tag. [`REGISTRY`] maps each tag to
//! the decoder for its layout; [`Message::kind`] and [`encode`] are exhaustive
//! matches, so a new variant cannot be added without also choosing its tag,
//! its decoder, and its encoder.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::wire::{PacketReader, PacketWriter, Vector3};

/// The only protocol version this codec speaks.
pub const PROTOCOL_VERSION: u8 = 4;

/// Session index meaning "the session currently running".
pub const CURRENT_SESSION_INDEX: i16 = -1;

/// Tag bytes, as assigned by the server.
pub mod tags {
    pub const NEW_SESSION: u8 = 50;
    pub const NEW_CONNECTION: u8 = 51;
    pub const CONNECTION_CLOSED: u8 = 52;
    pub const CAR_UPDATE: u8 = 53;
    pub const CAR_INFO: u8 = 54;
    pub const END_SESSION: u8 = 55;
    pub const VERSION: u8 = 56;
    pub const CHAT: u8 = 57;
    pub const CLIENT_LOADED: u8 = 58;
    pub const SESSION_INFO: u8 = 59;
    pub const ERROR: u8 = 60;
    pub const LAP_COMPLETED: u8 = 73;
    pub const CLIENT_EVENT: u8 = 130;

    pub const SET_REALTIME_INTERVAL: u8 = 200;
    pub const GET_CAR_INFO: u8 = 201;
    pub const SEND_CHAT: u8 = 202;
    pub const BROADCAST_CHAT: u8 = 203;
    pub const GET_SESSION_INFO: u8 = 204;
    pub const SET_SESSION: u8 = 205;
    pub const KICK_USER: u8 = 206;
    pub const NEXT_SESSION: u8 = 207;
    pub const RESTART_SESSION: u8 = 208;
    pub const ADMIN_COMMAND: u8 = 209;

    /// Client-event sub-types.
    pub const EVENT_COLLISION_WITH_CAR: u8 = 10;
    pub const EVENT_COLLISION_WITH_ENV: u8 = 11;
}

/// Which side of the link originates a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the server to plugins.
    Inbound,
    /// Sent by plugins to the server.
    Outbound,
}

/// Discriminant of [`Message`], one per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    NewSession,
    NewConnection,
    ConnectionClosed,
    CarUpdate,
    CarInfo,
    EndSession,
    Version,
    Chat,
    ClientLoaded,
    SessionInfo,
    Error,
    LapCompleted,
    ClientEvent,
    SetRealtimeInterval,
    GetCarInfo,
    SendChat,
    BroadcastChat,
    GetSessionInfo,
    SetSession,
    KickUser,
    NextSession,
    RestartSession,
    AdminCommand,
}

impl MessageKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 23] = [
        Self::NewSession,
        Self::NewConnection,
        Self::ConnectionClosed,
        Self::CarUpdate,
        Self::CarInfo,
        Self::EndSession,
        Self::Version,
        Self::Chat,
        Self::ClientLoaded,
        Self::SessionInfo,
        Self::Error,
        Self::LapCompleted,
        Self::ClientEvent,
        Self::SetRealtimeInterval,
        Self::GetCarInfo,
        Self::SendChat,
        Self::BroadcastChat,
        Self::GetSessionInfo,
        Self::SetSession,
        Self::KickUser,
        Self::NextSession,
        Self::RestartSession,
        Self::AdminCommand,
    ];

    /// Wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::NewSession => tags::NEW_SESSION,
            Self::NewConnection => tags::NEW_CONNECTION,
            Self::ConnectionClosed => tags::CONNECTION_CLOSED,
            Self::CarUpdate => tags::CAR_UPDATE,
            Self::CarInfo => tags::CAR_INFO,
            Self::EndSession => tags::END_SESSION,
            Self::Version => tags::VERSION,
            Self::Chat => tags::CHAT,
            Self::ClientLoaded => tags::CLIENT_LOADED,
            Self::SessionInfo => tags::SESSION_INFO,
            Self::Error => tags::ERROR,
            Self::LapCompleted => tags::LAP_COMPLETED,
            Self::ClientEvent => tags::CLIENT_EVENT,
            Self::SetRealtimeInterval => tags::SET_REALTIME_INTERVAL,
            Self::GetCarInfo => tags::GET_CAR_INFO,
            Self::SendChat => tags::SEND_CHAT,
            Self::BroadcastChat => tags::BROADCAST_CHAT,
            Self::GetSessionInfo => tags::GET_SESSION_INFO,
            Self::SetSession => tags::SET_SESSION,
            Self::KickUser => tags::KICK_USER,
            Self::NextSession => tags::NEXT_SESSION,
            Self::RestartSession => tags::RESTART_SESSION,
            Self::AdminCommand => tags::ADMIN_COMMAND,
        }
    }

    /// Stable snake_case name, used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewSession => "new_session",
            Self::NewConnection => "new_connection",
            Self::ConnectionClosed => "connection_closed",
            Self::CarUpdate => "car_update",
            Self::CarInfo => "car_info",
            Self::EndSession => "end_session",
            Self::Version => "version",
            Self::Chat => "chat",
            Self::ClientLoaded => "client_loaded",
            Self::SessionInfo => "session_info",
            Self::Error => "error",
            Self::LapCompleted => "lap_completed",
            Self::ClientEvent => "client_event",
            Self::SetRealtimeInterval => "set_realtime_interval",
            Self::GetCarInfo => "get_car_info",
            Self::SendChat => "send_chat",
            Self::BroadcastChat => "broadcast_chat",
            Self::GetSessionInfo => "get_session_info",
            Self::SetSession => "set_session",
            Self::KickUser => "kick_user",
            Self::NextSession => "next_session",
            Self::RestartSession => "restart_session",
            Self::AdminCommand => "admin_command",
        }
    }

    #[must_use]
    pub const fn direction(self) -> Direction {
        if self.tag() >= tags::SET_REALTIME_INTERVAL {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }

    /// Look up the kind registered for a tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|entry| entry.kind.tag() == tag)
            .map(|entry| entry.kind)
    }
}

/// Session description carried by both session-info and new-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfoMessage {
    pub version: u8,
    pub session_index: u8,
    pub current_session_index: u8,
    pub session_count: u8,
    pub server_name: String,
    pub track: String,
    pub track_config: String,
    pub name: String,
    pub session_type: u8,
    /// Scheduled duration in minutes.
    pub time_minutes: u16,
    pub laps: u16,
    pub wait_time_seconds: u16,
    pub ambient_temp: u8,
    pub road_temp: u8,
    pub weather: String,
    pub elapsed_ms: i32,
}

/// Driver identity carried by new-connection and connection-closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMessage {
    pub driver_name: String,
    pub driver_guid: String,
    pub car_id: u8,
    pub car_model: String,
    pub car_skin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarUpdateMessage {
    pub car_id: u8,
    pub position: Vector3,
    pub velocity: Vector3,
    pub gear: u8,
    pub engine_rpm: u16,
    pub normalized_spline_pos: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarInfoMessage {
    pub car_id: u8,
    pub is_connected: bool,
    pub car_model: String,
    pub car_skin: String,
    pub driver_name: String,
    pub driver_team: String,
    pub driver_guid: String,
}

/// One row of the leaderboard attached to a completed lap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub car_id: u8,
    pub total_time_ms: u32,
    pub laps: u16,
    pub has_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapCompletedMessage {
    pub car_id: u8,
    pub lap_time_ms: u32,
    pub cuts: u8,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub grip_level: f32,
}

/// What a client event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEventKind {
    CollisionWithCar { other_car_id: u8 },
    CollisionWithEnvironment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEventMessage {
    pub kind: ClientEventKind,
    pub car_id: u8,
    pub impact_speed: f32,
    pub world_position: Vector3,
    pub relative_position: Vector3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSessionMessage {
    pub session_index: u8,
    pub name: String,
    pub session_type: u8,
    pub laps: u32,
    pub time_seconds: u32,
    pub wait_time_seconds: u32,
}

/// A decoded plugin protocol datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    NewSession(SessionInfoMessage),
    NewConnection(ConnectionMessage),
    ConnectionClosed(ConnectionMessage),
    CarUpdate(CarUpdateMessage),
    CarInfo(CarInfoMessage),
    EndSession { report_file: String },
    Version { version: u8 },
    Chat { car_id: u8, message: String },
    ClientLoaded { car_id: u8 },
    SessionInfo(SessionInfoMessage),
    Error { message: String },
    LapCompleted(LapCompletedMessage),
    ClientEvent(ClientEventMessage),
    SetRealtimeInterval { interval_ms: u16 },
    GetCarInfo { car_id: u8 },
    SendChat { car_id: u8, message: String },
    BroadcastChat { message: String },
    GetSessionInfo { session_index: i16 },
    SetSession(SetSessionMessage),
    KickUser { car_id: u8 },
    NextSession,
    RestartSession,
    AdminCommand { command: String },
}

impl Message {
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::NewSession(_) => MessageKind::NewSession,
            Self::NewConnection(_) => MessageKind::NewConnection,
            Self::ConnectionClosed(_) => MessageKind::ConnectionClosed,
            Self::CarUpdate(_) => MessageKind::CarUpdate,
            Self::CarInfo(_) => MessageKind::CarInfo,
            Self::EndSession { .. } => MessageKind::EndSession,
            Self::Version { .. } => MessageKind::Version,
            Self::Chat { .. } => MessageKind::Chat,
            Self::ClientLoaded { .. } => MessageKind::ClientLoaded,
            Self::SessionInfo(_) => MessageKind::SessionInfo,
            Self::Error { .. } => MessageKind::Error,
            Self::LapCompleted(_) => MessageKind::LapCompleted,
            Self::ClientEvent(_) => MessageKind::ClientEvent,
            Self::SetRealtimeInterval { .. } => MessageKind::SetRealtimeInterval,
            Self::GetCarInfo { .. } => MessageKind::GetCarInfo,
            Self::SendChat { .. } => MessageKind::SendChat,
            Self::BroadcastChat { .. } => MessageKind::BroadcastChat,
            Self::GetSessionInfo { .. } => MessageKind::GetSessionInfo,
            Self::SetSession(_) => MessageKind::SetSession,
            Self::KickUser { .. } => MessageKind::KickUser,
            Self::NextSession => MessageKind::NextSession,
            Self::RestartSession => MessageKind::RestartSession,
            Self::AdminCommand { .. } => MessageKind::AdminCommand,
        }
    }

    /// Decode a datagram. See [`decode`].
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        decode(data)
    }

    /// Encode into a datagram. See [`encode`].
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }
}

type DecodeFn = fn(&mut PacketReader<'_>) -> CodecResult<Message>;

/// One row of the tag registration table.
pub struct Registration {
    pub kind: MessageKind,
    decode: DecodeFn,
}

/// Decoder for every tag the codec understands.
pub static REGISTRY: &[Registration] = &[
    Registration {
        kind: MessageKind::NewSession,
        decode: |r| Ok(Message::NewSession(read_session_info(r)?)),
    },
    Registration {
        kind: MessageKind::NewConnection,
        decode: |r| Ok(Message::NewConnection(read_connection(r)?)),
    },
    Registration {
        kind: MessageKind::ConnectionClosed,
        decode: |r| Ok(Message::ConnectionClosed(read_connection(r)?)),
    },
    Registration {
        kind: MessageKind::CarUpdate,
        decode: read_car_update,
    },
    Registration {
        kind: MessageKind::CarInfo,
        decode: read_car_info,
    },
    Registration {
        kind: MessageKind::EndSession,
        decode: |r| {
            Ok(Message::EndSession {
                report_file: r.read_wide_string()?,
            })
        },
    },
    Registration {
        kind: MessageKind::Version,
        decode: |r| {
            Ok(Message::Version {
                version: r.read_u8()?,
            })
        },
    },
    Registration {
        kind: MessageKind::Chat,
        decode: |r| {
            Ok(Message::Chat {
                car_id: r.read_u8()?,
                message: r.read_wide_string()?,
            })
        },
    },
    Registration {
        kind: MessageKind::ClientLoaded,
        decode: |r| Ok(Message::ClientLoaded { car_id: r.read_u8()? }),
    },
    Registration {
        kind: MessageKind::SessionInfo,
        decode: |r| Ok(Message::SessionInfo(read_session_info(r)?)),
    },
    Registration {
        kind: MessageKind::Error,
        decode: |r| {
            Ok(Message::Error {
                message: r.read_wide_string()?,
            })
        },
    },
    Registration {
        kind: MessageKind::LapCompleted,
        decode: read_lap_completed,
    },
    Registration {
        kind: MessageKind::ClientEvent,
        decode: read_client_event,
    },
    Registration {
        kind: MessageKind::SetRealtimeInterval,
        decode: |r| {
            Ok(Message::SetRealtimeInterval {
                interval_ms: r.read_u16()?,
            })
        },
    },
    Registration {
        kind: MessageKind::GetCarInfo,
        decode: |r| Ok(Message::GetCarInfo { car_id: r.read_u8()? }),
    },
    Registration {
        kind: MessageKind::SendChat,
        decode: |r| {
            Ok(Message::SendChat {
                car_id: r.read_u8()?,
                message: r.read_wide_string()?,
            })
        },
    },
    Registration {
        kind: MessageKind::BroadcastChat,
        decode: |r| {
            Ok(Message::BroadcastChat {
                message: r.read_wide_string()?,
            })
        },
    },
    Registration {
        kind: MessageKind::GetSessionInfo,
        decode: |r| {
            Ok(Message::GetSessionInfo {
                session_index: r.read_i16()?,
            })
        },
    },
    Registration {
        kind: MessageKind::SetSession,
        decode: |r| {
            Ok(Message::SetSession(SetSessionMessage {
                session_index: r.read_u8()?,
                name: r.read_wide_string()?,
                session_type: r.read_u8()?,
                laps: r.read_u32()?,
                time_seconds: r.read_u32()?,
                wait_time_seconds: r.read_u32()?,
            }))
        },
    },
    Registration {
        kind: MessageKind::KickUser,
        decode: |r| Ok(Message::KickUser { car_id: r.read_u8()? }),
    },
    Registration {
        kind: MessageKind::NextSession,
        decode: |_| Ok(Message::NextSession),
    },
    Registration {
        kind: MessageKind::RestartSession,
        decode: |_| Ok(Message::RestartSession),
    },
    Registration {
        kind: MessageKind::AdminCommand,
        decode: |r| {
            Ok(Message::AdminCommand {
                command: r.read_wide_string()?,
            })
        },
    },
];

/// Decode one datagram into a [`Message`].
///
/// # Errors
///
/// Returns an error for an empty datagram, an unregistered tag, a datagram
/// shorter than its layout, or bytes left over after the layout is read.
pub fn decode(data: &[u8]) -> CodecResult<Message> {
    let mut reader = PacketReader::new(data);
    let tag = reader.read_u8().map_err(|_| CodecError::Empty)?;
    let registration = REGISTRY
        .iter()
        .find(|entry| entry.kind.tag() == tag)
        .ok_or(CodecError::UnknownTag(tag))?;

    let message = (registration.decode)(&mut reader)?;
    reader.finish(registration.kind.name())?;
    Ok(message)
}

/// Encode a [`Message`] into one datagram.
///
/// # Errors
///
/// Returns an error when a string does not fit its u8 length prefix.
pub fn encode(message: &Message) -> CodecResult<Vec<u8>> {
    let mut w = PacketWriter::with_tag(message.kind().tag());
    match message {
        Message::NewSession(info) | Message::SessionInfo(info) => write_session_info(&mut w, info)?,
        Message::NewConnection(conn) | Message::ConnectionClosed(conn) => {
            w.write_wide_string(&conn.driver_name)?;
            w.write_wide_string(&conn.driver_guid)?;
            w.write_u8(conn.car_id);
            w.write_string(&conn.car_model)?;
            w.write_string(&conn.car_skin)?;
        }
        Message::CarUpdate(update) => {
            w.write_u8(update.car_id);
            w.write_vector3(&update.position);
            w.write_vector3(&update.velocity);
            w.write_u8(update.gear);
            w.write_u16(update.engine_rpm);
            w.write_f32(update.normalized_spline_pos);
        }
        Message::CarInfo(info) => {
            w.write_u8(info.car_id);
            w.write_bool(info.is_connected);
            w.write_wide_string(&info.car_model)?;
            w.write_wide_string(&info.car_skin)?;
            w.write_wide_string(&info.driver_name)?;
            w.write_wide_string(&info.driver_team)?;
            w.write_wide_string(&info.driver_guid)?;
        }
        Message::EndSession { report_file } => w.write_wide_string(report_file)?,
        Message::Version { version } => w.write_u8(*version),
        Message::Chat { car_id, message } | Message::SendChat { car_id, message } => {
            w.write_u8(*car_id);
            w.write_wide_string(message)?;
        }
        Message::ClientLoaded { car_id }
        | Message::GetCarInfo { car_id }
        | Message::KickUser { car_id } => w.write_u8(*car_id),
        Message::Error { message } | Message::BroadcastChat { message } => {
            w.write_wide_string(message)?;
        }
        Message::LapCompleted(lap) => {
            w.write_u8(lap.car_id);
            w.write_u32(lap.lap_time_ms);
            w.write_u8(lap.cuts);
            let count = u8::try_from(lap.leaderboard.len()).map_err(|_| {
                CodecError::TooManyEntries {
                    len: lap.leaderboard.len(),
                    max: usize::from(u8::MAX),
                }
            })?;
            w.write_u8(count);
            for entry in &lap.leaderboard {
                w.write_u8(entry.car_id);
                w.write_u32(entry.total_time_ms);
                w.write_u16(entry.laps);
                w.write_bool(entry.has_completed);
            }
            w.write_f32(lap.grip_level);
        }
        Message::ClientEvent(event) => {
            match event.kind {
                ClientEventKind::CollisionWithCar { other_car_id } => {
                    w.write_u8(tags::EVENT_COLLISION_WITH_CAR);
                    w.write_u8(event.car_id);
                    w.write_u8(other_car_id);
                }
                ClientEventKind::CollisionWithEnvironment => {
                    w.write_u8(tags::EVENT_COLLISION_WITH_ENV);
                    w.write_u8(event.car_id);
                }
            }
            w.write_f32(event.impact_speed);
            w.write_vector3(&event.world_position);
            w.write_vector3(&event.relative_position);
        }
        Message::SetRealtimeInterval { interval_ms } => w.write_u16(*interval_ms),
        Message::GetSessionInfo { session_index } => w.write_i16(*session_index),
        Message::SetSession(set) => {
            w.write_u8(set.session_index);
            w.write_wide_string(&set.name)?;
            w.write_u8(set.session_type);
            w.write_u32(set.laps);
            w.write_u32(set.time_seconds);
            w.write_u32(set.wait_time_seconds);
        }
        Message::NextSession | Message::RestartSession => {}
        Message::AdminCommand { command } => w.write_wide_string(command)?,
    }
    Ok(w.into_bytes())
}

fn read_session_info(r: &mut PacketReader<'_>) -> CodecResult<SessionInfoMessage> {
    Ok(SessionInfoMessage {
        version: r.read_u8()?,
        session_index: r.read_u8()?,
        current_session_index: r.read_u8()?,
        session_count: r.read_u8()?,
        server_name: r.read_wide_string()?,
        track: r.read_string()?,
        track_config: r.read_string()?,
        name: r.read_string()?,
        session_type: r.read_u8()?,
        time_minutes: r.read_u16()?,
        laps: r.read_u16()?,
        wait_time_seconds: r.read_u16()?,
        ambient_temp: r.read_u8()?,
        road_temp: r.read_u8()?,
        weather: r.read_string()?,
        elapsed_ms: r.read_i32()?,
    })
}

fn write_session_info(w: &mut PacketWriter, info: &SessionInfoMessage) -> CodecResult<()> {
    w.write_u8(info.version);
    w.write_u8(info.session_index);
    w.write_u8(info.current_session_index);
    w.write_u8(info.session_count);
    w.write_wide_string(&info.server_name)?;
    w.write_string(&info.track)?;
    w.write_string(&info.track_config)?;
    w.write_string(&info.name)?;
    w.write_u8(info.session_type);
    w.write_u16(info.time_minutes);
    w.write_u16(info.laps);
    w.write_u16(info.wait_time_seconds);
    w.write_u8(info.ambient_temp);
    w.write_u8(info.road_temp);
    w.write_string(&info.weather)?;
    w.write_i32(info.elapsed_ms);
    Ok(())
}

fn read_connection(r: &mut PacketReader<'_>) -> CodecResult<ConnectionMessage> {
    Ok(ConnectionMessage {
        driver_name: r.read_wide_string()?,
        driver_guid: r.read_wide_string()?,
        car_id: r.read_u8()?,
        car_model: r.read_string()?,
        car_skin: r.read_string()?,
    })
}

fn read_car_update(r: &mut PacketReader<'_>) -> CodecResult<Message> {
    Ok(Message::CarUpdate(CarUpdateMessage {
        car_id: r.read_u8()?,
        position: r.read_vector3()?,
        velocity: r.read_vector3()?,
        gear: r.read_u8()?,
        engine_rpm: r.read_u16()?,
        normalized_spline_pos: r.read_f32()?,
    }))
}

fn read_car_info(r: &mut PacketReader<'_>) -> CodecResult<Message> {
    Ok(Message::CarInfo(CarInfoMessage {
        car_id: r.read_u8()?,
        is_connected: r.read_bool()?,
        car_model: r.read_wide_string()?,
        car_skin: r.read_wide_string()?,
        driver_name: r.read_wide_string()?,
        driver_team: r.read_wide_string()?,
        driver_guid: r.read_wide_string()?,
    }))
}

fn read_lap_completed(r: &mut PacketReader<'_>) -> CodecResult<Message> {
    let car_id = r.read_u8()?;
    let lap_time_ms = r.read_u32()?;
    let cuts = r.read_u8()?;
    let count = usize::from(r.read_u8()?);
    let mut leaderboard = Vec::with_capacity(count);
    for _ in 0..count {
        leaderboard.push(LeaderboardEntry {
            car_id: r.read_u8()?,
            total_time_ms: r.read_u32()?,
            laps: r.read_u16()?,
            has_completed: r.read_bool()?,
        });
    }
    let grip_level = r.read_f32()?;

    Ok(Message::LapCompleted(LapCompletedMessage {
        car_id,
        lap_time_ms,
        cuts,
        leaderboard,
        grip_level,
    }))
}

fn read_client_event(r: &mut PacketReader<'_>) -> CodecResult<Message> {
    let event_type = r.read_u8()?;
    let car_id = r.read_u8()?;
    let kind = match event_type {
        tags::EVENT_COLLISION_WITH_CAR => ClientEventKind::CollisionWithCar {
            other_car_id: r.read_u8()?,
        },
        tags::EVENT_COLLISION_WITH_ENV => ClientEventKind::CollisionWithEnvironment,
        other => return Err(CodecError::UnknownClientEvent(other)),
    };

    Ok(Message::ClientEvent(ClientEventMessage {
        kind,
        car_id,
        impact_speed: r.read_f32()?,
        world_position: r.read_vector3()?,
        relative_position: r.read_vector3()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_every_kind_registered_once() {
        for kind in MessageKind::ALL {
            let count = REGISTRY.iter().filter(|entry| entry.kind == kind).count();
            assert_eq!(count, 1, "{} registered {count} times", kind.name());
        }
        assert_eq!(REGISTRY.len(), MessageKind::ALL.len());
    }

    #[test]
    fn test_tags_unique() {
        let tags: HashSet<u8> = MessageKind::ALL.iter().map(|kind| kind.tag()).collect();
        assert_eq!(tags.len(), MessageKind::ALL.len());
    }

    #[test]
    fn test_from_tag_matches_kind() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(MessageKind::from_tag(0), None);
    }

    #[test]
    fn test_direction_split() {
        assert_eq!(MessageKind::CarUpdate.direction(), Direction::Inbound);
        assert_eq!(MessageKind::ClientEvent.direction(), Direction::Inbound);
        assert_eq!(MessageKind::GetCarInfo.direction(), Direction::Outbound);
        assert_eq!(MessageKind::AdminCommand.direction(), Direction::Outbound);
    }

    #[test]
    fn test_get_car_info_layout() -> TestResult {
        let bytes = encode(&Message::GetCarInfo { car_id: 7 })?;
        assert_eq!(bytes, vec![tags::GET_CAR_INFO, 7]);
        Ok(())
    }

    #[test]
    fn test_get_session_info_current_layout() -> TestResult {
        let bytes = encode(&Message::GetSessionInfo {
            session_index: CURRENT_SESSION_INDEX,
        })?;
        assert_eq!(bytes, vec![tags::GET_SESSION_INFO, 0xFF, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_payloadless_kinds() -> TestResult {
        assert_eq!(encode(&Message::NextSession)?, vec![tags::NEXT_SESSION]);
        assert_eq!(decode(&[tags::RESTART_SESSION])?, Message::RestartSession);
        Ok(())
    }

    #[test]
    fn test_environment_collision_has_no_other_car() -> TestResult {
        let message = Message::ClientEvent(ClientEventMessage {
            kind: ClientEventKind::CollisionWithEnvironment,
            car_id: 3,
            impact_speed: 42.5,
            world_position: Vector3::new(1.0, 2.0, 3.0),
            relative_position: Vector3::new(0.5, 0.0, -0.5),
        });
        let bytes = encode(&message)?;
        // tag + type + car + f32 + 2 * vec3
        assert_eq!(bytes.len(), 1 + 1 + 1 + 4 + 24);
        assert_eq!(decode(&bytes)?, message);
        Ok(())
    }

    #[test]
    fn test_unknown_client_event_rejected() {
        let mut bytes = vec![tags::CLIENT_EVENT, 99, 1];
        bytes.extend_from_slice(&[0u8; 28]);
        assert_eq!(decode(&bytes), Err(CodecError::UnknownClientEvent(99)));
    }
}
