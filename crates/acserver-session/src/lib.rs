//! Session and driver state for an Assetto Corsa dedicated server connection.
//!
//! [`SessionStore`] is an explicitly owned state object: it applies decoded
//! server messages to the current session, reconstructs standings when the
//! session ends, and tracks real-time update bursts. It performs no I/O;
//! requests for the server are queued and drained by the caller.

#![deny(static_mut_refs)]

pub mod aggregator;
pub mod clock;
pub mod finalizer;
pub mod model;
pub mod store;

pub use aggregator::{GRID_GRACE_PERIOD, MIN_PROXIMITY_SPEED_KMH, RealtimeAggregator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use finalizer::{finalize_session, format_gap};
pub use model::{
    DriverInfo, IncidentInfo, IncidentKind, LapInfo, SessionInfo, SessionReport, SessionType,
};
pub use store::{CarUpdateOutcome, LapOutcome, SessionStore, StoreConfig};
