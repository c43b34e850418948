//! Property-based tests for the plugin protocol codec.
//!
//! Arbitrary input must never panic, and generated messages must survive
//! an encode/decode cycle unchanged.

use openracing_acserver_protocol::{
    CarUpdateMessage, ConnectionMessage, LapCompletedMessage, LeaderboardEntry, Message,
    MessageKind, Vector3, decode, encode,
};
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn vector() -> impl Strategy<Value = Vector3> {
    (finite(), finite(), finite()).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn wide_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<char>(), 0..=255).prop_map(|chars| chars.into_iter().collect())
}

fn narrow_text() -> impl Strategy<Value = String> {
    "[ -~]{0,255}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary random bytes of any length must never cause a panic.
    #[test]
    fn prop_random_bytes_no_panic(
        data in proptest::collection::vec(any::<u8>(), 0..512)
    ) {
        let _ = decode(&data);
    }

    /// Every registered tag followed by random bytes must never panic.
    #[test]
    fn prop_registered_tag_random_body_no_panic(
        index in 0..MessageKind::ALL.len(),
        body in proptest::collection::vec(any::<u8>(), 0..256)
    ) {
        let tag = MessageKind::ALL.get(index).map(|kind| kind.tag()).unwrap_or(0);
        let mut data = vec![tag];
        data.extend_from_slice(&body);
        let _ = decode(&data);
    }

    #[test]
    fn prop_connection_round_trip(
        driver_name in wide_text(),
        driver_guid in wide_text(),
        car_id in any::<u8>(),
        car_model in narrow_text(),
        car_skin in narrow_text(),
    ) {
        let message = Message::NewConnection(ConnectionMessage {
            driver_name, driver_guid, car_id, car_model, car_skin,
        });
        let bytes = encode(&message);
        prop_assert!(bytes.is_ok());
        let decoded = bytes.ok().map(|bytes| decode(&bytes));
        prop_assert_eq!(decoded, Some(Ok(message)));
    }

    #[test]
    fn prop_car_update_round_trip(
        car_id in any::<u8>(),
        position in vector(),
        velocity in vector(),
        gear in any::<u8>(),
        engine_rpm in any::<u16>(),
        spline in 0.0f32..1.0f32,
    ) {
        let message = Message::CarUpdate(CarUpdateMessage {
            car_id, position, velocity, gear, engine_rpm, normalized_spline_pos: spline,
        });
        let decoded = encode(&message).ok().map(|bytes| decode(&bytes));
        prop_assert_eq!(decoded, Some(Ok(message)));
    }

    #[test]
    fn prop_lap_completed_round_trip(
        car_id in any::<u8>(),
        lap_time_ms in any::<u32>(),
        cuts in any::<u8>(),
        rows in proptest::collection::vec((any::<u8>(), any::<u32>(), any::<u16>(), any::<bool>()), 0..32),
        grip_level in 0.0f32..1.0f32,
    ) {
        let leaderboard = rows
            .into_iter()
            .map(|(car_id, total_time_ms, laps, has_completed)| LeaderboardEntry {
                car_id, total_time_ms, laps, has_completed,
            })
            .collect();
        let message = Message::LapCompleted(LapCompletedMessage {
            car_id, lap_time_ms, cuts, leaderboard, grip_level,
        });
        let decoded = encode(&message).ok().map(|bytes| decode(&bytes));
        prop_assert_eq!(decoded, Some(Ok(message)));
    }
}
