//! Real-time burst tracking and proximity metrics.
//!
//! The server sends car updates in bursts, one per realtime interval, roughly
//! ordered by car slot. A burst ends when the slot sequence wraps backward by
//! at least half the connected driver count.

use chrono::{DateTime, Duration, Utc};

use crate::model::DriverInfo;

/// Updates are ignored for this long after a session starts while cars are
/// being placed on the grid.
pub const GRID_GRACE_PERIOD: Duration = Duration::seconds(5);

/// Drivers slower than this are excluded from proximity metrics.
pub const MIN_PROXIMITY_SPEED_KMH: f32 = 20.0;

#[derive(Debug, Default, Clone)]
pub struct RealtimeAggregator {
    last_car_id: Option<u8>,
}

impl RealtimeAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous burst, e.g. after a session rotation.
    pub fn reset(&mut self) {
        self.last_car_id = None;
    }

    /// Record an update for `car_id` and report whether it opens a new burst.
    ///
    /// A single connected driver never produces a boundary. With very small
    /// fields any backward step counts, so reordering inside a burst of two or
    /// three cars can split it.
    pub fn observe(&mut self, car_id: u8, connected_drivers: usize) -> bool {
        let half = connected_drivers / 2;
        let boundary = match self.last_car_id {
            Some(last) if half > 0 => usize::from(last.saturating_sub(car_id)) >= half,
            _ => false,
        };
        self.last_car_id = Some(car_id);
        boundary
    }

    #[must_use]
    pub fn in_grace_period(session_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - session_start < GRID_GRACE_PERIOD
    }
}

/// Recompute `current_distance_to_closest_car` for every moving driver.
///
/// Eligible drivers are ordered by track position; each one takes the smaller
/// world distance to its neighbors ahead and behind, wrapping around the lap.
pub fn update_proximity(drivers: &mut [DriverInfo]) {
    let mut eligible: Vec<(usize, f32)> = drivers
        .iter()
        .enumerate()
        .filter(|(_, driver)| {
            driver.is_connected()
                && driver.current_speed_kmh > MIN_PROXIMITY_SPEED_KMH
                && driver.last_position.is_some()
        })
        .map(|(index, driver)| (index, driver.end_spline_pos))
        .collect();

    if eligible.len() < 2 {
        for &(index, _) in &eligible {
            if let Some(driver) = drivers.get_mut(index) {
                driver.current_distance_to_closest_car = 0.0;
            }
        }
        return;
    }

    eligible.sort_by(|a, b| a.1.total_cmp(&b.1));

    let positions: Vec<_> = eligible
        .iter()
        .map(|&(index, _)| drivers.get(index).and_then(|d| d.last_position))
        .collect();

    let count = eligible.len();
    for (slot, &(index, _)) in eligible.iter().enumerate() {
        let ahead = (slot + 1) % count;
        let behind = (slot + count - 1) % count;
        let here = positions.get(slot).copied().flatten();
        let distance_to = |other: usize| -> Option<f32> {
            let there = positions.get(other).copied().flatten()?;
            Some(here?.distance_to(&there))
        };
        let closest = match (distance_to(ahead), distance_to(behind)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => 0.0,
        };
        if let Some(driver) = drivers.get_mut(index) {
            driver.current_distance_to_closest_car = closest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openracing_acserver_protocol::Vector3;

    fn moving(car_id: u8, spline: f32, x: f32) -> DriverInfo {
        let mut driver = DriverInfo::new(usize::from(car_id), car_id);
        driver.current_speed_kmh = 120.0;
        driver.end_spline_pos = spline;
        driver.last_position = Some(Vector3::new(x, 0.0, 0.0));
        driver
    }

    #[test]
    fn test_single_wrap_per_cycle() {
        let mut aggregator = RealtimeAggregator::new();
        let mut boundaries = 0;
        for _ in 0..3 {
            for car_id in 0..6u8 {
                if aggregator.observe(car_id, 6) {
                    boundaries += 1;
                }
            }
        }
        assert_eq!(boundaries, 2);
    }

    #[test]
    fn test_two_driver_cycles_wrap_once_each() {
        let mut aggregator = RealtimeAggregator::new();
        let mut boundaries = 0;
        for _ in 0..5 {
            for car_id in 0..2u8 {
                if aggregator.observe(car_id, 2) {
                    boundaries += 1;
                }
            }
        }
        assert_eq!(boundaries, 4);
    }

    #[test]
    fn test_three_driver_cycles_wrap_once_each() {
        let mut aggregator = RealtimeAggregator::new();
        let mut boundaries = 0;
        for _ in 0..4 {
            for car_id in 0..3u8 {
                if aggregator.observe(car_id, 3) {
                    boundaries += 1;
                }
            }
        }
        assert_eq!(boundaries, 3);
    }

    #[test]
    fn test_lone_driver_never_wraps() {
        let mut aggregator = RealtimeAggregator::new();
        let hits = (0..4).filter(|_| aggregator.observe(7, 1)).count();
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_minor_reordering_is_not_a_boundary() {
        let mut aggregator = RealtimeAggregator::new();
        let hits: Vec<bool> = [0u8, 2, 1, 3, 5, 4]
            .into_iter()
            .map(|car_id| aggregator.observe(car_id, 6))
            .collect();
        assert!(hits.iter().all(|hit| !hit));
    }

    #[test]
    fn test_proximity_wraps_around_lap() {
        let mut drivers = vec![moving(0, 0.1, 0.0), moving(1, 0.5, 100.0), moving(2, 0.9, 130.0)];
        update_proximity(&mut drivers);
        let distances: Vec<f32> = drivers
            .iter()
            .map(|d| d.current_distance_to_closest_car)
            .collect();
        assert_eq!(distances, vec![100.0, 30.0, 30.0]);
    }

    #[test]
    fn test_slow_cars_are_ignored() {
        let mut drivers = vec![moving(0, 0.1, 0.0), moving(1, 0.2, 10.0)];
        if let Some(slow) = drivers.get_mut(1) {
            slow.current_speed_kmh = 5.0;
            slow.current_distance_to_closest_car = 42.0;
        }
        update_proximity(&mut drivers);
        assert_eq!(drivers.first().map(|d| d.current_distance_to_closest_car), Some(0.0));
        assert_eq!(drivers.get(1).map(|d| d.current_distance_to_closest_car), Some(42.0));
    }
}
