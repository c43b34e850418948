//! Standings reconstruction for a session that is about to be replaced.
//!
//! Works from the recorded laps only, so the result does not depend on the
//! server having sent a final leaderboard. The driver list itself is never
//! reordered; ranking is written into `position`, `start_position` and `gap`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::model::{DriverInfo, SessionInfo};

/// Format a millisecond delta as `mm:ss.mmm`.
#[must_use]
pub fn format_gap(ms: u32) -> String {
    format!("{:02}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}

/// Compute totals, positions and gaps for every driver of `session`.
pub fn finalize_session(session: &mut SessionInfo) {
    compute_totals(session);
    if session.session_type.is_race() {
        assign_start_positions(session);
        rank_race(session);
    } else {
        rank_by_best_lap(session);
    }
}

fn compute_totals(session: &mut SessionInfo) {
    let SessionInfo { drivers, laps, .. } = session;
    for driver in drivers.iter_mut() {
        let id = driver.connection_id;
        let own = || laps.iter().filter(move |lap| lap.connection_id == id);
        driver.best_lap_ms = own()
            .filter(|lap| lap.cuts == 0)
            .map(|lap| lap.lap_time_ms)
            .min()
            .unwrap_or(0);
        driver.total_time_ms = own().fold(0u32, |acc, lap| acc.saturating_add(lap.lap_time_ms));
        driver.lap_count = own().map(|lap| lap.lap_no).max().unwrap_or(0);
        let cuts: u32 = own().map(|lap| u32::from(lap.cuts)).sum();
        driver.incidents = driver.incidents.saturating_add(cuts);
    }
}

fn assign_start_positions(session: &mut SessionInfo) {
    let start = session.timestamp;
    let mut on_grid: Vec<(usize, Option<f32>)> = Vec::new();
    let mut late: Vec<(usize, DateTime<Utc>)> = Vec::new();
    let mut unknown: Vec<usize> = Vec::new();

    for (index, driver) in session.drivers.iter().enumerate() {
        match driver.connected_timestamp {
            Some(connected) if connected <= start => on_grid.push((index, driver.start_spline_pos)),
            Some(connected) => late.push((index, connected)),
            None => unknown.push(index),
        }
    }

    // Further along the spline means further up the grid.
    on_grid.sort_by(|a, b| spline_desc(a.1, b.1));
    late.sort_by_key(|&(_, connected)| connected);

    let order = on_grid
        .into_iter()
        .map(|(index, _)| index)
        .chain(late.into_iter().map(|(index, _)| index))
        .chain(unknown);
    for (position, index) in (1u16..).zip(order) {
        if let Some(driver) = session.drivers.get_mut(index) {
            driver.start_position = position;
        }
    }
}

fn spline_desc(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn rank_race(session: &mut SessionInfo) {
    let scheduled = session.lap_count;
    let finish_time = |driver: &DriverInfo| -> Option<DateTime<Utc>> {
        if driver.lap_count == 0 || driver.lap_count < scheduled {
            return None;
        }
        session
            .laps
            .iter()
            .filter(|lap| lap.connection_id == driver.connection_id && lap.lap_no == scheduled)
            .map(|lap| lap.timestamp)
            .min()
    };

    let mut finished: Vec<(usize, DateTime<Utc>)> = Vec::new();
    let mut running: Vec<usize> = Vec::new();
    for (index, driver) in session.drivers.iter().enumerate() {
        match finish_time(driver) {
            Some(at) => finished.push((index, at)),
            None => running.push(index),
        }
    }

    finished.sort_by_key(|&(_, at)| at);
    running.sort_by(|&a, &b| {
        let (Some(a), Some(b)) = (session.drivers.get(a), session.drivers.get(b)) else {
            return Ordering::Equal;
        };
        b.lap_count
            .cmp(&a.lap_count)
            .then_with(|| b.end_spline_pos.total_cmp(&a.end_spline_pos))
    });

    let order: Vec<usize> = finished
        .into_iter()
        .map(|(index, _)| index)
        .chain(running)
        .collect();

    let leader = order
        .first()
        .and_then(|&index| session.drivers.get(index))
        .map(|driver| (driver.lap_count, driver.total_time_ms));

    for (position, &index) in (1u16..).zip(order.iter()) {
        let Some(driver) = session.drivers.get_mut(index) else {
            continue;
        };
        driver.position = position;
        driver.gap = match leader {
            Some(_) if position == 1 => String::new(),
            Some((leader_laps, leader_time)) => race_gap(driver, leader_laps, leader_time),
            None => String::new(),
        };
    }
}

fn race_gap(driver: &DriverInfo, leader_laps: u16, leader_time: u32) -> String {
    match leader_laps.saturating_sub(driver.lap_count) {
        0 => format_gap(driver.total_time_ms.saturating_sub(leader_time)),
        1 => "1 lap".to_string(),
        n => format!("{n} laps"),
    }
}

fn rank_by_best_lap(session: &mut SessionInfo) {
    for driver in &mut session.drivers {
        if driver.best_lap_ms == 0 {
            driver.best_lap_ms = u32::MAX;
        }
    }

    let mut order: Vec<usize> = (0..session.drivers.len()).collect();
    order.sort_by_key(|&index| {
        session
            .drivers
            .get(index)
            .map_or(u32::MAX, |driver| driver.best_lap_ms)
    });

    let fastest = order
        .first()
        .and_then(|&index| session.drivers.get(index))
        .map_or(u32::MAX, |driver| driver.best_lap_ms);

    for (position, &index) in (1u16..).zip(order.iter()) {
        let Some(driver) = session.drivers.get_mut(index) else {
            continue;
        };
        driver.position = position;
        if driver.best_lap_ms == u32::MAX {
            driver.best_lap_ms = 0;
            driver.gap = String::new();
        } else if position == 1 {
            driver.gap = String::new();
        } else {
            driver.gap = format_gap(driver.best_lap_ms.saturating_sub(fastest));
        }
    }
}
