//! Geometry and kinematics between samples.
//!
//! All functions are total: missing timestamps or non-positive intervals
//! yield 0 instead of dividing by zero.

use crate::types::Sample;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const KMH_PER_MPS: f64 = 3.6;

/// Great-circle distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from point 1 to point 2, degrees in [0, 360)
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let y = d_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * d_lon.cos();
    let deg = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

pub fn distance(a: &Sample, b: &Sample) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

pub fn bearing_between(a: &Sample, b: &Sample) -> f64 {
    bearing(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Seconds from `a` to `b`, `None` if either timestamp is absent
pub fn elapsed_secs(a: &Sample, b: &Sample) -> Option<f64> {
    Some(b.timestamp? - a.timestamp?)
}

/// Speed from `a` to `b` in km/h
pub fn speed_kmh(a: &Sample, b: &Sample) -> f64 {
    match elapsed_secs(a, b) {
        Some(dt) if dt > 0.0 => distance(a, b) / dt * KMH_PER_MPS,
        _ => 0.0,
    }
}

/// Acceleration at `b` in m/s², finite difference over the two intervals
pub fn acceleration(a: &Sample, b: &Sample, c: &Sample) -> f64 {
    let (dt1, dt2) = match (elapsed_secs(a, b), elapsed_secs(b, c)) {
        (Some(dt1), Some(dt2)) if dt1 > 0.0 && dt2 > 0.0 => (dt1, dt2),
        _ => return 0.0,
    };
    let v1 = speed_kmh(a, b) / KMH_PER_MPS;
    let v2 = speed_kmh(b, c) / KMH_PER_MPS;
    (v2 - v1) / ((dt1 + dt2) / 2.0)
}

/// Longitude difference wrapped into [-180, 180)
pub fn wrap_longitude_delta(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Longitude folded back into [-180, 180]
pub fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        wrap_longitude_delta(lon)
    }
}

/// Longitudes made continuous across the antimeridian, anchored at the first
pub fn unwrap_longitudes(samples: &[Sample]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(samples.len());
    for (i, s) in samples.iter().enumerate() {
        let lon = match out.last() {
            Some(&prev) => prev + wrap_longitude_delta(s.longitude - samples[i - 1].longitude),
            None => s.longitude,
        };
        out.push(lon);
    }
    out
}

/// Absolute heading change folded into [0, 180]
pub fn bearing_delta(b1: f64, b2: f64) -> f64 {
    let diff = (b2 - b1).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Refresh speed and bearing of `samples[i]` against its predecessor
pub fn refresh_motion_at(samples: &mut [Sample], i: usize) {
    if i == 0 || i >= samples.len() {
        return;
    }
    let speed = speed_kmh(&samples[i - 1], &samples[i]);
    let heading = bearing_between(&samples[i - 1], &samples[i]);
    samples[i].speed = speed;
    samples[i].bearing = heading;
}

/// Recompute speed/bearing for every sample and acceleration for interior ones
pub fn recompute_kinematics(samples: &mut [Sample]) {
    if let Some(first) = samples.first_mut() {
        first.speed = 0.0;
        first.acceleration = None;
    }
    for i in 1..samples.len() {
        refresh_motion_at(samples, i);
    }
    for i in 1..samples.len().saturating_sub(1) {
        let accel = acceleration(&samples[i - 1], &samples[i], &samples[i + 1]);
        samples[i].acceleration = Some(accel);
    }
    if samples.len() > 1 {
        if let Some(last) = samples.last_mut() {
            last.acceleration = None;
        }
    }
}
