//! Summary statistics for a trajectory before and after correction.

use serde::{Deserialize, Serialize};

use crate::kinematics::distance;
use crate::types::Sample;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub gain: f64,
    pub loss: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub sample_count: usize,
    pub total_distance_m: f64,
    pub duration_secs: f64,
    pub bounds: Bounds,
    pub elevation: ElevationStats,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

impl TrajectoryStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Self::default();
        };

        let total_distance_m = samples.windows(2).map(|w| distance(&w[0], &w[1])).sum();
        let duration_secs = match (first.timestamp, last.timestamp) {
            (Some(t0), Some(t1)) => t1 - t0,
            _ => 0.0,
        };

        let mut bounds = Bounds {
            min_latitude: first.latitude,
            max_latitude: first.latitude,
            min_longitude: first.longitude,
            max_longitude: first.longitude,
        };
        for s in samples {
            bounds.min_latitude = bounds.min_latitude.min(s.latitude);
            bounds.max_latitude = bounds.max_latitude.max(s.latitude);
            bounds.min_longitude = bounds.min_longitude.min(s.longitude);
            bounds.max_longitude = bounds.max_longitude.max(s.longitude);
        }

        let speeds: Vec<f64> = samples.iter().map(|s| s.speed).filter(|v| *v > 0.0).collect();
        let (avg_speed_kmh, max_speed_kmh) = if speeds.is_empty() {
            (0.0, 0.0)
        } else {
            (
                speeds.iter().sum::<f64>() / speeds.len() as f64,
                speeds.iter().copied().fold(0.0, f64::max),
            )
        };

        Self {
            sample_count: samples.len(),
            total_distance_m,
            duration_secs,
            bounds,
            elevation: elevation_stats(samples),
            avg_speed_kmh,
            max_speed_kmh,
        }
    }
}

fn elevation_stats(samples: &[Sample]) -> ElevationStats {
    let elevations: Vec<f64> = samples.iter().filter_map(Sample::recorded_elevation).collect();
    if elevations.is_empty() {
        return ElevationStats::default();
    }

    let mut stats = ElevationStats {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        avg: elevations.iter().sum::<f64>() / elevations.len() as f64,
        gain: 0.0,
        loss: 0.0,
    };
    for e in &elevations {
        stats.min = stats.min.min(*e);
        stats.max = stats.max.max(*e);
    }
    for w in elevations.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            stats.gain += delta;
        } else {
            stats.loss -= delta;
        }
    }
    stats
}
