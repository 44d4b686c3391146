//! Anomaly detection over a materialized trajectory.
//!
//! Each category is an independent pure function of (samples, config);
//! `detect_all` only composes them in a fixed order.

pub mod coverage;
pub mod drift;
pub mod motion;
pub mod thresholds;

use serde::{Deserialize, Serialize};

use crate::types::{Anomaly, AnomalyKind, Sample, SampleStatus};

pub use coverage::{detect_density, detect_missing, mean_interval};
pub use drift::detect_drift;
pub use motion::{detect_acceleration, detect_jumps, detect_speed};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub max_speed_kmh: f64,
    pub max_acceleration: f64, // m/s²
    pub max_jump_m: f64,
    pub drift_threshold_deg: f64,
    pub adaptive: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: 120.0,
            max_acceleration: 10.0,
            max_jump_m: 500.0,
            drift_threshold_deg: 0.0001,
            adaptive: true,
        }
    }
}

/// Run every category: speed, acceleration, jump, drift, missing, density
pub fn detect_all(samples: &[Sample], config: &DetectorConfig) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    anomalies.extend(detect_speed(samples, config));
    anomalies.extend(detect_acceleration(samples, config));
    anomalies.extend(detect_jumps(samples, config));
    anomalies.extend(detect_drift(samples, config));
    anomalies.extend(detect_missing(samples));
    anomalies.extend(detect_density(samples));
    anomalies
}

// First match wins when a sample is flagged by several categories
const STATUS_PRECEDENCE: [AnomalyKind; 4] = [
    AnomalyKind::Jump,
    AnomalyKind::Drift,
    AnomalyKind::Speed,
    AnomalyKind::Acceleration,
];

/// Write detection results onto sample statuses.
///
/// Indices are positions in `samples` as passed to `detect_all`. Only
/// `Normal` samples are relabelled; returns how many changed.
pub fn annotate_statuses(samples: &mut [Sample], anomalies: &[Anomaly]) -> usize {
    let mut changed = 0;
    for kind in STATUS_PRECEDENCE {
        let Some(status) = kind.sample_status() else {
            continue;
        };
        for anomaly in anomalies.iter().filter(|a| a.kind == kind) {
            for &i in &anomaly.indices {
                if let Some(sample) = samples.get_mut(i) {
                    if sample.status == SampleStatus::Normal {
                        sample.status = status;
                        changed += 1;
                    }
                }
            }
        }
    }
    changed
}
