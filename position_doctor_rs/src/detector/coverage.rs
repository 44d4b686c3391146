//! Temporal coverage (missing segments) and spatial density checks.

use super::thresholds::mean_within;
use crate::kinematics::{distance, elapsed_secs};
use crate::types::{Anomaly, AnomalyKind, GapRange, Sample, Severity};

const GAP_FACTOR: f64 = 5.0; // × mean interval
const GAP_FLOOR_SECS: f64 = 10.0;
const DENSITY_MIN_SAMPLES: usize = 20;
const DENSITY_WINDOW: usize = 10;
const SPARSE_M: f64 = 100.0;
const DENSE_M: f64 = 0.1;

/// Mean of the valid sampling intervals in (0, 1000) s, 1 s if there are none
pub fn mean_interval(samples: &[Sample]) -> f64 {
    let intervals: Vec<f64> = samples
        .windows(2)
        .filter_map(|w| elapsed_secs(&w[0], &w[1]))
        .collect();
    mean_within(&intervals, 0.0, 1000.0, 1.0)
}

/// Samples the mean cadence predicts inside `gap` that are not there
fn expected_missing(gap: &GapRange, cadence: f64) -> usize {
    let predicted = (gap.duration_secs / cadence).round() as usize;
    predicted.saturating_sub(gap.end - gap.start)
}

pub fn detect_missing(samples: &[Sample]) -> Vec<Anomaly> {
    let cadence = mean_interval(samples);
    let limit = cadence * GAP_FACTOR;

    let mut gaps: Vec<GapRange> = Vec::new();
    let mut open: Option<GapRange> = None;

    for i in 1..samples.len() {
        let Some(dt) = elapsed_secs(&samples[i - 1], &samples[i]) else {
            continue;
        };
        if dt > limit && dt > GAP_FLOOR_SECS {
            match open.as_mut() {
                Some(gap) => {
                    gap.end = i;
                    gap.duration_secs += dt;
                }
                None => {
                    open = Some(GapRange {
                        start: i - 1,
                        end: i,
                        duration_secs: dt,
                    })
                }
            }
        } else if let Some(gap) = open.take() {
            gaps.push(gap);
        }
    }
    gaps.extend(open);

    if gaps.is_empty() {
        return Vec::new();
    }

    let missing: usize = gaps.iter().map(|g| expected_missing(g, cadence)).sum();
    let n = samples.len();
    let severity = if missing > n / 5 {
        Severity::High
    } else if missing > n / 10 {
        Severity::Medium
    } else {
        Severity::Low
    };

    vec![Anomaly {
        kind: AnomalyKind::Missing,
        description: "Missing data segment".to_string(),
        count: gaps.len(),
        severity,
        indices: Vec::new(),
        gaps,
    }]
}

pub fn detect_density(samples: &[Sample]) -> Vec<Anomaly> {
    if samples.len() < DENSITY_MIN_SAMPLES {
        return Vec::new();
    }

    let mut sparse = Vec::new();
    let mut dense = Vec::new();
    for (start, window) in samples.windows(DENSITY_WINDOW).enumerate() {
        let total: f64 = window.windows(2).map(|w| distance(&w[0], &w[1])).sum();
        let mean = total / (DENSITY_WINDOW - 1) as f64;
        let centre = start + DENSITY_WINDOW / 2;
        if mean > SPARSE_M {
            sparse.push(centre);
        } else if mean < DENSE_M {
            dense.push(centre);
        }
    }

    let mut anomalies = Vec::new();
    if !sparse.is_empty() {
        let severity = if sparse.len() > samples.len() / 10 {
            Severity::High
        } else {
            Severity::Medium
        };
        anomalies.push(Anomaly {
            kind: AnomalyKind::Density,
            description: "Sparse point density detected".to_string(),
            count: sparse.len(),
            severity,
            indices: sparse,
            gaps: Vec::new(),
        });
    }
    if !dense.is_empty() {
        anomalies.push(Anomaly {
            kind: AnomalyKind::Density,
            description: "Dense point clustering detected".to_string(),
            count: dense.len(),
            severity: Severity::Low,
            indices: dense,
            gaps: Vec::new(),
        });
    }
    anomalies
}
