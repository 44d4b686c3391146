//! Drift detection: sustained small bias against a local linear fit.

use super::DetectorConfig;
use crate::kinematics::{unwrap_longitudes, wrap_longitude_delta};
use crate::types::{Anomaly, AnomalyKind, Sample, Severity};

const WINDOW: usize = 5;
const RECENT: usize = WINDOW / 2 + 1; // last 3 samples of the window

/// Least-squares fit of index vs lat and index vs lon, evaluated at the last index.
///
/// Longitudes are unwrapped across the window, so the expected longitude
/// may lie just outside [-180, 180].
fn regression_endpoint(window: &[Sample]) -> (f64, f64) {
    let n = window.len() as f64;
    let (sum_x, sum_x2) = (0..window.len()).fold((0.0, 0.0), |(sx, sx2), i| {
        let x = i as f64;
        (sx + x, sx2 + x * x)
    });
    let denom = n * sum_x2 - sum_x * sum_x;
    let last_x = (window.len() - 1) as f64;

    let fit = |values: &[f64]| {
        let (sum_y, sum_xy) = values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sy, sxy), (i, y)| (sy + y, sxy + i as f64 * y));
        if denom.abs() < f64::EPSILON {
            return sum_y / n;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - slope * sum_x) / n;
        slope * last_x + intercept
    };

    let lats: Vec<f64> = window.iter().map(|s| s.latitude).collect();
    (fit(&lats), fit(&unwrap_longitudes(window)))
}

fn one_sided(diffs: impl Iterator<Item = f64>, threshold: f64, majority: usize) -> bool {
    let (pos, neg) = diffs.fold((0usize, 0usize), |(p, n), d| {
        if d > threshold {
            (p + 1, n)
        } else if d < -threshold {
            (p, n + 1)
        } else {
            (p, n)
        }
    });
    pos > majority || neg > majority
}

/// More than half of `recent` sit beyond the threshold on the same side of
/// the expected latitude
fn is_consistent_deviation(recent: &[Sample], expected_lat: f64, threshold: f64) -> bool {
    if recent.len() < 3 {
        return false;
    }
    let majority = recent.len() / 2;
    one_sided(recent.iter().map(|s| s.latitude - expected_lat), threshold, majority)
}

pub fn detect_drift(samples: &[Sample], config: &DetectorConfig) -> Vec<Anomaly> {
    if samples.len() < WINDOW {
        return Vec::new();
    }
    let threshold = config.drift_threshold_deg;
    let mut indices = Vec::new();

    for i in WINDOW..samples.len() {
        let window = &samples[i + 1 - WINDOW..=i];
        let expected = regression_endpoint(window);
        let lat_diff = samples[i].latitude - expected.0;
        let lon_diff = wrap_longitude_delta(samples[i].longitude - expected.1);

        let recent = &samples[i + 1 - RECENT..=i];
        if is_consistent_deviation(recent, expected.0, threshold)
            && (lat_diff.abs() > threshold || lon_diff.abs() > threshold)
        {
            indices.push(i);
        }
    }
    if indices.is_empty() {
        return Vec::new();
    }

    let n = samples.len();
    let severity = if indices.len() > n / 5 {
        Severity::High
    } else if indices.len() > n / 10 {
        Severity::Medium
    } else {
        Severity::Low
    };

    vec![Anomaly {
        kind: AnomalyKind::Drift,
        description: "GPS position drift detected".to_string(),
        count: indices.len(),
        severity,
        indices,
        gaps: Vec::new(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::kinematics::normalize_longitude as normalize;

    fn at(i: usize, lat: f64, lon: f64) -> Sample {
        Sample::new(i, lat, lon).with_timestamp(1_700_000_000.0 + i as f64)
    }

    #[test]
    fn test_regression_on_line_is_exact() {
        let window: Vec<Sample> = (0..5).map(|i| at(i, 10.0 + i as f64 * 0.001, 20.0)).collect();
        let (lat, lon) = regression_endpoint(&window);
        assert_relative_eq!(lat, 10.004, epsilon = 1e-12);
        assert_relative_eq!(lon, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_straight_line_has_no_drift() {
        let samples: Vec<Sample> = (0..30)
            .map(|i| at(i, 39.9 + i as f64 * 0.0001, 116.4 + i as f64 * 0.0001))
            .collect();
        assert!(detect_drift(&samples, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_step_offset_flags_onset() {
        // stationary, then a sustained 4e-4° shift from sample 10 on
        let samples: Vec<Sample> = (0..20)
            .map(|i| {
                let shift = if i >= 10 { 0.0004 } else { 0.0 };
                at(i, 39.9 + shift, 116.4)
            })
            .collect();
        let anomalies = detect_drift(&samples, &DetectorConfig::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].indices, vec![10]);
        assert_eq!(anomalies[0].severity, Severity::Low);
    }

    #[test]
    fn test_consistency_is_judged_on_latitude() {
        let north = vec![at(0, 1.0003, 2.0), at(1, 1.0004, 2.0), at(2, 1.0, 2.0)];
        assert!(is_consistent_deviation(&north, 1.0, 0.0001));
        assert!(!is_consistent_deviation(&north[..2], 1.0, 0.0001));

        let east = vec![at(0, 1.0, 2.0003), at(1, 1.0, 2.0004), at(2, 1.0, 2.0)];
        assert!(!is_consistent_deviation(&east, 1.0, 0.0001));
    }

    #[test]
    fn test_sideways_step_is_not_drift() {
        let samples: Vec<Sample> = (0..20)
            .map(|i| {
                let shift = if i >= 10 { 0.0004 } else { 0.0 };
                at(i, 39.9, 116.4 + shift)
            })
            .collect();
        assert!(detect_drift(&samples, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_regression_across_antimeridian() {
        let window: Vec<Sample> = (0..5)
            .map(|i| at(i, 0.0, normalize(179.9998 + i as f64 * 1e-4)))
            .collect();
        let (_, lon) = regression_endpoint(&window);
        assert_relative_eq!(wrap_longitude_delta(lon - window[4].longitude), 0.0, epsilon = 1e-9);

        let samples: Vec<Sample> = (0..20)
            .map(|i| at(i, 0.0, normalize(179.999 + i as f64 * 1e-4)))
            .collect();
        assert!(detect_drift(&samples, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_too_short() {
        let samples: Vec<Sample> = (0..4).map(|i| at(i, 1.0, 1.0)).collect();
        assert!(detect_drift(&samples, &DetectorConfig::default()).is_empty());
    }
}
