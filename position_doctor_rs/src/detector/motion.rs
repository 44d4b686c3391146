//! Speed, acceleration and jump detection.

use log::debug;

use super::thresholds::{adaptive_jump_threshold, adaptive_speed_threshold};
use super::DetectorConfig;
use crate::kinematics::{acceleration, distance, elapsed_secs, KMH_PER_MPS};
use crate::types::{Anomaly, AnomalyKind, Sample, Severity};

/// Flag samples whose recorded speed exceeds the (adaptive) speed limit
pub fn detect_speed(samples: &[Sample], config: &DetectorConfig) -> Vec<Anomaly> {
    let threshold = if config.adaptive {
        let speeds: Vec<f64> = samples.iter().map(|s| s.speed).collect();
        adaptive_speed_threshold(&speeds, config.max_speed_kmh)
    } else {
        config.max_speed_kmh
    };
    debug!("speed threshold {:.2} km/h", threshold);

    let indices: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.speed > threshold)
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        return Vec::new();
    }

    let fastest = indices
        .iter()
        .map(|&i| samples[i].speed)
        .fold(0.0_f64, f64::max);
    let ratio = fastest / threshold;
    let severity = if ratio > 2.0 {
        Severity::High
    } else if ratio > 1.5 {
        Severity::Medium
    } else {
        Severity::Low
    };

    vec![Anomaly {
        kind: AnomalyKind::Speed,
        description: "Abnormal speed detected".to_string(),
        count: indices.len(),
        severity,
        indices,
        gaps: Vec::new(),
    }]
}

/// Flag the middle sample of every triple whose acceleration exceeds the limit
pub fn detect_acceleration(samples: &[Sample], config: &DetectorConfig) -> Vec<Anomaly> {
    let mut indices = Vec::new();
    let mut extreme = false;

    for i in 2..samples.len() {
        let accel = acceleration(&samples[i - 2], &samples[i - 1], &samples[i]).abs();
        if accel > config.max_acceleration {
            indices.push(i - 1);
            extreme |= accel > 2.0 * config.max_acceleration;
        }
    }
    if indices.is_empty() {
        return Vec::new();
    }

    vec![Anomaly {
        kind: AnomalyKind::Acceleration,
        description: "Abnormal acceleration detected".to_string(),
        count: indices.len(),
        severity: if extreme { Severity::High } else { Severity::Medium },
        indices,
        gaps: Vec::new(),
    }]
}

/// Flag samples that land implausibly far from their predecessor
///
/// A jump must beat both the distance reachable at `max_speed_kmh` in the
/// elapsed time and the absolute (adaptive) jump threshold. Pairs with no
/// usable interval are judged on the absolute threshold alone.
pub fn detect_jumps(samples: &[Sample], config: &DetectorConfig) -> Vec<Anomaly> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let distances: Vec<f64> = samples.windows(2).map(|w| distance(&w[0], &w[1])).collect();
    let threshold = if config.adaptive {
        adaptive_jump_threshold(&distances, config.max_jump_m)
    } else {
        config.max_jump_m
    };
    debug!("jump threshold {:.2} m", threshold);

    let max_speed_mps = config.max_speed_kmh / KMH_PER_MPS;
    let mut indices = Vec::new();
    let mut huge = false;

    for (k, &dist) in distances.iter().enumerate() {
        let i = k + 1;
        let flagged = match elapsed_secs(&samples[i - 1], &samples[i]) {
            Some(dt) if dt > 0.0 => dist > max_speed_mps * dt && dist > threshold,
            _ => dist > threshold,
        };
        if flagged {
            indices.push(i);
            huge |= dist > 2.0 * config.max_jump_m;
        }
    }
    if indices.is_empty() {
        return Vec::new();
    }

    let severity = if indices.len() > samples.len() / 10 || huge {
        Severity::High
    } else {
        Severity::Medium
    };

    vec![Anomaly {
        kind: AnomalyKind::Jump,
        description: "Position jump detected".to_string(),
        count: indices.len(),
        severity,
        indices,
        gaps: Vec::new(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, step: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let mut s = Sample::new(i, 39.9042 + i as f64 * step, 116.4074 + i as f64 * step)
                    .with_timestamp(1_700_000_000.0 + i as f64);
                s.speed = 30.0;
                s
            })
            .collect()
    }

    #[test]
    fn test_speed_spike_is_high_severity() {
        let config = DetectorConfig::default();
        let mut samples = line(100, 0.0001);
        samples[50].speed = 10.0 * config.max_speed_kmh;

        let anomalies = detect_speed(&samples, &config);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].indices.contains(&50));
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn test_speed_fixed_threshold() {
        let config = DetectorConfig {
            adaptive: false,
            ..DetectorConfig::default()
        };
        let mut samples = line(10, 0.0001);
        samples[3].speed = 130.0;
        let anomalies = detect_speed(&samples, &config);
        assert_eq!(anomalies[0].indices, vec![3]);
        assert_eq!(anomalies[0].severity, Severity::Low);
    }

    #[test]
    fn test_speed_clean_trace() {
        let samples = line(20, 0.0001);
        assert!(detect_speed(&samples, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_jump_flags_offset_sample() {
        let config = DetectorConfig {
            max_jump_m: 100.0,
            ..DetectorConfig::default()
        };
        let mut samples = line(10, 0.0001);
        samples[5].latitude += 0.001;
        samples[5].longitude += 0.001;

        let anomalies = detect_jumps(&samples, &config);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].indices.contains(&5));
        assert_eq!(anomalies[0].kind, AnomalyKind::Jump);
    }

    #[test]
    fn test_jump_without_timestamps_uses_threshold() {
        let config = DetectorConfig {
            adaptive: false,
            ..DetectorConfig::default()
        };
        let mut samples: Vec<Sample> = (0..5)
            .map(|i| Sample::new(i, 10.0 + i as f64 * 0.0001, 10.0))
            .collect();
        samples[3].latitude += 0.01; // ~1.1 km
        let anomalies = detect_jumps(&samples, &config);
        assert_eq!(anomalies[0].indices, vec![3, 4]);
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn test_acceleration_spike() {
        let config = DetectorConfig::default();
        let mut samples = line(6, 0.0001);
        // ~290 m in one second between 2 and 3
        samples[3].latitude += 0.0025;
        for s in samples.iter_mut().skip(4) {
            s.latitude += 0.0025;
        }
        let anomalies = detect_acceleration(&samples, &config);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].indices, vec![2, 3]);
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn test_short_inputs() {
        let config = DetectorConfig::default();
        assert!(detect_jumps(&[], &config).is_empty());
        assert!(detect_acceleration(&line(2, 0.0001), &config).is_empty());
        assert!(detect_speed(&[], &config).is_empty());
    }
}
