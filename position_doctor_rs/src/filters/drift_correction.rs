//! Pull drift runs toward the straight path between their bracketing samples.

use super::adaptive_rts::SmootherConfig;
use crate::kinematics::{normalize_longitude, refresh_motion_at, wrap_longitude_delta};
use crate::types::{Sample, SampleStatus};

/// Maximal runs of `Drift` status as inclusive (start, end) index pairs
pub fn drift_runs(statuses: &[SampleStatus], min_len: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < statuses.len() {
        if statuses[i] != SampleStatus::Drift {
            i += 1;
            continue;
        }
        let start = i;
        while i < statuses.len() && statuses[i] == SampleStatus::Drift {
            i += 1;
        }
        if i - start >= min_len {
            runs.push((start, i - 1));
        }
    }
    runs
}

/// Blend smoothed drift samples toward a linear reference.
///
/// `statuses` are the pre-smoothing statuses, `moved` marks samples the
/// smoother actually displaced; only those are pulled. The first and last
/// sample of the trajectory never move. Returns the number of samples pulled.
pub fn correct_drift_segments(
    statuses: &[SampleStatus],
    smoothed: &mut [Sample],
    moved: &[bool],
    config: &SmootherConfig,
) -> usize {
    let n = smoothed.len();
    let blend = config.drift_blend;
    let mut pulled = 0;

    for (start, end) in drift_runs(statuses, config.drift_min_run) {
        let anchor_a = start.saturating_sub(1);
        let anchor_b = (end + 1).min(n - 1);
        let (a_lat, a_lon) = (smoothed[anchor_a].latitude, smoothed[anchor_a].longitude);
        let b_lat = smoothed[anchor_b].latitude;
        let span_lon = wrap_longitude_delta(smoothed[anchor_b].longitude - a_lon);
        let segments = (end - start + 2) as f64;

        for i in start..=end {
            if i == 0 || i == n - 1 || !moved.get(i).copied().unwrap_or(false) {
                continue;
            }
            let t = (i - start + 1) as f64 / segments;
            let ref_lat = a_lat + t * (b_lat - a_lat);
            let ref_lon = a_lon + t * span_lon;

            let sample = &mut smoothed[i];
            sample.latitude = sample.latitude * (1.0 - blend) + ref_lat * blend;
            let toward = wrap_longitude_delta(ref_lon - sample.longitude);
            sample.longitude = normalize_longitude(sample.longitude + blend * toward);
            pulled += 1;

            refresh_motion_at(smoothed, i);
            refresh_motion_at(smoothed, i + 1);
        }
    }
    pulled
}
