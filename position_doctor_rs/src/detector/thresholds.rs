//! Adaptive threshold math.
//!
//! Pure functions over filtered, sorted copies of the input. Empty inputs
//! fall back to the configured limit.

/// Nearest-rank percentile: index `floor(len * p)` clamped to the last element
///
/// Returns `None` for an empty slice. NaNs are dropped before ranking.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Percentile of the values strictly inside `(lo, hi)`
pub fn percentile_within(values: &[f64], lo: f64, hi: f64, p: f64) -> Option<f64> {
    let kept: Vec<f64> = values.iter().copied().filter(|v| *v > lo && *v < hi).collect();
    percentile(&kept, p)
}

/// `min(1.5 × p95, max_speed)` over plausible speeds in (0, 300) km/h
pub fn adaptive_speed_threshold(speeds: &[f64], max_speed: f64) -> f64 {
    match percentile_within(speeds, 0.0, 300.0, 0.95) {
        Some(p95) => (1.5 * p95).min(max_speed),
        None => max_speed,
    }
}

/// `min(10 × p99, max_jump)` over segment distances in (0, 10000) m
pub fn adaptive_jump_threshold(distances: &[f64], max_jump: f64) -> f64 {
    match percentile_within(distances, 0.0, 10_000.0, 0.99) {
        Some(p99) => (10.0 * p99).min(max_jump),
        None => max_jump,
    }
}

/// Mean of the values strictly inside `(lo, hi)`, `default` when none qualify
pub fn mean_within(values: &[f64], lo: f64, hi: f64, default: f64) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| **v > lo && **v < hi)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        default
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.95), None);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        // floor(20 * 0.95) = 19 -> 20.0
        assert_eq!(percentile(&values, 0.95), Some(20.0));
        assert_eq!(percentile(&values, 0.5), Some(11.0));
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 0.0), Some(1.0));
    }

    #[test]
    fn test_percentile_unsorted_input_untouched() {
        let values = vec![5.0, 1.0, 3.0];
        assert_eq!(percentile(&values, 0.99), Some(5.0));
        assert_eq!(values, vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn test_speed_threshold_fallback() {
        assert_eq!(adaptive_speed_threshold(&[], 120.0), 120.0);
        assert_eq!(adaptive_speed_threshold(&[0.0, 500.0], 120.0), 120.0);
    }

    #[test]
    fn test_speed_threshold_capped() {
        let speeds = vec![30.0; 50];
        assert_eq!(adaptive_speed_threshold(&speeds, 120.0), 45.0);
        let fast = vec![100.0; 50];
        assert_eq!(adaptive_speed_threshold(&fast, 120.0), 120.0);
    }

    #[test]
    fn test_jump_threshold() {
        let dists = vec![10.0; 30];
        assert_eq!(adaptive_jump_threshold(&dists, 500.0), 100.0);
        assert_eq!(adaptive_jump_threshold(&[], 500.0), 500.0);
    }

    #[test]
    fn test_mean_within_default() {
        assert_eq!(mean_within(&[0.0, -1.0, 2000.0], 0.0, 1000.0, 1.0), 1.0);
        assert_eq!(mean_within(&[2.0, 4.0], 0.0, 1000.0, 1.0), 3.0);
    }
}
