//! Noise-aware Douglas-Peucker simplification.
//!
//! Distances are geodesic: the perpendicular offset of a point from a chord is
//! the height of the triangle whose sides are haversine distances (Heron's
//! formula). Fast samples weigh more, and each sub-range's tolerance grows
//! with the local heading jitter.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::kinematics::{bearing_between, bearing_delta, distance};
use crate::types::Sample;

const SPEED_REFERENCE_KMH: f64 = 50.0;
const SPEED_FACTOR_TRIGGER: f64 = 1.5;
const SPEED_WEIGHT: f64 = 1.2;
const STRAIGHT_TURN_DEG: f64 = 10.0;
const NOISE_SCALE_DEG: f64 = 45.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifierConfig {
    pub epsilon_m: f64,
    pub consider_noise: bool,
    pub min_points: usize,

    // ── Segment-parallel mode ──
    pub workers: usize, // 1 = sequential
    pub parallel_min_len: usize,
    pub min_segment_len: usize,
    pub join_tolerance_m: f64,
}

impl Default for SimplifierConfig {
    fn default() -> Self {
        Self {
            epsilon_m: 1.0,
            consider_noise: true,
            min_points: 2,
            workers: 1,
            parallel_min_len: 1000,
            min_segment_len: 100,
            join_tolerance_m: 1.0,
        }
    }
}

/// Geodesic distance from `p` to the chord `a`–`b`, meters
pub fn perpendicular_distance(p: &Sample, a: &Sample, b: &Sample) -> f64 {
    let base = distance(a, b);
    let d1 = distance(a, p);
    if base == 0.0 {
        return d1;
    }
    let d2 = distance(b, p);
    let s = (d1 + d2 + base) / 2.0;
    // rounding can push the product slightly negative for collinear points
    let area = (s * (s - d1) * (s - d2) * (s - base)).max(0.0).sqrt();
    2.0 * area / base
}

/// `original / simplified`, 0 if either is empty
pub fn compression_ratio(original: &[Sample], simplified: &[Sample]) -> f64 {
    if original.is_empty() || simplified.is_empty() {
        return 0.0;
    }
    original.len() as f64 / simplified.len() as f64
}

/// Largest distance from an original sample to its nearest simplified chord
pub fn simplification_error(original: &[Sample], simplified: &[Sample]) -> f64 {
    if simplified.len() < 2 {
        return 0.0;
    }
    original
        .iter()
        .map(|p| {
            simplified
                .windows(2)
                .map(|w| perpendicular_distance(p, &w[0], &w[1]))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

pub struct NoiseAwareSimplifier {
    config: SimplifierConfig,
}

impl NoiseAwareSimplifier {
    pub fn new(config: SimplifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimplifierConfig {
        &self.config
    }

    /// Interior sample farthest from the chord, with fast samples up-weighted
    fn farthest(&self, samples: &[Sample], first: usize, last: usize) -> (f64, usize) {
        let (a, b) = (&samples[first], &samples[last]);
        let mut best = (0.0, first);
        for (i, p) in samples.iter().enumerate().take(last).skip(first + 1) {
            let mut dist = perpendicular_distance(p, a, b);
            if p.speed / SPEED_REFERENCE_KMH > SPEED_FACTOR_TRIGGER {
                dist *= SPEED_WEIGHT;
            }
            if dist > best.0 {
                best = (dist, i);
            }
        }
        best
    }

    /// Mean heading change over near-straight turns in the range, scaled to [0, 1]
    pub fn estimate_noise(&self, samples: &[Sample], first: usize, last: usize) -> f64 {
        if last < first + 3 {
            return 0.0;
        }
        let (sum, count) = (first + 1..last)
            .map(|i| {
                bearing_delta(
                    bearing_between(&samples[i - 1], &samples[i]),
                    bearing_between(&samples[i], &samples[i + 1]),
                )
            })
            .filter(|d| *d < STRAIGHT_TURN_DEG)
            .fold((0.0, 0usize), |(s, c), d| (s + d, c + 1));
        if count == 0 {
            return 0.0;
        }
        (sum / count as f64 / NOISE_SCALE_DEG).min(1.0)
    }

    fn threshold(&self, samples: &[Sample], first: usize, last: usize) -> f64 {
        if self.config.consider_noise {
            self.config.epsilon_m * (1.0 + self.estimate_noise(samples, first, last))
        } else {
            self.config.epsilon_m
        }
    }

    /// Mark the samples to keep between `first` and `last` (both already kept)
    fn mark_range(&self, samples: &[Sample], first: usize, last: usize, keep: &mut [bool]) {
        let mut pending = vec![(first, last)];
        while let Some((first, last)) = pending.pop() {
            if last <= first + 1 {
                continue;
            }
            let (max_dist, idx) = self.farthest(samples, first, last);
            if max_dist > self.threshold(samples, first, last) {
                keep[idx] = true;
                pending.push((first, idx));
                pending.push((idx, last));
            }
        }
    }

    fn collect(samples: &[Sample], keep: &[bool]) -> Vec<Sample> {
        samples
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn simplify(&self, samples: &[Sample]) -> Vec<Sample> {
        if samples.len() <= self.config.min_points {
            return samples.to_vec();
        }
        let last = samples.len() - 1;
        let mut keep = vec![false; samples.len()];
        keep[0] = true;
        keep[last] = true;
        self.mark_range(samples, 0, last, &mut keep);

        let kept = Self::collect(samples, &keep);
        if kept.len() < self.config.min_points {
            return samples.to_vec();
        }
        kept
    }

    /// Simplify only between required samples; out-of-range indices are ignored
    pub fn simplify_with_preservation(
        &self,
        samples: &[Sample],
        preserve: &[usize],
    ) -> Vec<Sample> {
        if samples.len() <= self.config.min_points {
            return samples.to_vec();
        }
        let last = samples.len() - 1;
        let mut anchors: Vec<usize> = preserve.iter().copied().filter(|&i| i <= last).collect();
        anchors.push(0);
        anchors.push(last);
        anchors.sort_unstable();
        anchors.dedup();

        let mut keep = vec![false; samples.len()];
        for &i in &anchors {
            keep[i] = true;
        }
        for pair in anchors.windows(2) {
            self.mark_range(samples, pair[0], pair[1], &mut keep);
        }
        Self::collect(samples, &keep)
    }

    /// Near-equal `[start, end)` bounds, at most `workers` of at least `min_segment_len`
    fn segment_bounds(&self, len: usize, workers: usize) -> Vec<(usize, usize)> {
        let segments = workers.min(len / self.config.min_segment_len.max(1)).max(1);
        let base = len / segments;
        let extra = len % segments;
        let mut bounds = Vec::with_capacity(segments);
        let mut start = 0;
        for k in 0..segments {
            let end = start + base + usize::from(k < extra);
            bounds.push((start, end));
            start = end;
        }
        bounds
    }

    /// Simplify disjoint segments on scoped threads, then merge in order.
    ///
    /// A segment's leading sample is dropped when it lies within
    /// `join_tolerance_m` of the previous segment's last kept sample. A
    /// worker panic is re-raised on the caller.
    pub fn simplify_parallel(&self, samples: &[Sample], workers: usize) -> Vec<Sample> {
        if samples.len() <= self.config.parallel_min_len || workers <= 1 {
            return self.simplify(samples);
        }
        let bounds = self.segment_bounds(samples.len(), workers);

        let joined = crossbeam::scope(|scope| {
            let handles: Vec<_> = bounds
                .iter()
                .map(|&(start, end)| {
                    let segment = &samples[start..end];
                    scope.spawn(move |_| self.simplify(segment))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join())
                .collect::<std::thread::Result<Vec<Vec<Sample>>>>()
        });
        let parts = match joined {
            Ok(Ok(parts)) => parts,
            Ok(Err(payload)) | Err(payload) => std::panic::resume_unwind(payload),
        };

        let mut merged: Vec<Sample> = Vec::with_capacity(samples.len());
        for part in parts {
            let mut part = part.into_iter().peekable();
            let duplicate = match (merged.last(), part.peek()) {
                (Some(prev), Some(first)) => distance(prev, first) < self.config.join_tolerance_m,
                _ => false,
            };
            if duplicate {
                part.next();
            }
            merged.extend(part);
        }
        debug!(
            "parallel simplify: {} segments, {} -> {} samples",
            bounds.len(),
            samples.len(),
            merged.len()
        );
        merged
    }

    /// Sequential or segment-parallel according to `workers`
    pub fn run(&self, samples: &[Sample]) -> Vec<Sample> {
        if self.config.workers > 1 {
            self.simplify_parallel(samples, self.config.workers)
        } else {
            self.simplify(samples)
        }
    }
}

impl Default for NoiseAwareSimplifier {
    fn default() -> Self {
        Self::new(SimplifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn zigzag(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 0.0 } else { 3e-4 };
                Sample::new(i, 30.0 + wiggle + (i * i) as f64 * 1e-7, 120.0 + i as f64 * 1e-3)
            })
            .collect()
    }

    fn exact(epsilon_m: f64) -> NoiseAwareSimplifier {
        NoiseAwareSimplifier::new(SimplifierConfig {
            epsilon_m,
            consider_noise: false,
            ..SimplifierConfig::default()
        })
    }

    fn is_subsequence(out: &[Sample], input: &[Sample]) -> bool {
        let mut it = input.iter();
        out.iter().all(|o| it.any(|s| s == o))
    }

    #[test]
    fn test_perpendicular_distance() {
        let a = Sample::new(0, 0.0, 0.0);
        let b = Sample::new(1, 0.0, 0.01);
        let p = Sample::new(2, 0.001, 0.005);
        // ~111.2 m north of an east-west chord on the equator
        assert_relative_eq!(perpendicular_distance(&p, &a, &b), 111.19, epsilon = 0.1);
        // degenerate chord falls back to distance from the start
        assert_relative_eq!(
            perpendicular_distance(&p, &a, &a),
            distance(&a, &p),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_collinear_distance_is_zero_not_nan() {
        let a = Sample::new(0, 0.0, 0.0);
        let b = Sample::new(1, 0.0, 0.002);
        let p = Sample::new(2, 0.0, 0.001);
        let d = perpendicular_distance(&p, &a, &b);
        assert!(d.is_finite());
        assert!(d < 0.5);
    }

    #[test]
    fn test_short_inputs_unchanged() {
        let s = NoiseAwareSimplifier::default();
        assert!(s.simplify(&[]).is_empty());
        let two = vec![Sample::new(0, 1.0, 1.0), Sample::new(1, 2.0, 2.0)];
        assert_eq!(s.simplify(&two), two);
    }

    #[test]
    fn test_zero_epsilon_keeps_everything() {
        let input = zigzag(40);
        assert_eq!(exact(0.0).simplify(&input), input);
    }

    #[test]
    fn test_straight_line_collapses() {
        let input: Vec<Sample> = (0..50)
            .map(|i| Sample::new(i, 10.0, 20.0 + i as f64 * 1e-4))
            .collect();
        let out = exact(1.0).simplify(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], input[0]);
        assert_eq!(out[1], input[49]);
    }

    #[test]
    fn test_output_is_subsequence_within_epsilon() {
        let input = zigzag(200);
        let simplifier = exact(40.0);
        let out = simplifier.simplify(&input);
        assert!(out.len() < input.len());
        assert_eq!(out.first(), input.first());
        assert_eq!(out.last(), input.last());
        assert!(is_subsequence(&out, &input));
        assert!(simplification_error(&input, &out) <= 40.0 + 1e-9);
    }

    #[test]
    fn test_noise_estimate() {
        let s = NoiseAwareSimplifier::default();
        let straight: Vec<Sample> = (0..10)
            .map(|i| Sample::new(i, 0.0, 20.0 + i as f64 * 1e-3))
            .collect();
        assert!(s.estimate_noise(&straight, 0, 9) < 1e-6);
        assert_eq!(s.estimate_noise(&straight, 0, 2), 0.0);
        let jitter = zigzag(10);
        let noise = s.estimate_noise(&jitter, 0, 9);
        assert!((0.0..=1.0).contains(&noise));
    }

    #[test]
    fn test_preservation_keeps_required() {
        let input: Vec<Sample> = (0..30)
            .map(|i| Sample::new(i, 10.0, 20.0 + i as f64 * 1e-4))
            .collect();
        let out = exact(1.0).simplify_with_preservation(&input, &[7, 19, 500]);
        let kept: Vec<usize> = out.iter().map(|s| s.index).collect();
        assert_eq!(kept, vec![0, 7, 19, 29]);
    }

    #[test]
    fn test_parallel_matches_contract() {
        let input = zigzag(2500);
        let simplifier = exact(5.0);
        let out = simplifier.simplify_parallel(&input, 4);
        assert_eq!(out.first(), input.first());
        assert_eq!(out.last(), input.last());
        assert!(is_subsequence(&out, &input));
        assert!(out.len() <= input.len());
    }

    #[test]
    fn test_parallel_merge_drops_duplicate_boundary() {
        // 1001 samples ~111 m apart on the equator; four segments start at 251, 501 and 751
        let line = |repeat_at_boundaries: bool| -> Vec<Sample> {
            (0..1001)
                .map(|i| {
                    let repeats = [251, 501, 751].iter().filter(|&&b| b <= i).count();
                    let step = if repeat_at_boundaries { i - repeats } else { i };
                    Sample::new(i, 0.0, 20.0 + step as f64 * 1e-3)
                })
                .collect()
        };
        let simplifier = exact(1.0);
        let per_segment = |input: &[Sample]| -> usize {
            simplifier
                .segment_bounds(input.len(), 4)
                .iter()
                .map(|&(start, end)| simplifier.simplify(&input[start..end]).len())
                .sum()
        };

        let repeated = line(true);
        let out = simplifier.simplify_parallel(&repeated, 4);
        let kept: Vec<usize> = out.iter().map(|s| s.index).collect();
        assert_eq!(kept, vec![0, 250, 500, 750, 1000]);
        assert_eq!(out.len(), per_segment(&repeated) - 3);

        let distinct = line(false);
        let out = simplifier.simplify_parallel(&distinct, 4);
        assert_eq!(out.len(), per_segment(&distinct));
        let kept: Vec<usize> = out.iter().map(|s| s.index).collect();
        assert_eq!(kept, vec![0, 250, 251, 500, 501, 750, 751, 1000]);
    }

    #[test]
    fn test_parallel_small_input_is_sequential() {
        let input = zigzag(300);
        let s = exact(5.0);
        assert_eq!(s.simplify_parallel(&input, 8), s.simplify(&input));
    }

    #[test]
    fn test_segment_bounds() {
        let s = NoiseAwareSimplifier::default();
        assert_eq!(s.segment_bounds(1001, 4), vec![(0, 251), (251, 501), (501, 751), (751, 1001)]);
        // never below 100 samples per segment
        assert_eq!(s.segment_bounds(1050, 16).len(), 10);
    }

    #[test]
    fn test_compression_ratio() {
        let input = zigzag(10);
        assert_relative_eq!(compression_ratio(&input, &input[..5]), 2.0);
        assert_eq!(compression_ratio(&[], &input), 0.0);
        assert_eq!(compression_ratio(&input, &[]), 0.0);
    }
}
