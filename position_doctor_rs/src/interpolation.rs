//! Gap filling with two-point cubic Hermite curves.
//!
//! With secant endpoint slopes the cubic and quadratic terms cancel, so the
//! curve is exactly linear between the gap's endpoints.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::kinematics::{
    bearing_between, elapsed_secs, normalize_longitude, refresh_motion_at, speed_kmh,
    wrap_longitude_delta,
};
use crate::types::{Corrector, Sample, SampleStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorConfig {
    pub gap_threshold_secs: f64,
    pub max_gap_secs: f64,
    pub cadence_window: usize, // samples either side of a gap
    pub max_cadence_secs: f64,
    pub max_points_per_gap: usize,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 10.0,
            max_gap_secs: 60.0,
            cadence_window: 5,
            max_cadence_secs: 100.0,
            max_points_per_gap: 100,
        }
    }
}

/// Cubic `a + b·t + c·t² + d·t³` over t ∈ [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicSegment {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl CubicSegment {
    /// Hermite form through `y1`, `y2` with endpoint slopes `m1`, `m2`
    pub fn hermite(y1: f64, y2: f64, m1: f64, m2: f64) -> Self {
        let dy = y2 - y1;
        Self {
            a: y1,
            b: m1,
            c: 3.0 * dy - 2.0 * m1 - m2,
            d: m1 + m2 - 2.0 * dy,
        }
    }

    /// Both endpoint slopes set to the secant
    pub fn secant(y1: f64, y2: f64) -> Self {
        let dy = y2 - y1;
        Self::hermite(y1, y2, dy, dy)
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.a + t * (self.b + t * (self.c + t * self.d))
    }
}

/// Curves for every axis between two samples
struct GapCurve {
    lat: CubicSegment,
    lon: CubicSegment,
    ele: Option<CubicSegment>,
}

impl GapCurve {
    fn between(a: &Sample, b: &Sample) -> Self {
        let ele = match (a.recorded_elevation(), b.recorded_elevation()) {
            (Some(e1), Some(e2)) => Some(CubicSegment::secant(e1, e2)),
            _ => None,
        };
        Self {
            lat: CubicSegment::secant(a.latitude, b.latitude),
            // the short way round, so a gap across ±180° stays local
            lon: CubicSegment::secant(
                a.longitude,
                a.longitude + wrap_longitude_delta(b.longitude - a.longitude),
            ),
            ele,
        }
    }

    fn synthesize(&self, index: usize, t: f64, timestamp: Option<f64>) -> Sample {
        let lon = normalize_longitude(self.lon.eval(t));
        let mut s = Sample::new(index, self.lat.eval(t), lon);
        s.elevation = self.ele.map(|c| c.eval(t));
        s.timestamp = timestamp;
        s.status = SampleStatus::Interpolated;
        s.is_interpolated = true;
        s.corrected_by = Some(Corrector::Interpolator);
        s
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GapFillReport {
    pub gaps_filled: usize,
    pub synthesized: usize,
    pub superseded: usize,
    pub marked_missing: usize,
}

pub struct GapInterpolator {
    config: InterpolatorConfig,
}

impl GapInterpolator {
    pub fn new(config: InterpolatorConfig) -> Self {
        Self { config }
    }

    /// Inclusive (start, end) ranges of consecutive over-threshold intervals
    pub fn find_gaps(&self, samples: &[Sample]) -> Vec<(usize, usize)> {
        let mut gaps = Vec::new();
        let mut open: Option<(usize, usize)> = None;
        for i in 1..samples.len() {
            let Some(dt) = elapsed_secs(&samples[i - 1], &samples[i]) else {
                continue;
            };
            if dt > self.config.gap_threshold_secs {
                open = Some(match open {
                    Some((start, _)) => (start, i),
                    None => (i - 1, i),
                });
            } else if let Some(gap) = open.take() {
                gaps.push(gap);
            }
        }
        gaps.extend(open);
        gaps
    }

    /// Mean interval in (0, max_cadence_secs) over a window around the gap
    fn local_cadence(&self, samples: &[Sample], start: usize, end: usize) -> f64 {
        let from = start.saturating_sub(self.config.cadence_window);
        let to = (end + self.config.cadence_window).min(samples.len() - 1);
        let (sum, count) = (from + 1..=to)
            .filter_map(|i| elapsed_secs(&samples[i - 1], &samples[i]))
            .filter(|dt| *dt > 0.0 && *dt < self.config.max_cadence_secs)
            .fold((0.0, 0usize), |(s, c), dt| (s + dt, c + 1));
        if count == 0 {
            1.0
        } else {
            sum / count as f64
        }
    }

    fn synthesize_gap(
        &self,
        samples: &[Sample],
        start: usize,
        end: usize,
        duration: f64,
    ) -> Vec<Sample> {
        let cadence = self.local_cadence(samples, start, end);
        let count = ((duration / cadence) as usize).clamp(1, self.config.max_points_per_gap);
        let (a, b) = (&samples[start], &samples[end]);
        let curve = GapCurve::between(a, b);
        let step = duration / (count + 1) as f64;

        let mut out: Vec<Sample> = Vec::with_capacity(count);
        for k in 1..=count {
            let t = k as f64 / (count + 1) as f64;
            let timestamp = a.timestamp.map(|t0| t0 + step * k as f64);
            let mut s = curve.synthesize(a.index, t, timestamp);
            let prev = out.last().unwrap_or(a);
            s.speed = speed_kmh(prev, &s);
            s.bearing = bearing_between(prev, &s);
            out.push(s);
        }
        out
    }

    /// Fill every gap; returns the new trajectory and what was done.
    ///
    /// Original samples are kept except the interior of a filled merged gap,
    /// which the synthesized run replaces.
    pub fn fill_gaps(&self, samples: &[Sample]) -> (Vec<Sample>, GapFillReport) {
        let mut report = GapFillReport::default();
        if samples.len() < 2 {
            return (samples.to_vec(), report);
        }
        let gaps = self.find_gaps(samples);
        if gaps.is_empty() {
            return (samples.to_vec(), report);
        }

        let mut result = Vec::with_capacity(samples.len() + gaps.len() * 10);
        let mut cursor = 0;
        for (start, end) in gaps {
            result.extend_from_slice(&samples[cursor..=start]);
            let duration = elapsed_secs(&samples[start], &samples[end]).unwrap_or(0.0);

            if duration <= 0.0 || duration > self.config.max_gap_secs {
                warn!(
                    "gap {}..{} ({:.1}s) too long to fill, marking missing",
                    start, end, duration
                );
                for s in &samples[start + 1..end] {
                    let mut s = s.clone();
                    s.status = SampleStatus::Missing;
                    result.push(s);
                    report.marked_missing += 1;
                }
            } else {
                let filled = self.synthesize_gap(samples, start, end, duration);
                report.gaps_filled += 1;
                report.synthesized += filled.len();
                report.superseded += end - start - 1;
                result.extend(filled);
            }

            result.push(samples[end].clone());
            let closing = result.len() - 1;
            refresh_motion_at(&mut result, closing);
            cursor = end + 1;
        }
        result.extend_from_slice(&samples[cursor..]);

        debug!(
            "interpolator filled {} gaps with {} samples",
            report.gaps_filled, report.synthesized
        );
        (result, report)
    }

    pub fn interpolate(&self, samples: &[Sample]) -> Vec<Sample> {
        self.fill_gaps(samples).0
    }

    /// Replace the samples at `indices` with the midpoint of their neighbours.
    ///
    /// Boundary indices and indices next to an interpolated sample are skipped.
    pub fn interpolate_indices(&self, samples: &[Sample], indices: &[usize]) -> Vec<Sample> {
        let mut result = samples.to_vec();
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        for idx in sorted {
            if idx == 0 || idx + 1 >= result.len() {
                continue;
            }
            let (prev, next) = (&result[idx - 1], &result[idx + 1]);
            if prev.is_interpolated || next.is_interpolated {
                continue;
            }

            let timestamp = match (prev.timestamp, next.timestamp) {
                (Some(t1), Some(t2)) => Some(t1 + (t2 - t1) / 2.0),
                (t1, _) => t1,
            };
            let mut s =
                GapCurve::between(prev, next).synthesize(result[idx].index, 0.5, timestamp);
            s.speed = speed_kmh(prev, next);
            s.bearing = bearing_between(prev, next);
            let replaced = &result[idx];
            s.original_latitude = Some(replaced.original_latitude.unwrap_or(replaced.latitude));
            s.original_longitude = Some(replaced.original_longitude.unwrap_or(replaced.longitude));
            result[idx] = s;
        }
        result
    }
}

impl Default for GapInterpolator {
    fn default() -> Self {
        Self::new(InterpolatorConfig::default())
    }
}
