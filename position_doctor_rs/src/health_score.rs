//! Multi-dimensional trajectory health score.
//!
//! Four sub-scores in [0, 100] (completeness, accuracy, consistency,
//! smoothness), each rounded, then weighted into a rounded total and a rating.

use serde::{Deserialize, Serialize};

use crate::kinematics::{bearing_between, bearing_delta, haversine_distance};
use crate::types::{Anomaly, HealthScore, Rating, Sample, SampleStatus, ScoreDetail, Severity};

const NEUTRAL_SCORE: f64 = 50.0;
const HIGH_SEVERITY_PENALTY: f64 = 2.0;
const DEVIATION_SCALE_M: f64 = 10.0;
const MAX_DEVIATION_PENALTY: f64 = 20.0;
const ABRUPT_SPEED_CHANGE_KMH: f64 = 30.0;
const CALM_TURN_DEG: f64 = 10.0;
const SHARP_TURN_DEG: f64 = 30.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub smoothness: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            completeness: 0.25,
            accuracy: 0.25,
            consistency: 0.25,
            smoothness: 0.25,
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0).round()
}

fn ratio(count: usize, total: usize) -> f64 {
    count as f64 / total as f64
}

pub struct HealthScorer {
    weights: HealthWeights,
}

impl HealthScorer {
    pub fn new(weights: HealthWeights) -> Self {
        Self { weights }
    }

    pub fn calculate(&self, samples: &[Sample], anomalies: &[Anomaly]) -> HealthScore {
        let completeness = self.completeness(samples);
        let accuracy = self.accuracy(samples, anomalies);
        let consistency = self.consistency(samples);
        let smoothness = self.smoothness(samples);

        let weighted = [&completeness, &accuracy, &consistency, &smoothness]
            .iter()
            .map(|d| d.score * d.weight)
            .sum::<f64>();
        let total = clamp_score(weighted);

        HealthScore {
            total,
            rating: Rating::from_total(total),
            completeness,
            accuracy,
            consistency,
            smoothness,
        }
    }

    /// Presence of timestamps (40%), elevations (30%) and non-missing samples (30%)
    pub fn completeness(&self, samples: &[Sample]) -> ScoreDetail {
        let weight = self.weights.completeness;
        if samples.is_empty() {
            return ScoreDetail {
                score: 0.0,
                weight,
                description: "No data available".to_string(),
            };
        }
        let n = samples.len();
        let no_time = samples.iter().filter(|s| s.timestamp.is_none()).count();
        let no_elevation = samples.iter().filter(|s| !s.has_elevation()).count();
        let missing = samples
            .iter()
            .filter(|s| s.status == SampleStatus::Missing)
            .count();

        let score = 100.0
            * (0.4 * (1.0 - ratio(no_time, n))
                + 0.3 * (1.0 - ratio(no_elevation, n))
                + 0.3 * (1.0 - ratio(missing, n)));
        ScoreDetail {
            score: clamp_score(score),
            weight,
            description: "Data completeness ratio (time, elevation, gaps)".to_string(),
        }
    }

    /// Mean original-to-corrected distance over samples that were moved
    pub fn average_deviation(samples: &[Sample]) -> f64 {
        let (sum, count) = samples
            .iter()
            .filter_map(|s| match (s.original_latitude, s.original_longitude) {
                (Some(lat), Some(lon)) => {
                    Some(haversine_distance(lat, lon, s.latitude, s.longitude))
                }
                _ => None,
            })
            .fold((0.0, 0usize), |(sum, c), d| (sum + d, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Anomaly ratio, high-severity penalty and correction-distance penalty
    pub fn accuracy(&self, samples: &[Sample], anomalies: &[Anomaly]) -> ScoreDetail {
        let weight = self.weights.accuracy;
        if samples.is_empty() {
            return ScoreDetail {
                score: 0.0,
                weight,
                description: "No data available".to_string(),
            };
        }
        let anomalous: usize = anomalies.iter().map(|a| a.count).sum();
        let high: usize = anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .map(|a| a.count)
            .sum();

        let mut score = 100.0 * (1.0 - ratio(anomalous, samples.len()));
        score -= high as f64 * HIGH_SEVERITY_PENALTY;
        let deviation = Self::average_deviation(samples);
        if deviation > 0.0 {
            score -= (deviation / DEVIATION_SCALE_M).min(MAX_DEVIATION_PENALTY);
        }

        ScoreDetail {
            score: clamp_score(score),
            weight,
            description: "Position accuracy assessment (anomalies, deviations)".to_string(),
        }
    }

    /// Time ordering (60%) and abrupt speed changes (40%)
    pub fn consistency(&self, samples: &[Sample]) -> ScoreDetail {
        let weight = self.weights.consistency;
        if samples.len() < 2 {
            return ScoreDetail {
                score: NEUTRAL_SCORE,
                weight,
                description: "Insufficient data for consistency check".to_string(),
            };
        }
        let n = samples.len();
        let out_of_order = samples
            .windows(2)
            .filter(|w| matches!((w[0].timestamp, w[1].timestamp), (Some(a), Some(b)) if b < a))
            .count();
        let abrupt = samples
            .windows(2)
            .skip(1)
            .filter(|w| {
                w[0].speed > 0.0
                    && w[1].speed > 0.0
                    && (w[1].speed - w[0].speed).abs() > ABRUPT_SPEED_CHANGE_KMH
            })
            .count();

        let time_order = 100.0 * (1.0 - ratio(out_of_order, n));
        let speed_consistency = 100.0 * (1.0 - ratio(abrupt, n));
        ScoreDetail {
            score: clamp_score(0.6 * time_order + 0.4 * speed_consistency),
            weight,
            description: "Temporal consistency check (time order, speed changes)".to_string(),
        }
    }

    /// Heading changes between consecutive legs
    pub fn turn_angles(samples: &[Sample]) -> Vec<f64> {
        samples
            .windows(3)
            .map(|w| bearing_delta(bearing_between(&w[0], &w[1]), bearing_between(&w[1], &w[2])))
            .collect()
    }

    /// calm-sharp-calm or sharp-calm-sharp triples
    pub fn count_oscillations(turns: &[f64]) -> usize {
        turns
            .windows(3)
            .filter(|w| {
                (w[0] < CALM_TURN_DEG && w[1] > SHARP_TURN_DEG && w[2] < CALM_TURN_DEG)
                    || (w[0] > SHARP_TURN_DEG && w[1] < CALM_TURN_DEG && w[2] > SHARP_TURN_DEG)
            })
            .count()
    }

    /// 100 − 3·stddev(turn angles) − 2·oscillations
    pub fn smoothness(&self, samples: &[Sample]) -> ScoreDetail {
        let weight = self.weights.smoothness;
        if samples.len() < 3 {
            return ScoreDetail {
                score: NEUTRAL_SCORE,
                weight,
                description: "Insufficient data for smoothness check".to_string(),
            };
        }
        let turns = Self::turn_angles(samples);
        let mean = turns.iter().sum::<f64>() / turns.len() as f64;
        let variance = turns.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / turns.len() as f64;
        let score =
            100.0 - 3.0 * variance.sqrt() - 2.0 * Self::count_oscillations(&turns) as f64;

        ScoreDetail {
            score: clamp_score(score),
            weight,
            description: "Trajectory smoothness score (angle changes, oscillations)".to_string(),
        }
    }
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new(HealthWeights::default())
    }
}
