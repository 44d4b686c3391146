// pipeline.rs: diagnosis and correction pipeline
//
// Pure batch computation: samples in, report out. No I/O, no shared state
// between runs. Detection always runs on the input trajectory; correction
// stages run in the fixed order smoother → interpolator → simplifier →
// outlier removal, each behind its own toggle.

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::detector::{annotate_statuses, detect_all, DetectorConfig};
use crate::error::{TrajResult, TrajectoryError};
use crate::filters::{AdaptiveRts, SmootherConfig};
use crate::health_score::{HealthScorer, HealthWeights};
use crate::interpolation::{GapInterpolator, InterpolatorConfig};
use crate::kinematics::recompute_kinematics;
use crate::simplify::{compression_ratio, NoiseAwareSimplifier, SimplifierConfig};
use crate::stats::TrajectoryStats;
use crate::types::{Anomaly, Corrector, HealthScore, Sample, SampleStatus, Severity};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub smoothing: bool,
    pub interpolation: bool,
    pub simplification: bool,
    pub outlier_removal: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            smoothing: true,
            interpolation: true,
            simplification: true,
            outlier_removal: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // ── Detection ──
    pub detector: DetectorConfig,

    // ── Correction stages ──
    pub smoother: SmootherConfig,
    pub interpolator: InterpolatorConfig,
    pub simplifier: SimplifierConfig,
    pub stages: StageToggles,

    // ── Scoring ──
    pub health: HealthWeights,
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionCounts {
    pub interpolated_added: usize,
    pub simplified_removed: usize,
    pub outliers_removed: usize,
}

/// What one executed stage did
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageSummary {
    Smoothing {
        fixed_indices: Vec<usize>,
    },
    Interpolation {
        gaps_filled: usize,
        added: usize,
        marked_missing: usize,
    },
    Simplification {
        removed: usize,
        compression_ratio: f64,
    },
    OutlierRemoval {
        removed_indices: Vec<usize>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub original_stats: TrajectoryStats,
    pub corrected_stats: TrajectoryStats,
    pub anomalies: Vec<Anomaly>,
    pub corrections: CorrectionCounts,
    pub stages: Vec<StageSummary>,
    pub normal_count: usize,
    pub anomalous_count: usize,
    pub health: HealthScore,
    pub samples: Vec<Sample>,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Coordinates finite and in range, timestamps finite when present
pub fn validate_samples(samples: &[Sample]) -> TrajResult<()> {
    for (index, s) in samples.iter().enumerate() {
        if !s.latitude.is_finite() || !s.longitude.is_finite() {
            return Err(TrajectoryError::NonFiniteCoordinate { index });
        }
        if !(-90.0..=90.0).contains(&s.latitude) {
            return Err(TrajectoryError::LatitudeOutOfRange {
                index,
                value: s.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&s.longitude) {
            return Err(TrajectoryError::LongitudeOutOfRange {
                index,
                value: s.longitude,
            });
        }
        if matches!(s.timestamp, Some(t) if !t.is_finite()) {
            return Err(TrajectoryError::NonFiniteTimestamp { index });
        }
    }
    Ok(())
}

/// Corrected coordinates must stay finite and in range
fn check_corrected(samples: &[Sample], stage: &'static str) -> TrajResult<()> {
    let bad = samples.iter().position(|s| {
        !(-90.0..=90.0).contains(&s.latitude) || !(-180.0..=180.0).contains(&s.longitude)
    });
    match bad {
        Some(index) => Err(TrajectoryError::CorrectedOutOfRange { stage, index }),
        None => Ok(()),
    }
}

fn is_anomalous(status: SampleStatus) -> bool {
    !matches!(status, SampleStatus::Normal | SampleStatus::Interpolated)
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Diagnose and correct a trajectory.
    ///
    /// Sample indices are reassigned to input positions, so anomaly indices
    /// and `Sample::index` refer to the same thing.
    pub fn run(&self, mut samples: Vec<Sample>) -> TrajResult<DiagnosisReport> {
        validate_samples(&samples)?;

        for (i, s) in samples.iter_mut().enumerate() {
            s.index = i;
        }
        recompute_kinematics(&mut samples);

        let original_stats = TrajectoryStats::from_samples(&samples);
        let anomalies = detect_all(&samples, &self.config.detector);
        let flagged = annotate_statuses(&mut samples, &anomalies);
        debug!("{} anomalies, {} samples flagged", anomalies.len(), flagged);

        let mut corrections = CorrectionCounts::default();
        let mut stages = Vec::new();
        let toggles = &self.config.stages;

        if toggles.smoothing {
            samples = self.smooth(&samples, &mut stages);
            check_corrected(&samples, "smoothing")?;
        }
        if toggles.interpolation {
            samples = self.interpolate(&samples, &mut corrections, &mut stages);
            check_corrected(&samples, "interpolation")?;
        }
        if toggles.simplification {
            samples = self.simplify(&samples, &mut corrections, &mut stages);
        }
        if toggles.outlier_removal {
            samples = Self::remove_outliers(samples, &anomalies, &mut corrections, &mut stages);
        }

        let corrected_stats = TrajectoryStats::from_samples(&samples);
        let anomalous_count = samples.iter().filter(|s| is_anomalous(s.status)).count();
        let normal_count = samples
            .iter()
            .filter(|s| s.status == SampleStatus::Normal)
            .count();
        let health = HealthScorer::new(self.config.health.clone()).calculate(&samples, &anomalies);

        info!(
            "diagnosis: {} -> {} samples, {} anomalies, health {} ({:?})",
            original_stats.sample_count,
            corrected_stats.sample_count,
            anomalies.len(),
            health.total,
            health.rating
        );

        Ok(DiagnosisReport {
            original_stats,
            corrected_stats,
            anomalies,
            corrections,
            stages,
            normal_count,
            anomalous_count,
            health,
            samples,
        })
    }

    fn smooth(&self, samples: &[Sample], stages: &mut Vec<StageSummary>) -> Vec<Sample> {
        let smoothed = AdaptiveRts::new(self.config.smoother.clone()).smooth(samples);
        let fixed_indices: Vec<usize> = smoothed
            .iter()
            .filter(|s| s.corrected_by == Some(Corrector::Smoother))
            .map(|s| s.index)
            .collect();
        debug!("smoothing: {} samples corrected", fixed_indices.len());
        stages.push(StageSummary::Smoothing { fixed_indices });
        smoothed
    }

    fn interpolate(
        &self,
        samples: &[Sample],
        corrections: &mut CorrectionCounts,
        stages: &mut Vec<StageSummary>,
    ) -> Vec<Sample> {
        let (filled, report) =
            GapInterpolator::new(self.config.interpolator.clone()).fill_gaps(samples);
        corrections.interpolated_added = report.synthesized;
        stages.push(StageSummary::Interpolation {
            gaps_filled: report.gaps_filled,
            added: report.synthesized,
            marked_missing: report.marked_missing,
        });
        filled
    }

    fn simplify(
        &self,
        samples: &[Sample],
        corrections: &mut CorrectionCounts,
        stages: &mut Vec<StageSummary>,
    ) -> Vec<Sample> {
        let simplified = NoiseAwareSimplifier::new(self.config.simplifier.clone()).run(samples);
        let removed = samples.len().saturating_sub(simplified.len());
        corrections.simplified_removed = removed;
        debug!("simplification: {} -> {}", samples.len(), simplified.len());
        stages.push(StageSummary::Simplification {
            removed,
            compression_ratio: compression_ratio(samples, &simplified),
        });
        simplified
    }

    /// Drop every recorded sample named by a high-severity anomaly
    fn remove_outliers(
        samples: Vec<Sample>,
        anomalies: &[Anomaly],
        corrections: &mut CorrectionCounts,
        stages: &mut Vec<StageSummary>,
    ) -> Vec<Sample> {
        let outliers: HashSet<usize> = anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .flat_map(|a| a.indices.iter().copied())
            .collect();

        let mut removed_indices = Vec::new();
        let kept: Vec<Sample> = samples
            .into_iter()
            .filter(|s| {
                let drop = !s.is_interpolated && outliers.contains(&s.index);
                if drop {
                    removed_indices.push(s.index);
                }
                !drop
            })
            .collect();

        corrections.outliers_removed = removed_indices.len();
        debug!("outlier removal: {} samples dropped", removed_indices.len());
        stages.push(StageSummary::OutlierRemoval { removed_indices });
        kept
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::detect_jumps;
    use crate::kinematics::{haversine_distance, normalize_longitude};
    use crate::types::AnomalyKind;

    const T0: f64 = 1_700_000_000.0;

    fn drifting_line_with_spike() -> Vec<Sample> {
        let mut samples: Vec<Sample> = (0..10)
            .map(|i| {
                let step = i as f64 * 1e-4;
                Sample::new(i, 39.9 + step, 116.4 + step).with_timestamp(T0 + i as f64)
            })
            .collect();
        samples[5].latitude += 0.001;
        samples[5].longitude += 0.001;
        recompute_kinematics(&mut samples);
        samples
    }

    fn all_off() -> StageToggles {
        StageToggles {
            smoothing: false,
            interpolation: false,
            simplification: false,
            outlier_removal: false,
        }
    }

    #[test]
    fn test_spike_detected_and_pulled_in() {
        let samples = drifting_line_with_spike();
        let detector = DetectorConfig {
            max_jump_m: 100.0,
            ..Default::default()
        };
        let jumps = detect_jumps(&samples, &detector);
        assert!(jumps.iter().any(|a| a.indices.contains(&5)));

        let smoothed = AdaptiveRts::default().smooth(&samples);
        let (ref_lat, ref_lon) = (39.9 + 5e-4, 116.4 + 5e-4);
        let raw = haversine_distance(samples[5].latitude, samples[5].longitude, ref_lat, ref_lon);
        let fixed =
            haversine_distance(smoothed[5].latitude, smoothed[5].longitude, ref_lat, ref_lon);
        assert!(fixed < raw);
    }

    #[test]
    fn test_rejects_invalid_samples() {
        let pipeline = Pipeline::default();
        let mut samples = drifting_line_with_spike();
        samples[3].latitude = 91.0;
        assert_eq!(
            pipeline.run(samples).err(),
            Some(TrajectoryError::LatitudeOutOfRange { index: 3, value: 91.0 })
        );

        let mut samples = drifting_line_with_spike();
        samples[2].longitude = f64::NAN;
        assert_eq!(
            pipeline.run(samples).err(),
            Some(TrajectoryError::NonFiniteCoordinate { index: 2 })
        );

        let mut samples = drifting_line_with_spike();
        samples[4].timestamp = Some(f64::INFINITY);
        assert_eq!(
            pipeline.run(samples).err(),
            Some(TrajectoryError::NonFiniteTimestamp { index: 4 })
        );
    }

    #[test]
    fn test_all_stages_off_keeps_samples() {
        let samples = drifting_line_with_spike();
        let config = PipelineConfig {
            stages: all_off(),
            ..Default::default()
        };
        let report = Pipeline::new(config).run(samples.clone()).unwrap();
        assert!(report.stages.is_empty());
        assert_eq!(report.corrections, CorrectionCounts::default());
        assert_eq!(report.samples.len(), samples.len());
        for (a, b) in report.samples.iter().zip(&samples) {
            assert_eq!(a.latitude, b.latitude);
            assert_eq!(a.longitude, b.longitude);
        }
        assert_eq!(
            report.normal_count + report.anomalous_count,
            report.samples.len()
        );
    }

    #[test]
    fn test_stage_order_and_counts() {
        let samples = drifting_line_with_spike();
        let report = Pipeline::default().run(samples).unwrap();

        let names: Vec<&str> = report
            .stages
            .iter()
            .map(|s| match s {
                StageSummary::Smoothing { .. } => "smoothing",
                StageSummary::Interpolation { .. } => "interpolation",
                StageSummary::Simplification { .. } => "simplification",
                StageSummary::OutlierRemoval { .. } => "outlier_removal",
            })
            .collect();
        assert_eq!(
            names,
            vec!["smoothing", "interpolation", "simplification", "outlier_removal"]
        );
        assert_eq!(report.original_stats.sample_count, 10);
        assert_eq!(
            report.corrected_stats.sample_count,
            10 + report.corrections.interpolated_added
                - report.corrections.simplified_removed
                - report.corrections.outliers_removed
        );
        assert!((0.0..=100.0).contains(&report.health.total));
    }

    #[test]
    fn test_gap_filled_by_interpolation() {
        let mut samples: Vec<Sample> = (0..10)
            .map(|i| Sample::new(i, 10.0, 20.0 + i as f64 * 5e-5).with_timestamp(T0 + i as f64))
            .collect();
        // 30 s hole after sample 9, ~100 m further on
        samples.push(Sample::new(10, 10.0, 20.0 + 9.0 * 5e-5 + 9e-4).with_timestamp(T0 + 39.0));
        let config = PipelineConfig {
            stages: StageToggles {
                interpolation: true,
                ..all_off()
            },
            ..Default::default()
        };
        let report = Pipeline::new(config).run(samples).unwrap();
        assert!(report.corrections.interpolated_added > 0);
        assert!(report.samples.iter().any(|s| s.is_interpolated));
        assert!(matches!(
            report.stages.as_slice(),
            [StageSummary::Interpolation { gaps_filled: 1, .. }]
        ));
        assert!(report.anomalies.iter().any(|a| a.kind == AnomalyKind::Missing));
    }

    #[test]
    fn test_outlier_removal_drops_high_severity_samples() {
        let samples: Vec<Sample> = (0..4)
            .map(|i| Sample::new(i, 1.0, 1.0 + i as f64 * 1e-4).with_timestamp(T0 + i as f64))
            .collect();
        let anomalies = vec![Anomaly {
            kind: AnomalyKind::Jump,
            description: String::new(),
            count: 1,
            severity: Severity::High,
            indices: vec![2],
            gaps: Vec::new(),
        }];
        let mut counts = CorrectionCounts::default();
        let mut stages = Vec::new();
        let kept = Pipeline::remove_outliers(samples, &anomalies, &mut counts, &mut stages);
        assert_eq!(kept.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(counts.outliers_removed, 1);
        assert_eq!(
            stages,
            vec![StageSummary::OutlierRemoval {
                removed_indices: vec![2]
            }]
        );
    }

    #[test]
    fn test_trace_across_antimeridian() {
        let mut samples: Vec<Sample> = (0..10)
            .map(|i| {
                let lon = normalize_longitude(179.99995 + i as f64 * 1e-5);
                Sample::new(i, -17.0, lon).with_timestamp(T0 + i as f64)
            })
            .collect();
        // a 20 s hole straddling the dateline for the interpolator
        for (k, s) in samples.iter_mut().enumerate().skip(6) {
            s.timestamp = Some(T0 + 20.0 + k as f64);
        }
        let report = Pipeline::default().run(samples).unwrap();
        assert!(report
            .samples
            .iter()
            .all(|s| (-180.0..=180.0).contains(&s.longitude)));
        assert!(report.samples.iter().all(|s| s.longitude.abs() > 179.999));
        assert!(report.corrected_stats.total_distance_m < 50.0);
    }

    #[test]
    fn test_out_of_range_correction_is_an_error() {
        let mut samples = drifting_line_with_spike();
        assert_eq!(check_corrected(&samples, "smoothing"), Ok(()));
        samples[7].longitude = 180.5;
        assert_eq!(
            check_corrected(&samples, "smoothing"),
            Err(TrajectoryError::CorrectedOutOfRange {
                stage: "smoothing",
                index: 7
            })
        );
    }

    #[test]
    fn test_partial_config_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"stages": {"simplification": false}}"#).unwrap();
        assert!(!config.stages.simplification);
        assert!(config.stages.smoothing);
        assert_eq!(config.simplifier.epsilon_m, 1.0);
    }
}
