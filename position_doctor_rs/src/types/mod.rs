pub mod linalg;

use serde::{Deserialize, Serialize};

/// Classification carried by every sample through the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    #[default]
    Normal,
    Drift,
    Jump,
    SpeedAnomaly,
    AccelerationAnomaly,
    Missing,
    Interpolated,
}

/// Stage that last moved a sample's coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corrector {
    Smoother,
    Interpolator,
}

/// One timestamped position with derived kinematics.
///
/// `speed` is km/h and `bearing` degrees against the previous sample;
/// `acceleration` is m/s² centred on this sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>, // meters, non-positive means "not recorded"
    pub timestamp: Option<f64>, // unix seconds
    #[serde(default)]
    pub status: SampleStatus,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub bearing: f64,
    #[serde(default)]
    pub acceleration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_by: Option<Corrector>,
    #[serde(default)]
    pub is_interpolated: bool,
}

impl Sample {
    pub fn new(index: usize, latitude: f64, longitude: f64) -> Self {
        Self {
            index,
            latitude,
            longitude,
            elevation: None,
            timestamp: None,
            status: SampleStatus::Normal,
            speed: 0.0,
            bearing: 0.0,
            acceleration: None,
            original_latitude: None,
            original_longitude: None,
            corrected_by: None,
            is_interpolated: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Elevation if one was actually recorded
    pub fn recorded_elevation(&self) -> Option<f64> {
        self.elevation.filter(|e| *e > 0.0)
    }

    pub fn has_elevation(&self) -> bool {
        self.recorded_elevation().is_some()
    }

    /// Record the pre-correction position once; later corrections keep the first
    pub fn remember_original(&mut self) {
        if self.original_latitude.is_none() {
            self.original_latitude = Some(self.latitude);
            self.original_longitude = Some(self.longitude);
        }
    }
}

/// Anomaly categories, in detection order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Speed,
    Acceleration,
    Jump,
    Drift,
    Missing,
    Density,
}

impl AnomalyKind {
    /// Status written onto samples flagged by this category, if any
    pub fn sample_status(self) -> Option<SampleStatus> {
        match self {
            AnomalyKind::Speed => Some(SampleStatus::SpeedAnomaly),
            AnomalyKind::Acceleration => Some(SampleStatus::AccelerationAnomaly),
            AnomalyKind::Jump => Some(SampleStatus::Jump),
            AnomalyKind::Drift => Some(SampleStatus::Drift),
            AnomalyKind::Missing | AnomalyKind::Density => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Inclusive range of sample indices spanning a timestamp gap
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GapRange {
    pub start: usize,
    pub end: usize,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub description: String,
    pub count: usize,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<GapRange>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Rating {
    pub fn from_total(total: f64) -> Self {
        if total >= 85.0 {
            Rating::Excellent
        } else if total >= 70.0 {
            Rating::Good
        } else if total >= 50.0 {
            Rating::Fair
        } else {
            Rating::Poor
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub score: f64, // 0..=100
    pub weight: f64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub total: f64,
    pub rating: Rating,
    pub completeness: ScoreDetail,
    pub accuracy: ScoreDetail,
    pub consistency: ScoreDetail,
    pub smoothness: ScoreDetail,
}
