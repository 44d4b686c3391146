//! Raw point ingestion.
//!
//! Rows are `[latitude, longitude, unix_time, elevation?]`.

use serde::Deserialize;

use crate::error::{TrajResult, TrajectoryError};
use crate::kinematics::recompute_kinematics;
use crate::pipeline::PipelineConfig;
use crate::types::Sample;

pub const MIN_POINTS: usize = 2;
pub const MAX_POINTS: usize = 100_000;
const MIN_TIMESTAMP: f64 = 946_684_800.0; // 2000-01-01T00:00:00Z
const MAX_TIMESTAMP: f64 = 4_102_444_800.0; // 2100-01-01T00:00:00Z

/// Input document: `{"points": [...], "options": {...}}` or a bare point array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PointsFile {
    Document {
        points: Vec<Vec<f64>>,
        #[serde(default)]
        options: Option<PipelineConfig>,
    },
    Bare(Vec<Vec<f64>>),
}

impl PointsFile {
    pub fn points(&self) -> &[Vec<f64>] {
        match self {
            PointsFile::Document { points, .. } => points,
            PointsFile::Bare(points) => points,
        }
    }

    pub fn into_parts(self) -> (Vec<Vec<f64>>, Option<PipelineConfig>) {
        match self {
            PointsFile::Document { points, options } => (points, options),
            PointsFile::Bare(points) => (points, None),
        }
    }
}

fn row_is_valid(row: &[f64]) -> bool {
    if row.len() < 3 || row.iter().any(|v| !v.is_finite()) {
        return false;
    }
    (-90.0..=90.0).contains(&row[0])
        && (-180.0..=180.0).contains(&row[1])
        && (MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&row[2])
}

/// Build samples from raw rows, reporting every bad row at once
pub fn samples_from_points(points: &[Vec<f64>]) -> TrajResult<Vec<Sample>> {
    if points.len() < MIN_POINTS {
        return Err(TrajectoryError::TooFewPoints {
            count: points.len(),
            min: MIN_POINTS,
        });
    }
    if points.len() > MAX_POINTS {
        return Err(TrajectoryError::TooManyPoints {
            count: points.len(),
            max: MAX_POINTS,
        });
    }

    let invalid: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, row)| !row_is_valid(row))
        .map(|(i, _)| i)
        .collect();
    if !invalid.is_empty() {
        return Err(TrajectoryError::InvalidPoints { indices: invalid });
    }

    let mut samples: Vec<Sample> = points
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut sample = Sample::new(i, row[0], row[1]).with_timestamp(row[2]);
            sample.elevation = row.get(3).copied();
            sample
        })
        .collect();
    recompute_kinematics(&mut samples);
    Ok(samples)
}
