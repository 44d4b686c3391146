use thiserror::Error;

/// Trajectory ingestion and validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("Sample {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },

    #[error("Sample {index} latitude {value} outside [-90, 90]")]
    LatitudeOutOfRange { index: usize, value: f64 },

    #[error("Sample {index} longitude {value} outside [-180, 180]")]
    LongitudeOutOfRange { index: usize, value: f64 },

    #[error("Sample {index} has a non-finite timestamp")]
    NonFiniteTimestamp { index: usize },

    #[error("Invalid points at indices {indices:?}")]
    InvalidPoints { indices: Vec<usize> },

    #[error("Too few points: {count} (minimum {min})")]
    TooFewPoints { count: usize, min: usize },

    #[error("Too many points: {count} (maximum {max})")]
    TooManyPoints { count: usize, max: usize },

    #[error("{stage} produced out-of-range coordinates at sample {index}")]
    CorrectedOutOfRange { stage: &'static str, index: usize },
}

/// Result type for trajectory operations
pub type TrajResult<T> = Result<T, TrajectoryError>;
