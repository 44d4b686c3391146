//! GPS trajectory diagnosis and correction.
//!
//! Detects anomalies in a recorded trajectory, repairs it (adaptive RTS
//! smoothing, gap interpolation, noise-aware simplification, outlier
//! removal) and scores its health.

pub mod detector;
pub mod error;
pub mod filters;
pub mod health_score;
pub mod input;
pub mod interpolation;
pub mod kinematics;
pub mod pipeline;
pub mod simplify;
pub mod stats;
pub mod types;

pub use error::{TrajResult, TrajectoryError};
pub use pipeline::{DiagnosisReport, Pipeline, PipelineConfig};
pub use types::{Anomaly, AnomalyKind, HealthScore, Sample, SampleStatus, Severity};
