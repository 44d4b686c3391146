pub mod adaptive_rts;
pub mod drift_correction;

pub use adaptive_rts::{AdaptiveRts, FilterState, SmootherConfig};
