//! Linear algebra type system for the trajectory smoother
//!
//! Fixed-size stack matrices for the constant-velocity model, so every
//! product in the forward and backward passes is dimension-checked at compile time.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM_CV: usize = 4; // [lat, lon, vlat, vlon]

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_POS: usize = 2; // (lat, lon)

// ===== Constant-Velocity Filter Types =====
pub type StateVec4 = SVector<f64, STATE_DIM_CV>;
pub type StateMat4 = SMatrix<f64, STATE_DIM_CV, STATE_DIM_CV>;

// Measurement types
pub type PosVec = SVector<f64, MEASURE_DIM_POS>;
pub type PosMat = SMatrix<f64, MEASURE_DIM_POS, MEASURE_DIM_POS>;

// Kalman gain (4×2)
pub type KalmanGainPos = SMatrix<f64, STATE_DIM_CV, MEASURE_DIM_POS>;

/// Below this magnitude a 2×2 determinant is treated as singular.
pub const SINGULAR_DET_EPS: f64 = 1e-8;

/// Constant-velocity transition for an elapsed time `dt` (seconds).
pub fn cv_transition(dt: f64) -> StateMat4 {
    let mut f = StateMat4::identity();
    f[(0, 2)] = dt;
    f[(1, 3)] = dt;
    f
}

/// Invert a 2×2 matrix through its explicit determinant.
///
/// Returns `None` when `|det| < SINGULAR_DET_EPS`; callers fall back to
/// skipping the update or using a zero gain.
pub fn invert_2x2(m: &PosMat) -> Option<PosMat> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if det.abs() < SINGULAR_DET_EPS {
        return None;
    }
    Some(PosMat::new(
        m[(1, 1)] / det,
        -m[(0, 1)] / det,
        -m[(1, 0)] / det,
        m[(0, 0)] / det,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transition_moves_position_by_velocity() {
        let f = cv_transition(2.0);
        let x = StateVec4::new(1.0, 2.0, 0.5, -0.25);
        let next = f * x;
        assert_relative_eq!(next[0], 2.0);
        assert_relative_eq!(next[1], 1.5);
        assert_relative_eq!(next[2], 0.5);
        assert_relative_eq!(next[3], -0.25);
    }

    #[test]
    fn test_invert_2x2() {
        let m = PosMat::new(4.0, 7.0, 2.0, 6.0);
        let inv = invert_2x2(&m).unwrap();
        let ident = m * inv;
        assert_relative_eq!(ident, PosMat::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_invert_singular_returns_none() {
        let m = PosMat::new(1.0, 2.0, 2.0, 4.0);
        assert!(invert_2x2(&m).is_none());
        assert!(invert_2x2(&PosMat::from_diagonal_element(1e-5)).is_none());
    }
}
