//! Adaptive Rauch-Tung-Striebel smoother
//!
//! Constant-velocity model over [lat, lon, vlat, vlon] in degrees. The
//! forward Kalman pass estimates process and measurement noise online with a
//! variational-Bayes (α, β) pair; the backward RTS pass blends each forward
//! estimate with its smoothed successor.
use log::debug;
use serde::{Deserialize, Serialize};

use super::drift_correction::correct_drift_segments;
use crate::kinematics::{
    elapsed_secs, normalize_longitude, refresh_motion_at, unwrap_longitudes, wrap_longitude_delta,
};
use crate::types::linalg::{
    cv_transition, invert_2x2, KalmanGainPos, PosMat, PosVec, StateMat4, StateVec4,
};
use crate::types::{Corrector, Sample, SampleStatus};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    // ── Variational-Bayes noise prior ──
    pub vb_alpha: f64,
    pub vb_beta: f64,

    // ── Initial covariance diagonal ──
    pub initial_pos_var: f64, // deg²
    pub initial_vel_var: f64, // (deg/s)²

    // ── Timing ──
    pub default_dt: f64, // used when timestamps are missing or non-increasing

    // ── Correction bookkeeping ──
    pub moved_epsilon_deg: f64,

    // ── Drift segments ──
    pub drift_min_run: usize,
    pub drift_blend: f64, // weight of the reference path
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            vb_alpha: 1.0,
            vb_beta: 10.0,
            initial_pos_var: 1e-4,
            initial_vel_var: 1e-3,
            default_dt: 1.0,
            moved_epsilon_deg: 1e-9,
            drift_min_run: 3,
            drift_blend: 0.7,
        }
    }
}

// ─── Filter state ────────────────────────────────────────────────────────────

/// Forward-pass posterior for one sample
#[derive(Clone, Debug)]
pub struct FilterState {
    pub x: StateVec4,
    pub p: StateMat4,
    pub timestamp: Option<f64>,
}

/// Per-step bookkeeping the backward pass replays
struct ForwardPass {
    states: Vec<FilterState>,
    process_noise: Vec<f64>, // Q used to predict into step i
    skipped_updates: usize,
}

/// Constant-velocity prediction with `Q·dt` added to the diagonal
fn predict(x: &StateVec4, p: &StateMat4, dt: f64, q: f64) -> (StateVec4, StateMat4) {
    let f = cv_transition(dt);
    let x_pred = f * x;
    let mut p_pred = f * p * f.transpose();
    for i in 0..4 {
        p_pred[(i, i)] += q * dt;
    }
    (x_pred, p_pred)
}

pub struct AdaptiveRts {
    config: SmootherConfig,
}

impl AdaptiveRts {
    pub fn new(config: SmootherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Elapsed seconds into each sample; index 0 and unusable intervals get `default_dt`
    fn step_intervals(&self, samples: &[Sample]) -> Vec<f64> {
        let mut dts = vec![self.config.default_dt; samples.len()];
        for i in 1..samples.len() {
            if let Some(dt) = elapsed_secs(&samples[i - 1], &samples[i]) {
                if dt > 0.0 {
                    dts[i] = dt;
                }
            }
        }
        dts
    }

    /// `lons` are the unwrapped longitudes of `samples`
    fn initial_state(&self, samples: &[Sample], lons: &[f64], dts: &[f64]) -> FilterState {
        let first = &samples[0];
        let (vlat, vlon) = match samples.get(1) {
            Some(second) => (
                (second.latitude - first.latitude) / dts[1],
                (lons[1] - lons[0]) / dts[1],
            ),
            None => (0.0, 0.0),
        };
        let pos = self.config.initial_pos_var;
        let vel = self.config.initial_vel_var;
        FilterState {
            x: StateVec4::new(first.latitude, lons[0], vlat, vlon),
            p: StateMat4::from_diagonal(&StateVec4::new(pos, pos, vel, vel)),
            timestamp: first.timestamp,
        }
    }

    fn forward(&self, samples: &[Sample], lons: &[f64], dts: &[f64]) -> ForwardPass {
        let n = samples.len();
        let mut states = Vec::with_capacity(n);
        let mut process_noise = vec![0.0; n];
        let mut skipped_updates = 0;

        let mut alpha = self.config.vb_alpha;
        let mut beta = self.config.vb_beta;

        states.push(self.initial_state(samples, lons, dts));

        for i in 1..n {
            let q = alpha / beta;
            process_noise[i] = q;

            let prev = &states[i - 1];
            let (x_pred, p_pred) = predict(&prev.x, &prev.p, dts[i], q);

            let z = PosVec::new(samples[i].latitude, lons[i]);
            let innovation = z - x_pred.fixed_rows::<2>(0);

            // Variational-Bayes noise update
            alpha += 0.5;
            beta += 0.5 * innovation.norm_squared();
            let r = alpha / beta;

            let s = p_pred.fixed_view::<2, 2>(0, 0) + PosMat::identity() * r;
            let Some(s_inv) = invert_2x2(&s) else {
                skipped_updates += 1;
                states.push(FilterState {
                    x: x_pred,
                    p: p_pred,
                    timestamp: samples[i].timestamp,
                });
                continue;
            };

            let gain: KalmanGainPos = p_pred.fixed_columns::<2>(0) * s_inv;
            let x = x_pred + gain * innovation;
            let p = p_pred - gain * p_pred.fixed_rows::<2>(0);

            states.push(FilterState {
                x,
                p,
                timestamp: samples[i].timestamp,
            });
        }

        ForwardPass {
            states,
            process_noise,
            skipped_updates,
        }
    }

    /// Backward pass; covariance is carried through unchanged
    fn backward(&self, pass: &ForwardPass, dts: &[f64]) -> Vec<StateVec4> {
        let n = pass.states.len();
        let mut smoothed = vec![StateVec4::zeros(); n];
        smoothed[n - 1] = pass.states[n - 1].x;

        for i in (0..n - 1).rev() {
            let fwd = &pass.states[i];
            let dt = dts[i + 1];
            let (x_pred, p_pred) = predict(&fwd.x, &fwd.p, dt, pass.process_noise[i + 1]);

            let cross = (fwd.p * cv_transition(dt).transpose())
                .fixed_view::<2, 2>(0, 0)
                .into_owned();
            let gain = match invert_2x2(&p_pred.fixed_view::<2, 2>(0, 0).into_owned()) {
                Some(inv) => cross * inv,
                None => PosMat::zeros(),
            };

            let diff = smoothed[i + 1] - x_pred;
            let pos = fwd.x.fixed_rows::<2>(0) + gain * diff.fixed_rows::<2>(0);
            let vel = fwd.x.fixed_rows::<2>(2) + gain * diff.fixed_rows::<2>(2);
            smoothed[i] = StateVec4::new(pos[0], pos[1], vel[0], vel[1]);
        }

        smoothed
    }

    /// Smooth a trajectory.
    ///
    /// Samples moved by more than `moved_epsilon_deg` are tagged as corrected
    /// by the smoother, keep their original position and lose a drift status.
    /// Drift runs of the input are then pulled toward the line between the
    /// samples bracketing them. Fewer than 2 samples pass through unchanged.
    pub fn smooth(&self, samples: &[Sample]) -> Vec<Sample> {
        if samples.len() < 2 {
            return samples.to_vec();
        }

        let dts = self.step_intervals(samples);
        let lons = unwrap_longitudes(samples);
        let pass = self.forward(samples, &lons, &dts);
        let smoothed = self.backward(&pass, &dts);
        if pass.skipped_updates > 0 {
            debug!(
                "smoother skipped {} singular updates",
                pass.skipped_updates
            );
        }

        let eps = self.config.moved_epsilon_deg;
        let mut result = samples.to_vec();
        let mut moved = vec![false; result.len()];
        for (i, (sample, state)) in result.iter_mut().zip(smoothed.iter()).enumerate() {
            let lon = normalize_longitude(state[1]);
            if (sample.latitude - state[0]).abs() > eps
                || wrap_longitude_delta(sample.longitude - lon).abs() > eps
            {
                sample.remember_original();
                sample.corrected_by = Some(Corrector::Smoother);
                if sample.status == SampleStatus::Drift {
                    sample.status = SampleStatus::Normal;
                }
                moved[i] = true;
            }
            sample.latitude = state[0];
            sample.longitude = lon;
        }
        for i in 1..result.len() {
            refresh_motion_at(&mut result, i);
        }

        let statuses: Vec<SampleStatus> = samples.iter().map(|s| s.status).collect();
        let pulled = correct_drift_segments(&statuses, &mut result, &moved, &self.config);
        debug!(
            "smoother moved {} of {} samples, {} drift samples pulled",
            moved.iter().filter(|m| **m).count(),
            result.len(),
            pulled
        );

        result
    }
}

impl Default for AdaptiveRts {
    fn default() -> Self {
        Self::new(SmootherConfig::default())
    }
}
