//! Planar position/velocity Kalman filter driven by clamped acceleration.
//!
//! State is `[x, y, vx, vy]` in the local frame (meters, m/s) with a 4x4
//! covariance. Constant-velocity kinematics, measured acceleration as the
//! control input, GPS position as the measurement.

use ndarray::{arr1, arr2, Array1, Array2};
use thiserror::Error;

/// Floor applied to the innovation covariance diagonal before inversion.
const S_DIAG_FLOOR: f64 = 1e-9;

/// Determinant threshold below which the 2x2 innovation covariance is
/// treated as unrecoverably singular.
const S_DET_MIN: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("innovation covariance is singular (det {det:.3e})")]
    SingularInnovation { det: f64 },

    #[error("filter state diverged to a non-finite value at cycle {cycle}")]
    Diverged { cycle: u64 },
}

/// How the per-step time delta is obtained.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DtPolicy {
    /// A fixed nominal sampling interval, regardless of timestamps.
    Fixed(f64),
    /// The true interval between consecutive observations, with a fallback
    /// for the first step (there is no previous timestamp yet).
    Measured { fallback: f64 },
}

/// Filter tuning. Two named presets cover the reference operating points;
/// every knob can also be set individually.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// Process noise diagonal for [x, y, vx, vy].
    pub q_diag: [f64; 4],
    /// Measurement noise diagonal for the position fix.
    pub r_diag: [f64; 2],
    /// Physical bound on each acceleration axis; raw values outside it are
    /// clamped, not rejected.
    pub accel_clamp: f64,
    /// Initial covariance diagonal scale.
    pub initial_uncertainty: f64,
    pub dt_policy: DtPolicy,
    /// Scale Q by the per-step dt so covariance decay follows the true
    /// sampling period.
    pub scale_q_by_dt: bool,
}

impl FilterConfig {
    /// Trusts GPS fixes heavily and holds dt at a 1 Hz nominal interval.
    pub fn gps_trusting() -> Self {
        Self {
            q_diag: [0.01, 0.01, 0.05, 0.05],
            r_diag: [0.5, 0.5],
            accel_clamp: 2.0,
            initial_uncertainty: 1.0,
            dt_policy: DtPolicy::Fixed(1.0),
            scale_q_by_dt: false,
        }
    }

    /// Balances both sources and follows the measured sampling period.
    pub fn balanced() -> Self {
        Self {
            q_diag: [0.1, 0.1, 0.3, 0.3],
            r_diag: [4.0, 4.0],
            accel_clamp: 2.0,
            initial_uncertainty: 1.0,
            dt_policy: DtPolicy::Measured { fallback: 1.0 },
            scale_q_by_dt: true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::gps_trusting()
    }
}

pub struct PlanarKalman {
    config: FilterConfig,
    state: Array1<f64>,
    covariance: Array2<f64>,
    process_noise: Array2<f64>,
    measurement_noise: Array2<f64>,
    last_innovation: (f64, f64),
    predict_count: u64,
    correct_count: u64,
}

impl PlanarKalman {
    pub fn new(config: FilterConfig) -> Self {
        let mut process_noise = Array2::<f64>::zeros((4, 4));
        for (i, q) in config.q_diag.iter().enumerate() {
            process_noise[[i, i]] = *q;
        }
        let mut measurement_noise = Array2::<f64>::zeros((2, 2));
        for (i, r) in config.r_diag.iter().enumerate() {
            measurement_noise[[i, i]] = *r;
        }
        let covariance = Array2::eye(4) * config.initial_uncertainty;

        Self {
            config,
            state: Array1::zeros(4),
            covariance,
            process_noise,
            measurement_noise,
            last_innovation: (0.0, 0.0),
            predict_count: 0,
            correct_count: 0,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    fn transition_matrix(dt: f64) -> Array2<f64> {
        arr2(&[
            [1.0, 0.0, dt, 0.0],
            [0.0, 1.0, 0.0, dt],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    fn control_matrix(dt: f64) -> Array2<f64> {
        let half_dt2 = 0.5 * dt * dt;
        arr2(&[
            [half_dt2, 0.0],
            [0.0, half_dt2],
            [dt, 0.0],
            [0.0, dt],
        ])
    }

    fn measurement_matrix() -> Array2<f64> {
        arr2(&[[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]])
    }

    /// Kinematic prediction from the measured acceleration. Each axis is
    /// clamped to the configured physical bound first, so sensor spikes
    /// cannot corrupt the control input.
    pub fn predict(&mut self, ax: f64, ay: f64, dt: f64) {
        let bound = self.config.accel_clamp;
        let u = arr1(&[ax.clamp(-bound, bound), ay.clamp(-bound, bound)]);

        let f = Self::transition_matrix(dt);
        let b = Self::control_matrix(dt);
        self.state = f.dot(&self.state) + b.dot(&u);

        let q = if self.config.scale_q_by_dt {
            &self.process_noise * dt
        } else {
            self.process_noise.clone()
        };
        self.covariance = f.dot(&self.covariance).dot(&f.t()) + q;
        self.predict_count += 1;
    }

    /// Measurement update against a position fix already projected to the
    /// local frame. Returns the innovation norm in meters.
    pub fn correct(&mut self, gx: f64, gy: f64) -> Result<f64, FilterError> {
        let h = Self::measurement_matrix();
        let innovation = arr1(&[gx - self.state[0], gy - self.state[1]]);

        let mut s = h.dot(&self.covariance).dot(&h.t()) + &self.measurement_noise;
        for i in 0..2 {
            if s[[i, i]] < S_DIAG_FLOOR {
                s[[i, i]] = S_DIAG_FLOOR;
            }
        }
        let det = s[[0, 0]] * s[[1, 1]] - s[[0, 1]] * s[[1, 0]];
        if det.abs() < S_DET_MIN || !det.is_finite() {
            return Err(FilterError::SingularInnovation { det });
        }
        let s_inv = arr2(&[
            [s[[1, 1]] / det, -s[[0, 1]] / det],
            [-s[[1, 0]] / det, s[[0, 0]] / det],
        ]);

        let k = self.covariance.dot(&h.t()).dot(&s_inv);
        self.state = &self.state + &k.dot(&innovation);

        let i_kh = Array2::eye(4) - k.dot(&h);
        self.covariance = i_kh.dot(&self.covariance);
        // Re-symmetrize against floating-point drift over long runs
        let p_t = self.covariance.t().to_owned();
        self.covariance = (&self.covariance + &p_t) * 0.5;

        self.correct_count += 1;
        if !self.state.iter().all(|v| v.is_finite()) {
            return Err(FilterError::Diverged {
                cycle: self.correct_count,
            });
        }

        self.last_innovation = (innovation[0], innovation[1]);
        Ok(innovation[0].hypot(innovation[1]))
    }

    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    pub fn speed(&self) -> f64 {
        self.state[2].hypot(self.state[3])
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    pub fn last_innovation(&self) -> (f64, f64) {
        self.last_innovation
    }

    pub fn cycles(&self) -> (u64, u64) {
        (self.predict_count, self.correct_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn covariance_is_symmetric_psd_diag(kf: &PlanarKalman) -> bool {
        let p = kf.covariance();
        for i in 0..4 {
            if p[[i, i]] < 0.0 {
                return false;
            }
            for j in 0..4 {
                if (p[[i, j]] - p[[j, i]]).abs() > 1e-9 {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn covariance_stays_symmetric_with_nonnegative_diagonal() {
        let mut kf = PlanarKalman::new(FilterConfig::gps_trusting());
        for i in 0..200 {
            let wobble = (i as f64 * 0.7).sin();
            kf.predict(wobble * 1.5, -wobble, 1.0);
            kf.correct(wobble * 3.0, 10.0 - wobble).unwrap();
            assert!(covariance_is_symmetric_psd_diag(&kf), "cycle {i}");
        }
    }

    #[test]
    fn converges_on_a_static_fix() {
        let mut kf = PlanarKalman::new(FilterConfig::gps_trusting());
        let (zx, zy) = (5.0, -3.0);
        let mut norms = Vec::new();
        for _ in 0..50 {
            kf.predict(0.0, 0.0, 1.0);
            norms.push(kf.correct(zx, zy).unwrap());
        }
        // Innovation decays after the first few cycles
        assert!(norms[4] > norms[9]);
        assert!(norms[9] > norms[29]);
        assert!(norms[49] < 1e-3);

        let (x, y) = kf.position();
        assert_abs_diff_eq!(x, zx, epsilon = 1e-4);
        assert_abs_diff_eq!(y, zy, epsilon = 1e-4);
        assert!(kf.speed() < 1e-6);
    }

    #[test]
    fn dead_reckoning_matches_closed_form() {
        // With R huge the fix is ignored and the state evolves purely from
        // the kinematic prediction.
        let config = FilterConfig {
            r_diag: [1e12, 1e12],
            ..FilterConfig::gps_trusting()
        };
        let mut kf = PlanarKalman::new(config);
        let (a, dt, n) = (0.5, 1.0, 10);
        for _ in 0..n {
            kf.predict(a, 0.0, dt);
            kf.correct(0.0, 0.0).unwrap();
        }
        let t = n as f64 * dt;
        let (x, y) = kf.position();
        assert_abs_diff_eq!(x, 0.5 * a * t * t, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
        let (vx, _) = kf.velocity();
        assert_abs_diff_eq!(vx, a * t, epsilon = 1e-6);
    }

    #[test]
    fn acceleration_is_clamped_to_the_configured_bound() {
        let config = FilterConfig {
            r_diag: [1e12, 1e12],
            ..FilterConfig::gps_trusting()
        };
        let mut kf = PlanarKalman::new(config);
        // A 50 m/s^2 spike behaves exactly like the 2.0 m/s^2 bound
        kf.predict(50.0, -50.0, 1.0);
        let (x, y) = kf.position();
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn near_zero_measurement_noise_is_floored_not_nan() {
        let config = FilterConfig {
            r_diag: [0.0, 0.0],
            ..FilterConfig::gps_trusting()
        };
        let mut kf = PlanarKalman::new(config);
        kf.predict(0.0, 0.0, 1.0);
        // S = HPH' with zero R is still invertible here; the diagonal floor
        // only has to keep the result finite
        kf.correct(1.0, 1.0).unwrap();
        assert!(kf.position().0.is_finite());
        assert!(covariance_is_symmetric_psd_diag(&kf));
    }

    #[test]
    fn balanced_preset_scales_process_noise_by_dt() {
        let mut short = PlanarKalman::new(FilterConfig::balanced());
        let mut long = PlanarKalman::new(FilterConfig::balanced());
        short.predict(0.0, 0.0, 0.1);
        long.predict(0.0, 0.0, 2.0);
        // Longer unobserved interval grows position uncertainty faster
        assert!(long.covariance()[[0, 0]] > short.covariance()[[0, 0]]);
    }
}
