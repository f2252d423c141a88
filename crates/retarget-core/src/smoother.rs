// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Motion smoothing
//!
//! [`MinJerkSmoother`] is a third-order linear filter whose step response
//! approximates a minimum-jerk profile: it reaches about 90% of a step after
//! one time constant `T` and settles on the target exactly. The continuous
//! system
//!
//! ```text
//! s^3 + (K2 / T) s^2 + (K1 / T^2) s + K0 / T^3
//! ```
//!
//! is discretised with the bilinear transform at the control period. The
//! discrete step response stays monotone only while `T` spans at least
//! [`MIN_SMOOTHING_PERIODS`] periods, so shorter time constants are rejected.
//! Each dimension is filtered independently with state
//! `[position, velocity, acceleration]`.

use crate::error::{RetargetingError, RetargetingResult};
use nalgebra::{DVector, Matrix3, Vector3};
use retarget_config::MIN_SMOOTHING_PERIODS;

const K0: f64 = 150.765868956161;
const K1: f64 = 84.9812819469538;
const K2: f64 = 15.9669610709384;

/// Filter chasing a moving vector target
pub trait Smoother: Send {
    /// Set the state to `value` at rest
    fn init(&mut self, value: &DVector<f64>) -> RetargetingResult<()>;

    /// Change the time constant, keeping the current state
    fn set_time_constant(&mut self, time_constant: f64) -> RetargetingResult<()>;

    fn time_constant(&self) -> f64;

    /// Control period the filter was discretised at (seconds)
    fn period(&self) -> f64;

    /// Step the filter by one control period toward `target`
    fn advance(&mut self, target: &DVector<f64>) -> RetargetingResult<()>;

    fn position(&self) -> &DVector<f64>;

    fn velocity(&self) -> &DVector<f64>;

    fn dimension(&self) -> usize;
}

/// Discrete minimum-jerk approximation
#[derive(Debug, Clone)]
pub struct MinJerkSmoother {
    period: f64,
    time_constant: f64,
    ad: Matrix3<f64>,
    bd: Vector3<f64>,
    position: DVector<f64>,
    velocity: DVector<f64>,
    acceleration: DVector<f64>,
}

impl MinJerkSmoother {
    /// Create a smoother at rest at the origin
    ///
    /// Fails if `dimension` is zero, `period` is not a positive finite number
    /// or `time_constant` is shorter than [`MIN_SMOOTHING_PERIODS`] periods.
    pub fn new(dimension: usize, period: f64, time_constant: f64) -> RetargetingResult<Self> {
        if dimension == 0 {
            return Err(RetargetingError::InvalidChannel {
                channel: "min-jerk smoother".to_string(),
                reason: "dimension must be at least 1".to_string(),
            });
        }
        if !(period.is_finite() && period > 0.0) {
            return Err(RetargetingError::InvalidChannel {
                channel: "min-jerk smoother".to_string(),
                reason: format!("control period must be > 0, got {}", period),
            });
        }
        let (ad, bd) = discretize(time_constant, period)?;

        Ok(Self {
            period,
            time_constant,
            ad,
            bd,
            position: DVector::zeros(dimension),
            velocity: DVector::zeros(dimension),
            acceleration: DVector::zeros(dimension),
        })
    }

    pub fn acceleration(&self) -> &DVector<f64> {
        &self.acceleration
    }

    fn check_dimension(&self, context: &str, actual: usize) -> RetargetingResult<()> {
        if actual != self.position.len() {
            return Err(RetargetingError::DimensionMismatch {
                context: context.to_string(),
                expected: self.position.len(),
                actual,
            });
        }
        Ok(())
    }
}

impl Smoother for MinJerkSmoother {
    fn init(&mut self, value: &DVector<f64>) -> RetargetingResult<()> {
        self.check_dimension("smoother init", value.len())?;
        self.position.copy_from(value);
        self.velocity.fill(0.0);
        self.acceleration.fill(0.0);
        Ok(())
    }

    fn set_time_constant(&mut self, time_constant: f64) -> RetargetingResult<()> {
        let (ad, bd) = discretize(time_constant, self.period)?;
        self.ad = ad;
        self.bd = bd;
        self.time_constant = time_constant;
        Ok(())
    }

    fn time_constant(&self) -> f64 {
        self.time_constant
    }

    fn period(&self) -> f64 {
        self.period
    }

    fn advance(&mut self, target: &DVector<f64>) -> RetargetingResult<()> {
        self.check_dimension("smoother target", target.len())?;
        for i in 0..self.position.len() {
            let state = Vector3::new(self.position[i], self.velocity[i], self.acceleration[i]);
            let next = self.ad * state + self.bd * target[i];
            self.position[i] = next[0];
            self.velocity[i] = next[1];
            self.acceleration[i] = next[2];
        }
        Ok(())
    }

    fn position(&self) -> &DVector<f64> {
        &self.position
    }

    fn velocity(&self) -> &DVector<f64> {
        &self.velocity
    }

    fn dimension(&self) -> usize {
        self.position.len()
    }
}

/// Bilinear discretisation of the third-order filter
fn discretize(time_constant: f64, period: f64) -> RetargetingResult<(Matrix3<f64>, Vector3<f64>)> {
    if !(time_constant.is_finite() && time_constant >= MIN_SMOOTHING_PERIODS * period) {
        return Err(RetargetingError::InvalidTimeConstant {
            channel: "min-jerk smoother".to_string(),
            value: time_constant,
        });
    }

    let c0 = K0 / time_constant.powi(3);
    let c1 = K1 / time_constant.powi(2);
    let c2 = K2 / time_constant;

    #[rustfmt::skip]
    let a = Matrix3::new(
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
        -c0, -c1, -c2,
    );
    let b = Vector3::new(0.0, 0.0, c0);

    let half = a * (period / 2.0);
    let inverse = (Matrix3::identity() - half).try_inverse().ok_or_else(|| {
        RetargetingError::InvalidTimeConstant {
            channel: "min-jerk smoother".to_string(),
            value: time_constant,
        }
    })?;

    Ok((inverse * (Matrix3::identity() + half), inverse * b * period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PERIOD: f64 = 0.01;

    fn step_response(time_constant: f64, steps: usize) -> Vec<f64> {
        let mut smoother = MinJerkSmoother::new(1, PERIOD, time_constant).unwrap();
        let target = DVector::from_element(1, 1.0);
        (0..steps)
            .map(|_| {
                smoother.advance(&target).unwrap();
                smoother.position()[0]
            })
            .collect()
    }

    #[test]
    fn test_reaches_ninety_percent_in_one_time_constant() {
        let response = step_response(0.5, 50);
        let at_t = response[49];
        assert!(at_t > 0.85 && at_t < 0.95, "position at T was {}", at_t);
    }

    #[test]
    fn test_step_response_is_monotone_and_settles() {
        let response = step_response(1.0, 1000);
        for pair in response.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
            assert!(pair[1] <= 1.0 + 1e-9);
        }
        assert_relative_eq!(*response.last().unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_init_sets_rest_state() {
        let mut smoother = MinJerkSmoother::new(2, PERIOD, 1.0).unwrap();
        smoother.advance(&DVector::from_vec(vec![1.0, -1.0])).unwrap();

        smoother.init(&DVector::from_vec(vec![0.3, 0.4])).unwrap();

        assert_eq!(smoother.position().as_slice(), &[0.3, 0.4]);
        assert_eq!(smoother.velocity().as_slice(), &[0.0, 0.0]);

        // At rest on its own target it stays put
        smoother.advance(&DVector::from_vec(vec![0.3, 0.4])).unwrap();
        assert_relative_eq!(smoother.position()[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(smoother.velocity()[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_retune_keeps_state() {
        let mut smoother = MinJerkSmoother::new(1, PERIOD, 2.0).unwrap();
        let target = DVector::from_element(1, 1.0);
        for _ in 0..20 {
            smoother.advance(&target).unwrap();
        }
        let position = smoother.position().clone();
        let velocity = smoother.velocity().clone();

        smoother.set_time_constant(0.5).unwrap();

        assert_eq!(smoother.time_constant(), 0.5);
        assert_eq!(smoother.position(), &position);
        assert_eq!(smoother.velocity(), &velocity);
    }

    #[test]
    fn test_shorter_time_constant_moves_faster() {
        let slow = step_response(2.0, 30);
        let fast = step_response(0.5, 30);
        assert!(fast[29] > slow[29]);
    }

    #[test]
    fn test_invalid_construction_is_rejected() {
        assert!(matches!(
            MinJerkSmoother::new(1, PERIOD, 0.0),
            Err(RetargetingError::InvalidTimeConstant { .. })
        ));
        assert!(matches!(
            MinJerkSmoother::new(1, PERIOD, -1.0),
            Err(RetargetingError::InvalidTimeConstant { .. })
        ));
        assert!(matches!(
            MinJerkSmoother::new(0, PERIOD, 1.0),
            Err(RetargetingError::InvalidChannel { .. })
        ));
        assert!(matches!(
            MinJerkSmoother::new(1, 0.0, 1.0),
            Err(RetargetingError::InvalidChannel { .. })
        ));
    }

    #[test]
    fn test_shortest_time_constant_does_not_overshoot() {
        let shortest = MIN_SMOOTHING_PERIODS * PERIOD;
        let response = step_response(shortest, 500);
        for pair in response.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
            assert!(pair[1] <= 1.0 + 1e-9);
        }
        assert_relative_eq!(*response.last().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_time_constant_below_three_periods_is_rejected() {
        assert!(matches!(
            MinJerkSmoother::new(1, PERIOD, 0.029),
            Err(RetargetingError::InvalidTimeConstant { .. })
        ));
        assert!(MinJerkSmoother::new(1, 0.005, 0.029).is_ok());

        let mut smoother = MinJerkSmoother::new(1, PERIOD, 1.0).unwrap();
        assert!(matches!(
            smoother.set_time_constant(2.0 * PERIOD),
            Err(RetargetingError::InvalidTimeConstant { value, .. }) if value == 0.02
        ));
        // Rejected retune leaves the previous tuning in place
        assert_eq!(smoother.time_constant(), 1.0);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut smoother = MinJerkSmoother::new(3, PERIOD, 1.0).unwrap();
        assert!(matches!(
            smoother.advance(&DVector::zeros(2)),
            Err(RetargetingError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
        assert_eq!(smoother.dimension(), 3);
    }
}
