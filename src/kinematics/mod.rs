//! # Constant-acceleration planar kinematics
//!
//! The estimated state is the initial condition `(x, y, ẋ, ẏ, g)` of a point moving in a
//! plane under a constant downward acceleration `g` along `y`:
//!
//! ```text
//! x(t) = x₀ + ẋ₀ t
//! y(t) = y₀ + ẏ₀ t − ½ g t²
//! ẋ(t) = ẋ₀
//! ẏ(t) = ẏ₀ − g t
//! g(t) = g
//! ```
//!
//! [`range_model`] turns this motion model into a least-squares problem over range
//! observations from a fixed ground station.
use std::fmt;

use nalgebra::Vector2;

use crate::constants::{StateVector, KINEMATIC_STATE_LEN};
use crate::rangefit_errors::RangefitError;

pub mod range_model;

/// Kinematic state `(x, y, ẋ, ẏ, g)` at one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub x: f64,
    pub y: f64,
    pub x_dot: f64,
    pub y_dot: f64,
    pub g: f64,
}

impl KinematicState {
    pub fn new(x: f64, y: f64, x_dot: f64, y_dot: f64, g: f64) -> Self {
        KinematicState {
            x,
            y,
            x_dot,
            y_dot,
            g,
        }
    }

    /// Read a state from a solver vector ordered `(x, y, ẋ, ẏ, g)`.
    ///
    /// Return
    /// ----------
    /// * The state, or [`RangefitError::Domain`] if the vector does not have five entries.
    pub fn from_vector(v: &StateVector) -> Result<Self, RangefitError> {
        if v.len() != KINEMATIC_STATE_LEN {
            return Err(RangefitError::Domain(format!(
                "kinematic state needs {KINEMATIC_STATE_LEN} parameters, got {}",
                v.len()
            )));
        }
        Ok(KinematicState::new(v[0], v[1], v[2], v[3], v[4]))
    }

    pub fn to_vector(&self) -> StateVector {
        StateVector::from_column_slice(&[self.x, self.y, self.x_dot, self.y_dot, self.g])
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// State reached after `dt`, taking `self` as the initial condition.
    pub fn propagate(&self, dt: f64) -> KinematicState {
        KinematicState {
            x: self.x + self.x_dot * dt,
            y: self.y + self.y_dot * dt - 0.5 * self.g * dt * dt,
            x_dot: self.x_dot,
            y_dot: self.y_dot - self.g * dt,
            g: self.g,
        }
    }
}

/// Predict the state at `time` from a hypothesized initial state vector.
///
/// Arguments
/// -----------------
/// * `initial_state`: Solver vector `(x, y, ẋ, ẏ, g)` at `t = 0`.
/// * `time`: Time offset from the initial epoch.
///
/// Return
/// ----------
/// * The propagated state, or [`RangefitError::Domain`] if `time` is not finite or the
///   vector has the wrong length.
pub fn predict_state(initial_state: &StateVector, time: f64) -> Result<KinematicState, RangefitError> {
    if !time.is_finite() {
        return Err(RangefitError::Domain(format!(
            "prediction time must be finite, got {time}"
        )));
    }
    Ok(KinematicState::from_vector(initial_state)?.propagate(time))
}

impl fmt::Display for KinematicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x = {:.9}, y = {:.9}, x_dot = {:.9}, y_dot = {:.9}, g = {:.9}",
            self.x, self.y, self.x_dot, self.y_dot, self.g
        )
    }
}

#[cfg(test)]
mod kinematics_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_propagate_ballistic() {
        let s0 = KinematicState::new(1.0, 8.0, 2.0, 1.0, 0.5);
        let s = s0.propagate(2.0);
        assert_relative_eq!(s.x, 5.0);
        assert_relative_eq!(s.y, 9.0);
        assert_relative_eq!(s.x_dot, 2.0);
        assert_relative_eq!(s.y_dot, 0.0);
        assert_relative_eq!(s.g, 0.5);
        assert_eq!(s0.propagate(0.0), s0);
    }

    #[test]
    fn test_predict_state_checks_inputs() {
        let v = StateVector::from_column_slice(&[1.0, 8.0, 2.0, 1.0, 0.5]);
        assert_eq!(
            predict_state(&v, 2.0).unwrap(),
            KinematicState::new(5.0, 9.0, 2.0, 0.0, 0.5)
        );
        assert!(matches!(
            predict_state(&v, f64::INFINITY),
            Err(RangefitError::Domain(_))
        ));
        let short = StateVector::from_column_slice(&[1.0, 2.0]);
        assert!(predict_state(&short, 0.0).is_err());
    }

    #[test]
    fn test_vector_round_trip_order() {
        let s = KinematicState::new(1.5, 10.0, 2.2, 0.5, 0.3);
        assert_eq!(s.to_vector().as_slice(), &[1.5, 10.0, 2.2, 0.5, 0.3]);
        assert_eq!(KinematicState::from_vector(&s.to_vector()).unwrap(), s);
    }
}
