//! # Range observations from a fixed ground station
//!
//! [`RangeModel`] is the [`LeastSquaresProblem`] fitting the initial
//! [`KinematicState`] to ranges measured from a stationary [`GroundStation`].
//!
//! ## Measurement model
//!
//! For observation `i` at time `tᵢ`, with `(xᵢ, yᵢ)` the predicted position and
//! `(x_s, y_s)` the station:
//!
//! ```text
//! dxᵢ = xᵢ − x_s,  dyᵢ = yᵢ − y_s,  ρᵢ = √(dxᵢ² + dyᵢ²)
//! rᵢ  = observedᵢ − ρᵢ
//! ```
//!
//! The Jacobian row is `∂rᵢ/∂(x₀, y₀, ẋ₀, ẏ₀, g) = −[dx/ρ, dy/ρ, t·dx/ρ, t·dy/ρ, −½t²·dy/ρ]`.
//!
//! A predicted position on top of the station makes `ρᵢ = 0`; both the residual
//! and the Jacobian report it as [`RangefitError::NumericalSingularity`].
//!
//! ## Example
//!
//! ```rust
//! use rangefit::kinematics::KinematicState;
//! use rangefit::kinematics::range_model::{simulate_ranges, GroundStation, RangeModel};
//!
//! let station = GroundStation::new(1.0, 1.0);
//! let truth = KinematicState::new(1.0, 8.0, 2.0, 1.0, 0.5);
//! let obs = simulate_ranges(&truth, &station, &[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
//!
//! let guess = KinematicState::new(1.5, 10.0, 2.2, 0.5, 0.3);
//! let mut solver = RangeModel::solver(station, obs, &guess);
//! let fit = solver.run().unwrap();
//! assert!(fit.is_converged());
//! ```
use nalgebra::{DVector, Vector2};

use crate::constants::{JacobianMatrix, ResidualVector, StateVector};
use crate::kinematics::{predict_state, KinematicState};
use crate::least_squares::iterator::LeastSquaresIterator;
use crate::least_squares::problem::{LeastSquaresProblem, ObservationSet};
use crate::rangefit_errors::RangefitError;

/// Stationary observer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundStation {
    pub x: f64,
    pub y: f64,
}

impl GroundStation {
    pub fn new(x: f64, y: f64) -> Self {
        GroundStation { x, y }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Offset of the state's position from the station and its length.
    ///
    /// `observation` is only used to label the error when the length is zero or
    /// not finite.
    fn line_of_sight(
        &self,
        state: &KinematicState,
        observation: usize,
    ) -> Result<(Vector2<f64>, f64), RangefitError> {
        let offset = state.position() - self.position();
        let rho = offset.norm();
        if rho == 0.0 || !rho.is_finite() {
            return Err(RangefitError::NumericalSingularity { observation });
        }
        Ok((offset, rho))
    }

    /// Distance from the station to the position predicted at `time`.
    ///
    /// A zero range is reported as observation 0; use [`simulate_ranges`] for a
    /// sequence of epochs.
    pub fn predicted_range(
        &self,
        initial_state: &StateVector,
        time: f64,
    ) -> Result<f64, RangefitError> {
        self.range_at(initial_state, time, 0)
    }

    fn range_at(
        &self,
        initial_state: &StateVector,
        time: f64,
        observation: usize,
    ) -> Result<f64, RangefitError> {
        let state = predict_state(initial_state, time)?;
        Ok(self.line_of_sight(&state, observation)?.1)
    }
}

/// Range-only fit of a constant-acceleration trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeModel;

impl RangeModel {
    /// Ready-to-run iterator for this model with default [`SolverParams`](crate::least_squares::SolverParams).
    pub fn solver(
        station: GroundStation,
        observations: ObservationSet,
        initial_guess: &KinematicState,
    ) -> LeastSquaresIterator<RangeModel> {
        LeastSquaresIterator::new(RangeModel, station)
            .with_observations(observations)
            .with_initial_state(initial_guess.to_vector())
    }
}

impl LeastSquaresProblem for RangeModel {
    type Aux = GroundStation;

    fn residual(
        &self,
        state: &StateVector,
        station: &GroundStation,
        observed: &DVector<f64>,
        times: &DVector<f64>,
    ) -> Result<ResidualVector, RangefitError> {
        if observed.len() != times.len() {
            return Err(RangefitError::Domain(format!(
                "{} observed ranges for {} observation times",
                observed.len(),
                times.len()
            )));
        }

        let mut residual = ResidualVector::zeros(times.len());
        for (i, &t) in times.iter().enumerate() {
            let predicted = predict_state(state, t)?;
            let (_, rho) = station.line_of_sight(&predicted, i)?;
            residual[i] = observed[i] - rho;
        }
        Ok(residual)
    }

    fn jacobian(
        &self,
        state: &StateVector,
        station: &GroundStation,
        times: &DVector<f64>,
    ) -> Result<JacobianMatrix, RangefitError> {
        let mut jac = JacobianMatrix::zeros(times.len(), state.len());
        for (i, &t) in times.iter().enumerate() {
            let predicted = predict_state(state, t)?;
            let (offset, rho) = station.line_of_sight(&predicted, i)?;
            let ux = offset.x / rho;
            let uy = offset.y / rho;

            jac[(i, 0)] = -ux;
            jac[(i, 1)] = -uy;
            jac[(i, 2)] = -t * ux;
            jac[(i, 3)] = -t * uy;
            jac[(i, 4)] = 0.5 * t * t * uy;
        }
        Ok(jac)
    }
}

/// Noiseless ranges of `truth` seen from `station` at `times`.
pub fn simulate_ranges(
    truth: &KinematicState,
    station: &GroundStation,
    times: &[f64],
) -> Result<ObservationSet, RangefitError> {
    let initial = truth.to_vector();
    let ranges = times
        .iter()
        .enumerate()
        .map(|(i, &t)| station.range_at(&initial, t, i))
        .collect::<Result<Vec<_>, _>>()?;
    ObservationSet::from_slices(times, &ranges)
}
