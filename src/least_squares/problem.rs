//! # Problem interface for the least-squares iterator
//!
//! The iterator never knows which physical model it is fitting. It only talks to a
//! [`LeastSquaresProblem`], a capability pair made of a residual function and its
//! Jacobian, and threads the same auxiliary parameters, observed values and
//! observation times through every call.
//!
//! ## Contents
//!
//! - [`ObservationSet`] – validated parallel arrays of observation times and measured values.
//! - [`LeastSquaresProblem`] – residual/Jacobian trait with an associated auxiliary-parameter type.
//! - [`FnProblem`] – adaptor turning two closures into a problem instance.
//!
//! ## Sign convention
//!
//! Residuals are **observed − predicted** and the Jacobian is the derivative of that
//! residual with respect to the state, i.e. the negative of the derivative of the
//! prediction. The iterator relies on this pairing to compute its update direction.

use std::marker::PhantomData;

use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::constants::{JacobianMatrix, ResidualVector, StateVector};
use crate::rangefit_errors::RangefitError;

/// Ordered set of `(time, measured value)` pairs, stored as two parallel vectors.
///
/// Construction validates the invariants every problem relies on: both vectors have
/// the same, non-zero length and every entry is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    times: DVector<f64>,
    values: DVector<f64>,
}

impl ObservationSet {
    /// Build an observation set from parallel vectors.
    ///
    /// Arguments
    /// -----------------
    /// * `times`: Observation epochs, in the time unit of the problem model.
    /// * `values`: Measured values, one per epoch.
    ///
    /// Return
    /// ----------
    /// * The validated set, or [`RangefitError::Domain`] if the lengths disagree, the
    ///   set is empty, or an entry is NaN/infinite.
    pub fn new(times: DVector<f64>, values: DVector<f64>) -> Result<Self, RangefitError> {
        if times.len() != values.len() {
            return Err(RangefitError::Domain(format!(
                "observation times ({}) and values ({}) must have the same length",
                times.len(),
                values.len()
            )));
        }
        if times.is_empty() {
            return Err(RangefitError::Domain(
                "observation set must not be empty".into(),
            ));
        }
        if let Some(i) = times.iter().position(|t| !t.is_finite()) {
            return Err(RangefitError::Domain(format!(
                "observation time {i} is not finite"
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(RangefitError::Domain(format!(
                "observed value {i} is not finite"
            )));
        }
        Ok(ObservationSet { times, values })
    }

    /// Convenience constructor from slices.
    pub fn from_slices(times: &[f64], values: &[f64]) -> Result<Self, RangefitError> {
        Self::new(
            DVector::from_column_slice(times),
            DVector::from_column_slice(values),
        )
    }

    pub fn times(&self) -> &DVector<f64> {
        &self.times
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Return a copy of this set whose measured values are perturbed by Gaussian noise.
    ///
    /// Each value receives an independent draw `σ · N(0, 1)`; the times are unchanged.
    ///
    /// Arguments
    /// -----------------
    /// * `rng`: Random number generator (seed it for reproducible runs).
    /// * `sigma`: Standard deviation of the noise, in the unit of the measurements.
    ///
    /// Return
    /// ----------
    /// * The noisy set, or [`RangefitError::Domain`] if `sigma` is negative or not finite.
    pub fn with_gaussian_noise<R: Rng>(
        &self,
        rng: &mut R,
        sigma: f64,
    ) -> Result<Self, RangefitError> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(RangefitError::Domain(format!(
                "noise standard deviation must be finite and >= 0, got {sigma}"
            )));
        }
        let values = self
            .values
            .map(|v| v + sigma * rng.sample::<f64, _>(StandardNormal));
        Ok(ObservationSet {
            times: self.times.clone(),
            values,
        })
    }
}

/// A nonlinear least-squares problem instance.
///
/// Implementations must be pure: the same inputs give the same outputs and no
/// internal state is mutated. `Aux` carries the fixed, non-estimated parameters of
/// the model (for instance an observer position).
pub trait LeastSquaresProblem {
    type Aux;

    /// Observed − predicted, one entry per observation.
    fn residual(
        &self,
        state: &StateVector,
        aux: &Self::Aux,
        observed: &DVector<f64>,
        times: &DVector<f64>,
    ) -> Result<ResidualVector, RangefitError>;

    /// ∂residual/∂state evaluated at `state`, shaped observations × state length.
    fn jacobian(
        &self,
        state: &StateVector,
        aux: &Self::Aux,
        times: &DVector<f64>,
    ) -> Result<JacobianMatrix, RangefitError>;
}

/// Problem instance defined by a residual closure and a Jacobian closure.
///
/// ```rust
/// use nalgebra::{DMatrix, DVector};
/// use rangefit::least_squares::problem::FnProblem;
///
/// // r(x) = observed - x², one observation
/// let problem = FnProblem::new(
///     |x: &DVector<f64>, _aux: &(), obs: &DVector<f64>, _t: &DVector<f64>| {
///         Ok(DVector::from_element(1, obs[0] - x[0] * x[0]))
///     },
///     |x: &DVector<f64>, _aux: &(), _t: &DVector<f64>| {
///         Ok(DMatrix::from_element(1, 1, -2.0 * x[0]))
///     },
/// );
/// # let _ = problem;
/// ```
pub struct FnProblem<A, R, J> {
    residual_fn: R,
    jacobian_fn: J,
    _aux: PhantomData<fn(&A)>,
}

impl<A, R, J> FnProblem<A, R, J>
where
    R: Fn(
        &StateVector,
        &A,
        &DVector<f64>,
        &DVector<f64>,
    ) -> Result<ResidualVector, RangefitError>,
    J: Fn(&StateVector, &A, &DVector<f64>) -> Result<JacobianMatrix, RangefitError>,
{
    pub fn new(residual_fn: R, jacobian_fn: J) -> Self {
        FnProblem {
            residual_fn,
            jacobian_fn,
            _aux: PhantomData,
        }
    }
}

impl<A, R, J> LeastSquaresProblem for FnProblem<A, R, J>
where
    R: Fn(
        &StateVector,
        &A,
        &DVector<f64>,
        &DVector<f64>,
    ) -> Result<ResidualVector, RangefitError>,
    J: Fn(&StateVector, &A, &DVector<f64>) -> Result<JacobianMatrix, RangefitError>,
{
    type Aux = A;

    fn residual(
        &self,
        state: &StateVector,
        aux: &A,
        observed: &DVector<f64>,
        times: &DVector<f64>,
    ) -> Result<ResidualVector, RangefitError> {
        (self.residual_fn)(state, aux, observed, times)
    }

    fn jacobian(
        &self,
        state: &StateVector,
        aux: &A,
        times: &DVector<f64>,
    ) -> Result<JacobianMatrix, RangefitError> {
        (self.jacobian_fn)(state, aux, times)
    }
}
