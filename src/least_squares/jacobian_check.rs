//! Finite-difference validation of analytic Jacobians.
//!
//! An analytic Jacobian with a flipped sign or transposed index still lets the
//! iterator run; it just converges to the wrong place or not at all. The helpers here
//! rebuild `∂r/∂x` by central differences of [`LeastSquaresProblem::residual`] so the
//! two can be compared entry by entry.

use crate::constants::{JacobianMatrix, StateVector};
use crate::least_squares::problem::{LeastSquaresProblem, ObservationSet};
use crate::rangefit_errors::RangefitError;

/// Approximate `∂r/∂x` at `state` with central differences.
///
/// The step on component `j` is `h_j = ε^{1/3} · max(|x_j|, 1)`, which balances the
/// `O(h²)` truncation error against round-off.
///
/// Arguments
/// -----------------
/// * `problem`: Problem whose residual is differentiated.
/// * `state`: Point of evaluation.
/// * `aux`: Auxiliary parameters forwarded to the residual.
/// * `observations`: Observation set forwarded to the residual.
///
/// Return
/// ----------
/// * An `observations × state` matrix, or the first error returned by the residual.
pub fn central_difference_jacobian<P: LeastSquaresProblem>(
    problem: &P,
    state: &StateVector,
    aux: &P::Aux,
    observations: &ObservationSet,
) -> Result<JacobianMatrix, RangefitError> {
    let h0 = f64::EPSILON.cbrt();
    let mut jac = JacobianMatrix::zeros(observations.len(), state.len());

    for j in 0..state.len() {
        let h = h0 * state[j].abs().max(1.0);

        let mut forward = state.clone();
        forward[j] += h;
        let mut backward = state.clone();
        backward[j] -= h;

        let r_fwd = problem.residual(&forward, aux, observations.values(), observations.times())?;
        let r_bwd = problem.residual(&backward, aux, observations.values(), observations.times())?;

        // actual spacing, not 2h: x ± h is rounded
        let span = forward[j] - backward[j];
        jac.set_column(j, &((r_fwd - r_bwd) / span));
    }

    Ok(jac)
}

/// Largest entry-wise mismatch `|a − n| / max(|n|, 1)` between two Jacobians.
///
/// Returns `f64::INFINITY` if the shapes differ or any entry of either matrix is not
/// finite.
pub fn max_relative_mismatch(analytic: &JacobianMatrix, numeric: &JacobianMatrix) -> f64 {
    if analytic.shape() != numeric.shape() {
        return f64::INFINITY;
    }
    if analytic.iter().chain(numeric.iter()).any(|v| !v.is_finite()) {
        return f64::INFINITY;
    }
    analytic
        .iter()
        .zip(numeric.iter())
        .map(|(a, n)| (a - n).abs() / n.abs().max(1.0))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod jacobian_check_test {
    use super::*;
    use crate::least_squares::problem::FnProblem;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn test_central_difference_matches_polynomial() {
        // r_i = obs_i − (x0² t_i + x0 x1)
        let problem = FnProblem::new(
            |x: &StateVector, _: &(), obs: &DVector<f64>, t: &DVector<f64>| {
                Ok(DVector::from_fn(t.len(), |i, _| {
                    obs[i] - (x[0] * x[0] * t[i] + x[0] * x[1])
                }))
            },
            |x: &StateVector, _: &(), t: &DVector<f64>| {
                Ok(DMatrix::from_fn(t.len(), 2, |i, k| {
                    if k == 0 {
                        -(2.0 * x[0] * t[i] + x[1])
                    } else {
                        -x[0]
                    }
                }))
            },
        );
        let obs = ObservationSet::from_slices(&[0.5, 1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap();
        let x = StateVector::from_column_slice(&[1.3, -0.7]);

        let analytic = problem.jacobian(&x, &(), obs.times()).unwrap();
        let numeric = central_difference_jacobian(&problem, &x, &(), &obs).unwrap();
        assert!(max_relative_mismatch(&analytic, &numeric) < 1e-8);
    }

    #[test]
    fn test_mismatch_detects_sign_error() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = -a.clone();
        assert!(max_relative_mismatch(&a, &b) > 1.0);
        assert_eq!(max_relative_mismatch(&a, &a), 0.0);
        assert_eq!(
            max_relative_mismatch(&a, &DMatrix::zeros(3, 2)),
            f64::INFINITY
        );
    }

    #[test]
    fn test_mismatch_rejects_non_finite_entries() {
        let ones = DMatrix::from_element(2, 2, 1.0);
        let nan = DMatrix::from_element(2, 2, f64::NAN);
        assert_eq!(max_relative_mismatch(&nan, &ones), f64::INFINITY);
        assert_eq!(max_relative_mismatch(&ones, &nan), f64::INFINITY);

        let mut one_inf = ones.clone();
        one_inf[(1, 0)] = f64::NEG_INFINITY;
        assert_eq!(max_relative_mismatch(&one_inf, &ones), f64::INFINITY);
    }
}
