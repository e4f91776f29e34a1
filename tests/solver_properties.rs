mod common;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rangefit::constants::StateVector;
use rangefit::kinematics::range_model::RangeModel;
use rangefit::kinematics::KinematicState;
use rangefit::least_squares::iterator::{LeastSquaresIterator, RunStatus};
use rangefit::least_squares::jacobian_check::{central_difference_jacobian, max_relative_mismatch};
use rangefit::least_squares::problem::{FnProblem, LeastSquaresProblem, ObservationSet};
use rangefit::least_squares::SolverParams;
use rangefit::rangefit_errors::RangefitError;

use crate::common::{reference_observations, reference_station, reference_truth};

/// x² + y² = observed[0], x − y = observed[1]: root (√2, √2) for observed = (4, 0).
fn circle_and_line() -> impl LeastSquaresProblem<Aux = ()> {
    FnProblem::new(
        |x: &StateVector, _: &(), obs: &DVector<f64>, _: &DVector<f64>| {
            Ok(DVector::from_column_slice(&[
                obs[0] - (x[0] * x[0] + x[1] * x[1]),
                obs[1] - (x[0] - x[1]),
            ]))
        },
        |x: &StateVector, _: &(), _: &DVector<f64>| {
            Ok(DMatrix::from_row_slice(
                2,
                2,
                &[-2.0 * x[0], -2.0 * x[1], -1.0, 1.0],
            ))
        },
    )
}

#[test]
fn test_known_root_is_found() {
    let observations = ObservationSet::from_slices(&[0.0, 0.0], &[4.0, 0.0]).unwrap();
    let mut solver = LeastSquaresIterator::new(circle_and_line(), ())
        .with_observations(observations)
        .with_initial_state(DVector::from_column_slice(&[1.0, 2.0]))
        .with_params(SolverParams::builder().tolerance(1e-12).build().unwrap());

    let fit = solver.run().unwrap();
    assert_eq!(fit.status, RunStatus::Converged);
    assert!(fit.iterations <= 10);
    assert_relative_eq!(fit.state[0], 2f64.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(fit.state[1], 2f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_convergence_is_quadratic_near_the_root() {
    let observations = ObservationSet::from_slices(&[0.0, 0.0], &[4.0, 0.0]).unwrap();
    let mut solver = LeastSquaresIterator::new(circle_and_line(), ())
        .with_observations(observations)
        .with_initial_state(DVector::from_column_slice(&[1.5, 1.4]))
        .with_params(SolverParams::builder().tolerance(1e-14).build().unwrap());
    solver.run().unwrap();

    let norms = solver.history().error_norms();
    assert!(solver.history().is_non_increasing(1e-15));
    // e_{k+1} ≤ C e_k² while the steps are above round-off
    for w in norms.windows(2) {
        if w[0] > 1e-7 {
            assert!(w[1] <= 10.0 * w[0] * w[0]);
        }
    }
}

#[test]
fn test_error_norm_non_increasing_near_solution() {
    let perturbed = reference_truth().to_vector() + DVector::from_element(5, 0.02);
    let mut solver = LeastSquaresIterator::new(RangeModel, reference_station())
        .with_observations(reference_observations())
        .with_initial_state(perturbed);

    let fit = solver.run().unwrap();
    assert!(fit.is_converged());
    assert!(solver.history().is_non_increasing(1e-12));
}

#[test]
fn test_range_jacobian_matches_finite_differences_at_random_states() {
    let mut rng = StdRng::seed_from_u64(42_u64);
    let station = reference_station();
    let observations = reference_observations();

    for _ in 0..20 {
        let state = KinematicState::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(5.0..15.0),
            rng.random_range(-3.0..3.0),
            rng.random_range(-3.0..3.0),
            rng.random_range(0.0..1.0),
        )
        .to_vector();

        let analytic = RangeModel
            .jacobian(&state, &station, observations.times())
            .unwrap();
        let numeric =
            central_difference_jacobian(&RangeModel, &state, &station, &observations).unwrap();
        assert!(max_relative_mismatch(&analytic, &numeric) < 1e-5);
    }
}

#[test]
fn test_partial_history_survives_failure() {
    // r = obs − x, valid only for x ≤ 1: the first step jumps to x = 2
    let problem = FnProblem::new(
        |x: &StateVector, _: &(), obs: &DVector<f64>, _: &DVector<f64>| {
            if x[0] > 1.0 {
                Err(RangefitError::Domain("x left the model domain".into()))
            } else {
                Ok(obs.map(|o| o - x[0]))
            }
        },
        |_: &StateVector, _: &(), t: &DVector<f64>| Ok(DMatrix::from_element(t.len(), 1, -1.0)),
    );
    let observations = ObservationSet::from_slices(&[0.0], &[2.0]).unwrap();
    let mut solver = LeastSquaresIterator::new(problem, ())
        .with_observations(observations)
        .with_initial_state(DVector::from_element(1, 0.0));

    let err = solver.run().unwrap_err();
    assert_eq!(
        err,
        RangefitError::Evaluation {
            iteration: 1,
            source: Box::new(RangefitError::Domain("x left the model domain".into())),
        }
    );
    assert_eq!(solver.history().len(), 1);
    assert_relative_eq!(solver.history().records()[0].state[0], 2.0);
}
