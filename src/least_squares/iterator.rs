//! # Least-squares iterator
//!
//! [`LeastSquaresIterator`] drives a [`LeastSquaresProblem`] from an initial guess to a
//! fixed point of the Gauss–Newton map, recording one [`IterationRecord`] per iteration.
//!
//! ## Update rule
//!
//! With residuals `r = observed − predicted` and `J = ∂r/∂x`, the Newton direction is the
//! solution of `J Δ = −r` (square case) or of the normal equations `(JᵀJ) Δ = −Jᵀ r`
//! (more observations than parameters). The state is always updated as `x ← x + Δ`, and
//! `‖Δ‖₂` is the error norm tested against the tolerance.
//!
//! ## Failure semantics
//!
//! A run aborts on the first error, with the iteration index attached:
//! * [`RangefitError::SingularMatrix`] when the linear system cannot be solved,
//! * [`RangefitError::Evaluation`] when the problem callbacks fail or return badly shaped
//!   or non-finite values.
//!
//! Records appended before the failure remain available through
//! [`LeastSquaresIterator::history`].
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use crate::constants::{JacobianMatrix, ResidualVector, StateVector};
use crate::least_squares::history::{IterationHistory, IterationRecord};
use crate::least_squares::problem::{LeastSquaresProblem, ObservationSet};
use crate::least_squares::SolverParams;
use crate::rangefit_errors::RangefitError;

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The last step norm is at or below the tolerance.
    Converged,
    /// The iteration cap was reached first.
    Exhausted,
}

/// Outcome of a successful [`LeastSquaresIterator::run`].
///
/// Fields
/// -----------------
/// * `status`: [`RunStatus::Converged`] or [`RunStatus::Exhausted`].
/// * `state`: Final state estimate.
/// * `iterations`: Number of completed iterations (length of the history).
/// * `error_norm`: `‖Δ‖₂` of the last iteration.
/// * `residual`: Residual vector evaluated at the final state.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub status: RunStatus,
    pub state: StateVector,
    pub iterations: usize,
    pub error_norm: f64,
    pub residual: ResidualVector,
}

impl FitSummary {
    pub fn is_converged(&self) -> bool {
        self.status == RunStatus::Converged
    }

    pub fn residual_norm(&self) -> f64 {
        self.residual.norm()
    }
}

/// Gauss–Newton iterator over a [`LeastSquaresProblem`].
///
/// The iterator owns its configuration (problem, auxiliary parameters, observations,
/// initial guess, [`SolverParams`]) and the history of the last run. Each call to
/// [`run`](LeastSquaresIterator::run) starts from the configured initial state with an
/// empty history, so reruns never see state from a previous run.
///
/// ```rust
/// use nalgebra::{DMatrix, DVector};
/// use rangefit::least_squares::iterator::{LeastSquaresIterator, RunStatus};
/// use rangefit::least_squares::problem::{FnProblem, ObservationSet};
///
/// // Solve x² = 2 as a one-observation least-squares problem.
/// let problem = FnProblem::new(
///     |x: &DVector<f64>, _: &(), obs: &DVector<f64>, _: &DVector<f64>| {
///         Ok(DVector::from_element(1, obs[0] - x[0] * x[0]))
///     },
///     |x: &DVector<f64>, _: &(), _: &DVector<f64>| Ok(DMatrix::from_element(1, 1, -2.0 * x[0])),
/// );
/// let observations = ObservationSet::from_slices(&[0.0], &[2.0]).unwrap();
///
/// let mut solver = LeastSquaresIterator::new(problem, ())
///     .with_observations(observations)
///     .with_initial_state(DVector::from_element(1, 1.0));
///
/// let fit = solver.run().unwrap();
/// assert_eq!(fit.status, RunStatus::Converged);
/// assert!((fit.state[0] - 2f64.sqrt()).abs() < 1e-9);
/// ```
pub struct LeastSquaresIterator<P: LeastSquaresProblem> {
    problem: P,
    aux: P::Aux,
    observations: Option<ObservationSet>,
    initial_state: Option<StateVector>,
    params: SolverParams,
    history: IterationHistory,
}

impl<P: LeastSquaresProblem> LeastSquaresIterator<P> {
    /// Create an iterator for `problem` with fixed auxiliary parameters `aux`.
    ///
    /// Observations and an initial state must be supplied before [`run`](Self::run);
    /// [`SolverParams::default`] is used unless [`with_params`](Self::with_params) is called.
    pub fn new(problem: P, aux: P::Aux) -> Self {
        LeastSquaresIterator {
            problem,
            aux,
            observations: None,
            initial_state: None,
            params: SolverParams::default(),
            history: IterationHistory::new(),
        }
    }

    pub fn with_observations(mut self, observations: ObservationSet) -> Self {
        self.observations = Some(observations);
        self
    }

    pub fn with_initial_state(mut self, state: StateVector) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn with_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    pub fn set_observations(&mut self, observations: ObservationSet) {
        self.observations = Some(observations);
    }

    pub fn set_initial_state(&mut self, state: StateVector) {
        self.initial_state = Some(state);
    }

    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn aux(&self) -> &P::Aux {
        &self.aux
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn observations(&self) -> Option<&ObservationSet> {
        self.observations.as_ref()
    }

    pub fn initial_state(&self) -> Option<&StateVector> {
        self.initial_state.as_ref()
    }

    /// History of the last run (complete, or partial if the run failed).
    pub fn history(&self) -> &IterationHistory {
        &self.history
    }

    pub fn into_history(self) -> IterationHistory {
        self.history
    }

    /// Run the iteration until convergence, exhaustion, or failure.
    ///
    /// Return
    /// ----------
    /// * `Ok(FitSummary)` when the run converged or reached the iteration cap; check
    ///   [`FitSummary::status`] to tell them apart.
    /// * `Err(RangefitError::InvalidConfiguration)` if observations or the initial state
    ///   are missing, the initial state is empty or not finite, or the parameters are invalid.
    /// * `Err(RangefitError::Domain)` if there are fewer observations than state parameters.
    /// * `Err(RangefitError::SingularMatrix { iteration })` if the step cannot be solved.
    /// * `Err(RangefitError::Evaluation { iteration, .. })` if a problem callback fails.
    pub fn run(&mut self) -> Result<FitSummary, RangefitError> {
        let LeastSquaresIterator {
            problem,
            aux,
            observations,
            initial_state,
            params,
            history,
        } = self;

        history.clear();
        params.validate()?;

        let observations = observations.as_ref().ok_or_else(|| {
            RangefitError::InvalidConfiguration("observation set is not configured".into())
        })?;
        let mut state = initial_state.clone().ok_or_else(|| {
            RangefitError::InvalidConfiguration("initial state is not configured".into())
        })?;
        if state.is_empty() {
            return Err(RangefitError::InvalidConfiguration(
                "initial state must not be empty".into(),
            ));
        }
        if state.iter().any(|v| !v.is_finite()) {
            return Err(RangefitError::InvalidConfiguration(
                "initial state must be finite".into(),
            ));
        }
        if observations.len() < state.len() {
            return Err(RangefitError::Domain(format!(
                "{} observations cannot determine {} state parameters",
                observations.len(),
                state.len()
            )));
        }

        let mut status = RunStatus::Exhausted;
        let mut error_norm = f64::NAN;

        for iteration in 0..params.max_iterations {
            let (residual, jacobian) = evaluate(problem, aux, observations, &state, iteration)?;

            let step = match solve_step(&jacobian, &residual, params.singular_pivot_ratio) {
                Some(step) => step,
                None => {
                    warn!("singular linear system at iteration {iteration}");
                    return Err(RangefitError::SingularMatrix { iteration });
                }
            };

            state += &step;
            error_norm = step.norm();
            debug!(
                "iteration {iteration}: ||step|| = {error_norm:.6e}, ||r|| = {:.6e}",
                residual.norm()
            );

            history.push(IterationRecord {
                iteration,
                state: state.clone(),
                step,
                residual,
                error_norm,
            });

            if error_norm <= params.tolerance {
                status = RunStatus::Converged;
                break;
            }
        }

        let iterations = history.len();
        let residual = problem
            .residual(&state, aux, observations.values(), observations.times())
            .map_err(|e| RangefitError::Evaluation {
                iteration: iterations,
                source: Box::new(e),
            })?;

        match status {
            RunStatus::Converged => info!(
                "converged after {iterations} iterations (||step|| = {error_norm:.3e}, ||r|| = {:.3e})",
                residual.norm()
            ),
            RunStatus::Exhausted => info!(
                "iteration cap {} reached without convergence (||step|| = {error_norm:.3e})",
                params.max_iterations
            ),
        }

        Ok(FitSummary {
            status,
            state,
            iterations,
            error_norm,
            residual,
        })
    }
}

/// Evaluate residual and Jacobian at `state` and check their shapes and finiteness.
fn evaluate<P: LeastSquaresProblem>(
    problem: &P,
    aux: &P::Aux,
    observations: &ObservationSet,
    state: &StateVector,
    iteration: usize,
) -> Result<(ResidualVector, JacobianMatrix), RangefitError> {
    let wrap = |source: RangefitError| RangefitError::Evaluation {
        iteration,
        source: Box::new(source),
    };

    let jacobian = problem
        .jacobian(state, aux, observations.times())
        .map_err(wrap)?;
    let residual = problem
        .residual(state, aux, observations.values(), observations.times())
        .map_err(wrap)?;

    let m = observations.len();
    let n = state.len();
    if residual.len() != m {
        return Err(wrap(RangefitError::Domain(format!(
            "residual has {} entries, expected {m}",
            residual.len()
        ))));
    }
    if jacobian.shape() != (m, n) {
        return Err(wrap(RangefitError::Domain(format!(
            "Jacobian is {}x{}, expected {m}x{n}",
            jacobian.nrows(),
            jacobian.ncols()
        ))));
    }
    if let Some(i) = residual.iter().position(|v| !v.is_finite()) {
        return Err(wrap(RangefitError::Domain(format!(
            "residual entry {i} is not finite"
        ))));
    }
    if let Some(k) = jacobian.iter().position(|v| !v.is_finite()) {
        // column-major storage
        return Err(wrap(RangefitError::Domain(format!(
            "Jacobian entry ({}, {}) is not finite",
            k % m,
            k / m
        ))));
    }
    Ok((residual, jacobian))
}

/// Newton step `Δ` with `J Δ = −r` (square) or `(JᵀJ) Δ = −Jᵀ r` (overdetermined).
///
/// Returns `None` when the system is singular with respect to `pivot_ratio` or the
/// solution is not finite.
fn solve_step(
    jacobian: &JacobianMatrix,
    residual: &ResidualVector,
    pivot_ratio: f64,
) -> Option<StateVector> {
    let (a, b) = if jacobian.is_square() {
        (jacobian.clone(), -residual.clone())
    } else {
        (jacobian.tr_mul(jacobian), -jacobian.tr_mul(residual))
    };
    solve_checked(a, b, pivot_ratio)
}

fn solve_checked(a: DMatrix<f64>, b: DVector<f64>, pivot_ratio: f64) -> Option<DVector<f64>> {
    let lu = a.lu();
    let pivots = lu.u().diagonal();
    let max_pivot = pivots.amax();
    let min_pivot = pivots.amin();
    if max_pivot == 0.0 || min_pivot <= pivot_ratio * max_pivot {
        return None;
    }

    lu.solve(&b).filter(|x| x.iter().all(|v| v.is_finite()))
}
