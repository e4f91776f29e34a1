//! # Iterative nonlinear least squares
//!
//! This module holds the problem-agnostic part of the crate: the Gauss–Newton /
//! Newton–Raphson iterator, the interface it expects from a problem instance, the
//! iteration history it produces, and the [`SolverParams`] configuration struct.
//!
//! ## Pipeline overview
//!
//! 1. **Evaluate** the residual `r` and Jacobian `J` of the problem at the current state.
//! 2. **Solve** for the update Δ:
//!    - square system (`#obs == #state`): `J Δ = −r`,
//!    - overdetermined system (`#obs > #state`): `(JᵀJ) Δ = −Jᵀ r`.
//! 3. **Update** `x ← x + Δ` and record `‖Δ‖₂` as the error norm.
//! 4. **Stop** when `‖Δ‖₂ ≤ tolerance` or after `max_iterations` iterations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rangefit::least_squares::SolverParams;
//!
//! let params = SolverParams::builder()
//!     .tolerance(1e-6)
//!     .max_iterations(1000)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
//!
//! ## See also
//!
//! * [`iterator::LeastSquaresIterator`] – the solver loop
//! * [`problem::LeastSquaresProblem`] – residual/Jacobian capability pair
//! * [`history::IterationHistory`] – append-only trace of a run
//! * [`jacobian_check`] – finite-difference validation of analytic Jacobians
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_SINGULAR_PIVOT_RATIO, DEFAULT_TOLERANCE};
use crate::rangefit_errors::RangefitError;

pub mod history;
pub mod iterator;
pub mod jacobian_check;
pub mod problem;

/// Configuration of a [`LeastSquaresIterator`](iterator::LeastSquaresIterator) run.
///
/// Fields
/// -----------------
/// * `tolerance` – convergence threshold on the step norm `‖Δ‖₂` (must be > 0).
/// * `max_iterations` – iteration cap (must be ≥ 1). Reaching it without meeting the
///   tolerance ends the run as [`RunStatus::Exhausted`](iterator::RunStatus::Exhausted).
/// * `singular_pivot_ratio` – relative threshold on the LU pivots of the linear system:
///   the system is declared singular when `min |uᵢᵢ| ≤ ratio · max |uᵢᵢ|` (must be ≥ 0).
///
/// Defaults
/// -----------------
/// * `tolerance`: 1.0e-6
/// * `max_iterations`: 1000
/// * `singular_pivot_ratio`: 1.0e-12
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub singular_pivot_ratio: f64,
}

impl SolverParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`SolverParamsBuilder`] initialized with default values.
    pub fn builder() -> SolverParamsBuilder {
        SolverParamsBuilder::new()
    }

    /// Apply the same rules as [`SolverParamsBuilder::build`] to an existing value.
    ///
    /// The fields are public, so the iterator re-validates them before every run.
    pub fn validate(&self) -> Result<(), RangefitError> {
        let rules = [
            (positive(self.tolerance), "tolerance must be > 0"),
            (self.max_iterations >= 1, "max_iterations must be >= 1"),
            (
                non_negative(self.singular_pivot_ratio),
                "singular_pivot_ratio must be >= 0",
            ),
        ];
        match rules.iter().find(|(ok, _)| !ok) {
            Some((_, msg)) => Err(RangefitError::InvalidConfiguration((*msg).into())),
            None => Ok(()),
        }
    }
}

/// Finite and strictly positive; NaN fails.
fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Finite and `>= 0`; NaN fails.
fn non_negative(x: f64) -> bool {
    x.is_finite() && x >= 0.0
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            singular_pivot_ratio: DEFAULT_SINGULAR_PIVOT_RATIO,
        }
    }
}

/// Builder for [`SolverParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct SolverParamsBuilder {
    params: SolverParams,
}

impl SolverParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: SolverParams::default(),
        }
    }

    pub fn tolerance(mut self, v: f64) -> Self {
        self.params.tolerance = v;
        self
    }
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.params.max_iterations = v;
        self
    }
    pub fn singular_pivot_ratio(mut self, v: f64) -> Self {
        self.params.singular_pivot_ratio = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `tolerance > 0` and finite,
    /// * `max_iterations ≥ 1`,
    /// * `singular_pivot_ratio ≥ 0` and finite.
    ///
    /// Return
    /// ----------
    /// * `Ok(SolverParams)`, or [`RangefitError::InvalidConfiguration`] naming the first
    ///   rule that failed.
    pub fn build(self) -> Result<SolverParams, RangefitError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for SolverParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            return write!(
                f,
                "SolverParams(tol={:.3e}, max_it={}, pivot_ratio={:.3e})",
                self.tolerance, self.max_iterations, self.singular_pivot_ratio
            );
        }

        let rows = [
            (
                "tolerance",
                format!("{:.3e}", self.tolerance),
                "Convergence threshold on ||step||",
            ),
            (
                "max_iterations",
                self.max_iterations.to_string(),
                "Iteration cap",
            ),
            (
                "singular_pivot_ratio",
                format!("{:.3e}", self.singular_pivot_ratio),
                "Relative LU pivot floor",
            ),
        ];
        let name_width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
        let value_width = rows.iter().map(|(_, value, _)| value.len()).max().unwrap_or(0);

        writeln!(f, "Least-squares solver parameters")?;
        writeln!(f, "-------------------------------")?;
        for (name, value, comment) in &rows {
            writeln!(f, "  {name:<name_width$} = {value:<value_width$}  # {comment}")?;
        }
        Ok(())
    }
}
