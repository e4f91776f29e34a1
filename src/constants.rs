//! # Constants and type definitions for rangefit
//!
//! Shared numerical defaults and the dense linear-algebra aliases used by the
//! least-squares iterator and the kinematic range model.

use nalgebra::{DMatrix, DVector};

// -------------------------------------------------------------------------------------------------
// Solver defaults
// -------------------------------------------------------------------------------------------------

/// Default convergence tolerance on the step norm ‖Δ‖₂
pub const DEFAULT_TOLERANCE: f64 = 1.0e-6;

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default relative pivot threshold under which a factorization is declared singular
pub const DEFAULT_SINGULAR_PIVOT_RATIO: f64 = 1.0e-12;

// -------------------------------------------------------------------------------------------------
// Kinematic model
// -------------------------------------------------------------------------------------------------

/// Number of estimated parameters of the constant-acceleration model (x, y, ẋ, ẏ, g)
pub const KINEMATIC_STATE_LEN: usize = 5;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Estimated parameter vector
pub type StateVector = DVector<f64>;

/// Observed-minus-predicted vector, one entry per observation
pub type ResidualVector = DVector<f64>;

/// ∂residual/∂state, observations × state parameters
pub type JacobianMatrix = DMatrix<f64>;
