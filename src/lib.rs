//! # rangefit: initial-state determination from range observations
//!
//! `rangefit` estimates the initial kinematic state of a moving object from ranges
//! measured by a fixed ground station, with an iterative Gauss–Newton solver.
//!
//! ## Layout
//!
//! - [`least_squares`] – the problem-agnostic solver: [`LeastSquaresIterator`](least_squares::iterator::LeastSquaresIterator),
//!   the [`LeastSquaresProblem`](least_squares::problem::LeastSquaresProblem) interface,
//!   the iteration history and Jacobian checks.
//! - [`kinematics`] – the constant-acceleration motion model and the
//!   [`RangeModel`](kinematics::range_model::RangeModel) problem instance.
//! - [`rangefit_errors`] – the crate error type.
//! - [`constants`] – defaults and linear-algebra aliases.
pub mod constants;
pub mod kinematics;
pub mod least_squares;
pub mod rangefit_errors;
