//! # Iteration history of a least-squares run
//!
//! Every completed iteration of [`LeastSquaresIterator::run`](crate::least_squares::iterator::LeastSquaresIterator::run)
//! appends exactly one [`IterationRecord`] to an [`IterationHistory`]. Records are never
//! modified once appended, so the history doubles as a diagnostic trace when a run fails
//! part way through.
//!
//! ## Export
//!
//! The history can be written as three CSV tables:
//!
//! - [`IterationHistory::write_states_csv`] – one row per iteration with the updated state,
//! - [`IterationHistory::write_steps_csv`] – one row per iteration with the update vector Δ,
//! - [`IterationHistory::write_norms_csv`] – one row per iteration with ‖Δ‖₂ and ‖r‖₂.

use std::fmt;
use std::io::Write;

use itertools::Itertools;
use serde::Serialize;

use crate::constants::{ResidualVector, StateVector};
use crate::rangefit_errors::RangefitError;

/// Snapshot of one completed iteration.
///
/// Fields
/// -----------------
/// * `iteration`: 0-based iteration index.
/// * `state`: State after applying the update.
/// * `step`: Update vector Δ added to the previous state.
/// * `residual`: Residual vector evaluated at the previous state, the one Δ was computed from.
/// * `error_norm`: Euclidean norm of `step`, the convergence metric.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub state: StateVector,
    pub step: StateVector,
    pub residual: ResidualVector,
    pub error_norm: f64,
}

impl IterationRecord {
    pub fn residual_norm(&self) -> f64 {
        self.residual.norm()
    }
}

/// Append-only sequence of [`IterationRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationHistory {
    records: Vec<IterationRecord>,
}

#[derive(Serialize)]
struct NormRow {
    iteration: usize,
    error_norm: f64,
    residual_norm: f64,
}

impl IterationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: IterationRecord) {
        debug_assert_eq!(record.iteration, self.records.len());
        self.records.push(record);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IterationRecord> {
        self.records.iter()
    }

    /// Error norms in iteration order.
    pub fn error_norms(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.error_norm).collect()
    }

    /// Record with the smallest error norm of this run.
    ///
    /// Ties keep the earliest iteration. NaN norms never win.
    ///
    /// Return
    /// ----------
    /// * `None` if the history is empty, otherwise the minimum-error record.
    pub fn best_iteration(&self) -> Option<&IterationRecord> {
        self.records
            .iter()
            .filter(|r| !r.error_norm.is_nan())
            .min_by(|a, b| a.error_norm.total_cmp(&b.error_norm))
    }

    /// Check that the error norm never grows by more than `slack` between consecutive
    /// iterations.
    ///
    /// Arguments
    /// -----------------
    /// * `slack`: Absolute tolerance allowed on each increase.
    ///
    /// Return
    /// ----------
    /// * `true` if `norm[k+1] <= norm[k] + slack` for every `k`. Trivially true for
    ///   histories shorter than two records.
    pub fn is_non_increasing(&self, slack: f64) -> bool {
        self.records
            .iter()
            .tuple_windows()
            .all(|(prev, next)| next.error_norm <= prev.error_norm + slack)
    }

    /// Write one row per iteration: `iteration, x0, x1, ...` (updated state).
    pub fn write_states_csv<W: Write>(&self, writer: W) -> Result<(), RangefitError> {
        self.write_vectors_csv(writer, |r| &r.state)
    }

    /// Write one row per iteration: `iteration, d0, d1, ...` (update vector).
    pub fn write_steps_csv<W: Write>(&self, writer: W) -> Result<(), RangefitError> {
        self.write_vectors_csv(writer, |r| &r.step)
    }

    /// Write one row per iteration: `iteration, error_norm, residual_norm`.
    pub fn write_norms_csv<W: Write>(&self, writer: W) -> Result<(), RangefitError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for r in &self.records {
            wtr.serialize(NormRow {
                iteration: r.iteration,
                error_norm: r.error_norm,
                residual_norm: r.residual_norm(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_vectors_csv<W, F>(&self, writer: W, column: F) -> Result<(), RangefitError>
    where
        W: Write,
        F: Fn(&IterationRecord) -> &StateVector,
    {
        let mut wtr = csv::Writer::from_writer(writer);
        let width = self.records.first().map_or(0, |r| column(r).len());

        let header = std::iter::once("iteration".to_string())
            .chain((0..width).map(|i| format!("c{i}")))
            .collect_vec();
        wtr.write_record(&header)?;

        for r in &self.records {
            let row = std::iter::once(r.iteration.to_string())
                .chain(column(r).iter().map(|v| format!("{v:e}")))
                .collect_vec();
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a IterationHistory {
    type Item = &'a IterationRecord;
    type IntoIter = std::slice::Iter<'a, IterationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for IterationHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5}  {:>14}  {:>14}  state", "iter", "‖Δ‖₂", "‖r‖₂")?;
        for r in &self.records {
            let state = r.state.iter().map(|v| format!("{v:.9}")).join(", ");
            writeln!(
                f,
                "{:>5}  {:>14.6e}  {:>14.6e}  [{}]",
                r.iteration,
                r.error_norm,
                r.residual_norm(),
                state
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod history_test {
    use super::*;

    fn record(iteration: usize, error_norm: f64) -> IterationRecord {
        IterationRecord {
            iteration,
            state: StateVector::from_column_slice(&[iteration as f64, 1.0]),
            step: StateVector::from_column_slice(&[error_norm, 0.0]),
            residual: ResidualVector::from_column_slice(&[3.0, 4.0]),
            error_norm,
        }
    }

    fn history(norms: &[f64]) -> IterationHistory {
        let mut h = IterationHistory::new();
        for (i, n) in norms.iter().enumerate() {
            h.push(record(i, *n));
        }
        h
    }

    #[test]
    fn test_best_iteration_is_minimum_of_the_run() {
        let h = history(&[2.0, 0.5, 0.7, 0.5]);
        assert_eq!(h.best_iteration().unwrap().iteration, 1);
        assert!(IterationHistory::new().best_iteration().is_none());
    }

    #[test]
    fn test_best_iteration_skips_nan() {
        let h = history(&[f64::NAN, 3.0]);
        assert_eq!(h.best_iteration().unwrap().iteration, 1);
    }

    #[test]
    fn test_non_increasing_with_slack() {
        assert!(history(&[1.0, 0.1, 0.01]).is_non_increasing(0.0));
        assert!(history(&[1.0, 1.0 + 1e-12]).is_non_increasing(1e-9));
        assert!(!history(&[1.0, 0.1, 0.5]).is_non_increasing(1e-9));
        assert!(history(&[4.0]).is_non_increasing(0.0));
    }

    #[test]
    fn test_states_csv_layout() {
        let h = history(&[1.0, 0.25]);
        let mut buf = Vec::new();
        h.write_states_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines = text.lines().collect_vec();
        assert_eq!(lines[0], "iteration,c0,c1");
        assert_eq!(lines[2], "1,1e0,1e0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_norms_csv_layout() {
        let h = history(&[0.5]);
        let mut buf = Vec::new();
        h.write_norms_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "iteration,error_norm,residual_norm\n0,0.5,5.0\n");
    }

    #[test]
    fn test_display_lists_every_iteration() {
        let h = history(&[1.0, 0.1, 0.01]);
        let text = format!("{h}");
        assert_eq!(text.lines().count(), 4);
    }
}
