//! Tableau snapshots.

use crate::VarId;
use rustc_hash::FxHashSet;

/// A deep copy of the tableau's observable state, taken by the outer search
/// before a case split and restored on backtracking.
///
/// Snapshots are in-memory only; there is no serialized form.
#[derive(Debug, Clone)]
pub struct TableauState<F> {
    pub(crate) m: usize,
    pub(crate) n: usize,
    pub(crate) a: Vec<f64>,
    pub(crate) b: Vec<f64>,
    pub(crate) lower_bounds: Vec<f64>,
    pub(crate) upper_bounds: Vec<f64>,
    pub(crate) basic_variables: FxHashSet<VarId>,
    pub(crate) basic_assignment: Vec<f64>,
    pub(crate) non_basic_assignment: Vec<f64>,
    pub(crate) basic_index_to_variable: Vec<VarId>,
    pub(crate) non_basic_index_to_variable: Vec<VarId>,
    pub(crate) variable_to_index: Vec<usize>,
    pub(crate) factorization: F,
    pub(crate) bounds_valid: bool,
}

impl<F> TableauState<F> {
    /// Number of equality rows at snapshot time.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Total number of variables at snapshot time.
    pub fn n(&self) -> usize {
        self.n
    }
}
