//! The bounded-simplex tableau engine.
//!
//! Maintains `A * x = b` with per-variable bounds and drives it through
//! pivot steps chosen by the outer solver. One pivot iteration runs:
//! `compute_cost_function` -> `get_entry_candidates` -> external choice ->
//! `set_entering_variable_index` -> `compute_change_column` ->
//! `pick_leaving_variable` -> `perform_pivot`. Calling out of order gives
//! undefined numerical results; only debug assertions catch it.
//!
//! All operations complete synchronously on the caller's thread. The two
//! costly ones are `compute_assignment` and `compute_cost_function`; callers
//! should assume they dominate an iteration's latency.

use crate::config::TableauConfig;
use crate::equation::Equation;
use crate::error::{alloc_buffer, TableauError};
use crate::factorization::{BasisFactorization, EtaFactorization};
use crate::float;
use crate::row::{RowEntry, TableauRow};
use crate::state::TableauState;
use crate::stats::TableauStats;
use crate::watcher::{TableauAccess, VariableWatcher, WatcherRegistry};
use crate::VarId;
use rustc_hash::FxHashSet;
use std::fmt;
use std::rc::Rc;

/// Classification of a basic variable's value against its bounds, under the
/// bound-comparison tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicStatus {
    /// Strictly below the lower bound.
    BelowLb,
    /// At the lower bound.
    AtLb,
    /// Strictly inside the bounds.
    Between,
    /// At the upper bound.
    AtUb,
    /// Strictly above the upper bound.
    AboveUb,
}

impl BasicStatus {
    /// True iff the variable violates one of its bounds.
    pub fn is_out_of_bounds(self) -> bool {
        matches!(self, BasicStatus::BelowLb | BasicStatus::AboveUb)
    }
}

impl fmt::Display for BasicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BasicStatus::BelowLb => "BELOW_LB",
            BasicStatus::AtLb => "AT_LB",
            BasicStatus::Between => "BETWEEN",
            BasicStatus::AtUb => "AT_UB",
            BasicStatus::AboveUb => "ABOVE_UB",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignmentStatus {
    Valid,
    Invalid,
}

/// The revised-simplex tableau.
///
/// Generic over the basis factorization it consumes; [`EtaFactorization`] is
/// the default. Sized by [`Tableau::set_dimensions`], configured through the
/// `set_*` and `mark_as_basic` calls, then brought live by
/// [`Tableau::initialize_tableau`].
pub struct Tableau<F: BasisFactorization = EtaFactorization> {
    config: TableauConfig,

    /// Rows of `A`.
    m: usize,
    /// Total variables (columns of `A`).
    n: usize,

    /// The constraint matrix, column-major `n * m`.
    a: Vec<f64>,
    /// Change column `d = B^-1 * a` for the entering variable.
    change_column: Vec<f64>,
    /// The most recent pivot row in symbolic form.
    pivot_row: TableauRow,
    /// Right-hand side of `A * x = b`.
    b: Vec<f64>,
    /// Scratch unit vector for row extraction.
    unit_vector: Vec<f64>,

    factorization: F,

    /// Reduced costs over the non-basic variables.
    cost_function: Vec<f64>,
    /// Basic cost coefficients (-1, 0, +1 by status).
    basic_costs: Vec<f64>,
    /// BTRAN image of the basic costs.
    multipliers: Vec<f64>,

    basic_index_to_variable: Vec<VarId>,
    non_basic_index_to_variable: Vec<VarId>,
    /// Position of each variable in whichever map applies.
    variable_to_index: Vec<usize>,
    basic_variables: FxHashSet<VarId>,

    /// Values of the non-basic variables, by non-basic index.
    non_basic_assignment: Vec<f64>,

    lower_bounds: Vec<f64>,
    upper_bounds: Vec<f64>,
    /// Cleared as soon as some variable's bounds cross.
    bounds_valid: bool,

    /// Values of the basic variables, by basic index.
    basic_assignment: Vec<f64>,
    assignment_status: AssignmentStatus,
    basic_status: Vec<BasicStatus>,

    /// Non-basic index chosen to enter the basis.
    entering_variable: usize,
    /// Basic index chosen to leave, or `m` when no basic leaves (fake pivot).
    leaving_variable: usize,
    /// The amount by which the entering variable changes in this pivot.
    change_ratio: f64,
    leaving_variable_increases: bool,

    /// FTRAN image of `b`, kept for row-scalar extraction.
    row_scalars: Vec<f64>,

    watchers: WatcherRegistry,
    stats: TableauStats,
}

impl<F: BasisFactorization> Default for Tableau<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: BasisFactorization> Tableau<F> {
    /// Create an empty tableau with default configuration.
    pub fn new() -> Self {
        Self::with_config(TableauConfig::default())
    }

    /// Create an empty tableau with the given configuration.
    pub fn with_config(config: TableauConfig) -> Self {
        Self {
            config,
            m: 0,
            n: 0,
            a: Vec::new(),
            change_column: Vec::new(),
            pivot_row: TableauRow::new(0),
            b: Vec::new(),
            unit_vector: Vec::new(),
            factorization: F::identity(0),
            cost_function: Vec::new(),
            basic_costs: Vec::new(),
            multipliers: Vec::new(),
            basic_index_to_variable: Vec::new(),
            non_basic_index_to_variable: Vec::new(),
            variable_to_index: Vec::new(),
            basic_variables: FxHashSet::default(),
            non_basic_assignment: Vec::new(),
            lower_bounds: Vec::new(),
            upper_bounds: Vec::new(),
            bounds_valid: true,
            basic_assignment: Vec::new(),
            assignment_status: AssignmentStatus::Invalid,
            basic_status: Vec::new(),
            entering_variable: 0,
            leaving_variable: 0,
            change_ratio: 0.0,
            leaving_variable_increases: false,
            row_scalars: Vec::new(),
            watchers: WatcherRegistry::default(),
            stats: TableauStats::default(),
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Allocate every buffer for an `m x n` system. Bounds default to
    /// unbounded and the basis to the identity.
    pub fn set_dimensions(&mut self, m: usize, n: usize) -> Result<(), TableauError> {
        debug_assert!(m <= n);
        self.m = m;
        self.n = n;

        self.a = alloc_buffer(0.0, n * m, "Tableau::A")?;
        self.change_column = alloc_buffer(0.0, m, "Tableau::changeColumn")?;
        self.pivot_row = TableauRow::new(n - m);
        self.b = alloc_buffer(0.0, m, "Tableau::b")?;
        self.unit_vector = alloc_buffer(0.0, m, "Tableau::unitVector")?;
        self.cost_function = alloc_buffer(0.0, n - m, "Tableau::costFunction")?;
        self.basic_costs = alloc_buffer(0.0, m, "Tableau::basicCosts")?;
        self.multipliers = alloc_buffer(0.0, m, "Tableau::multipliers")?;
        self.basic_index_to_variable = alloc_buffer(0, m, "Tableau::basicIndexToVariable")?;
        self.variable_to_index = alloc_buffer(0, n, "Tableau::variableToIndex")?;
        self.non_basic_index_to_variable =
            alloc_buffer(0, n - m, "Tableau::nonBasicIndexToVariable")?;
        self.non_basic_assignment = alloc_buffer(0.0, n - m, "Tableau::nonBasicAssignment")?;
        self.lower_bounds = alloc_buffer(f64::NEG_INFINITY, n, "Tableau::lowerBounds")?;
        self.upper_bounds = alloc_buffer(f64::INFINITY, n, "Tableau::upperBounds")?;
        self.basic_assignment = alloc_buffer(0.0, m, "Tableau::basicAssignment")?;
        self.basic_status = alloc_buffer(BasicStatus::Between, m, "Tableau::basicStatus")?;
        self.row_scalars = alloc_buffer(0.0, m, "Tableau::rowScalars")?;
        self.factorization = F::identity(m);

        self.basic_variables.clear();
        self.bounds_valid = true;
        self.assignment_status = AssignmentStatus::Invalid;
        self.entering_variable = 0;
        self.leaving_variable = m;
        self.change_ratio = 0.0;
        self.leaving_variable_increases = false;
        Ok(())
    }

    /// Set one entry of `A`.
    pub fn set_entry_value(&mut self, row: usize, column: usize, value: f64) {
        debug_assert!(row < self.m && column < self.n);
        self.a[column * self.m + row] = value;
    }

    /// Set the whole right-hand side vector.
    pub fn set_right_hand_side(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.m);
        self.b.copy_from_slice(values);
    }

    /// Set one entry of the right-hand side.
    pub fn set_right_hand_side_entry(&mut self, index: usize, value: f64) {
        debug_assert!(index < self.m);
        self.b[index] = value;
    }

    /// Mark a variable as basic in the initial basis.
    pub fn mark_as_basic(&mut self, variable: VarId) {
        debug_assert!(variable < self.n);
        self.basic_variables.insert(variable);
    }

    /// Assign indices from the marked initial basis, press every non-basic
    /// variable to its lower bound and compute the first assignment.
    ///
    /// The initial basis columns are expected to form the identity; the
    /// factorization starts there and is only told about later pivots.
    pub fn initialize_tableau(&mut self) {
        let mut basic_index = 0;
        let mut non_basic_index = 0;
        for variable in 0..self.n {
            if self.basic_variables.contains(&variable) {
                self.basic_index_to_variable[basic_index] = variable;
                self.variable_to_index[variable] = basic_index;
                basic_index += 1;
            } else {
                self.non_basic_index_to_variable[non_basic_index] = variable;
                self.variable_to_index[variable] = non_basic_index;
                non_basic_index += 1;
            }
        }
        debug_assert_eq!(basic_index, self.m);
        debug_assert_eq!(non_basic_index, self.n - self.m);

        for i in 0..self.n - self.m {
            let variable = self.non_basic_index_to_variable[i];
            let bound = self.lower_bounds[variable];
            self.set_non_basic_assignment(variable, bound);
        }

        self.compute_assignment();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Number of equality rows.
    pub fn get_m(&self) -> usize {
        self.m
    }

    /// Total number of variables.
    pub fn get_n(&self) -> usize {
        self.n
    }

    /// Current value of a variable, basic or not. Reading a basic value
    /// recomputes the assignment if it is stale.
    pub fn get_value(&mut self, variable: VarId) -> f64 {
        debug_assert!(variable < self.n);

        if !self.basic_variables.contains(&variable) {
            // Non-basic values are readable even while the assignment is
            // stale.
            return self.non_basic_assignment[self.variable_to_index[variable]];
        }

        if self.assignment_status != AssignmentStatus::Valid {
            self.compute_assignment();
        }
        self.basic_assignment[self.variable_to_index[variable]]
    }

    /// True iff the variable is currently basic.
    pub fn is_basic(&self, variable: VarId) -> bool {
        self.basic_variables.contains(&variable)
    }

    /// The variable at a basic index.
    pub fn basic_index_to_variable(&self, index: usize) -> VarId {
        debug_assert!(index < self.m);
        self.basic_index_to_variable[index]
    }

    /// The variable at a non-basic index.
    pub fn non_basic_index_to_variable(&self, index: usize) -> VarId {
        debug_assert!(index < self.n - self.m);
        self.non_basic_index_to_variable[index]
    }

    /// A variable's position in whichever index map applies to it.
    pub fn variable_to_index(&self, variable: VarId) -> usize {
        debug_assert!(variable < self.n);
        self.variable_to_index[variable]
    }

    /// Status of a basic variable.
    pub fn get_basic_status(&self, variable: VarId) -> BasicStatus {
        debug_assert!(self.basic_variables.contains(&variable));
        self.basic_status[self.variable_to_index[variable]]
    }

    /// True iff some basic variable violates a bound.
    pub fn exists_basic_out_of_bounds(&self) -> bool {
        (0..self.m).any(|i| self.basic_out_of_bounds(i))
    }

    /// Total bound violation over the basic variables.
    pub fn get_sum_of_infeasibilities(&self) -> f64 {
        let mut result = 0.0;
        for i in 0..self.m {
            let variable = self.basic_index_to_variable[i];
            if self.basic_too_low(i) {
                result += self.lower_bounds[variable] - self.basic_assignment[i];
            } else if self.basic_too_high(i) {
                result += self.basic_assignment[i] - self.upper_bounds[variable];
            }
        }
        result
    }

    /// The constraint matrix, column-major `n * m`.
    pub fn get_a(&self) -> &[f64] {
        &self.a
    }

    /// One column of `A`, length `m`. The slice is invalidated by the next
    /// mutation of the tableau.
    pub fn get_a_column(&self, variable: VarId) -> &[f64] {
        debug_assert!(variable < self.n);
        &self.a[variable * self.m..(variable + 1) * self.m]
    }

    /// The right-hand side vector.
    pub fn get_right_hand_side(&self) -> &[f64] {
        &self.b
    }

    /// Pivot statistics.
    pub fn stats(&self) -> &TableauStats {
        &self.stats
    }

    /// Reset all statistics counters.
    pub fn reset_stats(&mut self) {
        self.stats = TableauStats::default();
    }

    fn basic_too_low(&self, index: usize) -> bool {
        self.basic_status[index] == BasicStatus::BelowLb
    }

    fn basic_too_high(&self, index: usize) -> bool {
        self.basic_status[index] == BasicStatus::AboveUb
    }

    fn basic_out_of_bounds(&self, index: usize) -> bool {
        self.basic_status[index].is_out_of_bounds()
    }

    // ------------------------------------------------------------------
    // Assignment engine
    // ------------------------------------------------------------------

    /// Recompute the basic assignment from the non-basic one.
    ///
    /// The basic assignment is given by
    ///
    /// ```text
    /// xB = inv(B) * (b - AN * xN)
    /// ```
    ///
    /// where `AN` holds the non-basic columns of `A`. We accumulate
    /// `y = b - AN * xN` one column at a time, then FTRAN solves
    /// `B * xB = y`.
    pub fn compute_assignment(&mut self) {
        let mut y = self.b.clone();
        for i in 0..self.n - self.m {
            let variable = self.non_basic_index_to_variable[i];
            let value = self.non_basic_assignment[i];
            let column = &self.a[variable * self.m..(variable + 1) * self.m];
            for (accum, entry) in y.iter_mut().zip(column) {
                *accum -= entry * value;
            }
        }

        self.factorization
            .forward_transformation(&y, &mut self.basic_assignment);

        self.compute_basic_status_all();
        self.assignment_status = AssignmentStatus::Valid;

        for i in 0..self.m {
            let variable = self.basic_index_to_variable[i];
            let value = self.basic_assignment[i];
            self.notify_variable_value(variable, value);
        }
    }

    /// Assign a non-basic variable. Invalidates the basic assignment and
    /// notifies watchers.
    pub fn set_non_basic_assignment(&mut self, variable: VarId, value: f64) {
        debug_assert!(!self.basic_variables.contains(&variable));

        let index = self.variable_to_index[variable];
        self.non_basic_assignment[index] = value;
        self.assignment_status = AssignmentStatus::Invalid;

        self.notify_variable_value(variable, value);
    }

    fn compute_basic_status_all(&mut self) {
        for i in 0..self.m {
            self.compute_basic_status_one(i);
        }
    }

    fn compute_basic_status_one(&mut self, index: usize) {
        let variable = self.basic_index_to_variable[index];
        let lb = self.lower_bounds[variable];
        let ub = self.upper_bounds[variable];
        let value = self.basic_assignment[index];
        let tolerance = self.config.bound_comparison_tolerance;

        self.basic_status[index] = if float::gt_within(value, ub, tolerance) {
            BasicStatus::AboveUb
        } else if float::lt_within(value, lb, tolerance) {
            BasicStatus::BelowLb
        } else if float::are_equal_within(ub, value, tolerance) {
            BasicStatus::AtUb
        } else if float::are_equal_within(lb, value, tolerance) {
            BasicStatus::AtLb
        } else {
            BasicStatus::Between
        };
    }

    // ------------------------------------------------------------------
    // Cost and reduced-cost engine
    // ------------------------------------------------------------------

    /// Compute the cost function over the non-basic variables.
    ///
    /// Three steps:
    ///
    /// 1. Basic costs: -1 for a basic below its lower bound, +1 above its
    ///    upper bound, 0 in bounds. The objective is the sum of bound
    ///    violations.
    /// 2. Multipliers: `p = c * inv(B)`, solved by BTRAN.
    /// 3. Reduced costs: `-p * AN`, one non-basic column at a time.
    ///
    /// The constants `b` drop out because only the function's slope matters,
    /// and `xN` is omitted because we want the function, not its value at
    /// the current point.
    pub fn compute_cost_function(&mut self) {
        self.compute_basic_costs();
        self.compute_multipliers();
        self.compute_reduced_costs();
    }

    fn compute_basic_costs(&mut self) {
        for i in 0..self.m {
            self.basic_costs[i] = if self.basic_too_low(i) {
                -1.0
            } else if self.basic_too_high(i) {
                1.0
            } else {
                0.0
            };
        }
    }

    fn compute_multipliers(&mut self) {
        self.factorization
            .backward_transformation(&self.basic_costs, &mut self.multipliers);
    }

    /// Recompute one entry of the cost function from the current
    /// multipliers. Exposed for strategies that adjust single coefficients.
    pub fn compute_reduced_cost(&mut self, non_basic: usize) {
        debug_assert!(non_basic < self.n - self.m);

        let variable = self.non_basic_index_to_variable[non_basic];
        let column = &self.a[variable * self.m..(variable + 1) * self.m];
        let mut sum = 0.0;
        for (multiplier, entry) in self.multipliers.iter().zip(column) {
            sum -= multiplier * entry;
        }
        self.cost_function[non_basic] = sum;
    }

    fn compute_reduced_costs(&mut self) {
        for i in 0..self.n - self.m {
            self.compute_reduced_cost(i);
        }
    }

    /// The current cost function, indexed by non-basic index.
    pub fn get_cost_function(&self) -> &[f64] {
        &self.cost_function
    }

    /// Overwrite one cost-function entry. Entry-selection strategies use
    /// this to steer the ratio test.
    pub fn set_cost_function_entry(&mut self, non_basic: usize, value: f64) {
        debug_assert!(non_basic < self.n - self.m);
        self.cost_function[non_basic] = value;
    }

    // ------------------------------------------------------------------
    // Entry selection
    // ------------------------------------------------------------------

    /// True iff the non-basic can move up from its current value.
    pub fn non_basic_can_increase(&self, non_basic: usize) -> bool {
        let variable = self.non_basic_index_to_variable[non_basic];
        float::lt_within(
            self.non_basic_assignment[non_basic],
            self.upper_bounds[variable],
            self.config.epsilon,
        )
    }

    /// True iff the non-basic can move down from its current value.
    pub fn non_basic_can_decrease(&self, non_basic: usize) -> bool {
        let variable = self.non_basic_index_to_variable[non_basic];
        float::gt_within(
            self.non_basic_assignment[non_basic],
            self.lower_bounds[variable],
            self.config.epsilon,
        )
    }

    /// A non-basic is eligible to enter if its cost coefficient is positive
    /// and it has slack below, or negative and it has slack above.
    pub fn eligible_for_entry(&self, non_basic: usize) -> bool {
        let coefficient = self.cost_function[non_basic];
        if float::is_zero_within(coefficient, self.config.epsilon) {
            return false;
        }

        if float::is_positive_within(coefficient, self.config.epsilon) {
            self.non_basic_can_decrease(non_basic)
        } else {
            self.non_basic_can_increase(non_basic)
        }
    }

    /// All non-basic indices currently eligible to enter. The external
    /// entry-selection strategy picks from these.
    pub fn get_entry_candidates(&self) -> Vec<usize> {
        (0..self.n - self.m)
            .filter(|&i| self.eligible_for_entry(i))
            .collect()
    }

    /// Record the strategy's entering choice (a non-basic index).
    pub fn set_entering_variable_index(&mut self, non_basic: usize) {
        debug_assert!(non_basic < self.n - self.m);
        self.entering_variable = non_basic;
    }

    /// Record a leaving choice (a basic index) for a requested degenerate
    /// pivot.
    pub fn set_leaving_variable_index(&mut self, basic: usize) {
        debug_assert!(basic < self.m);
        self.leaving_variable = basic;
    }

    /// The entering variable.
    pub fn get_entering_variable(&self) -> VarId {
        self.non_basic_index_to_variable[self.entering_variable]
    }

    /// The entering variable's non-basic index.
    pub fn get_entering_variable_index(&self) -> usize {
        self.entering_variable
    }

    /// The leaving variable. During a fake pivot no basic leaves, so the
    /// entering variable is reported.
    pub fn get_leaving_variable(&self) -> VarId {
        if self.leaving_variable == self.m {
            return self.non_basic_index_to_variable[self.entering_variable];
        }
        self.basic_index_to_variable[self.leaving_variable]
    }

    /// The leaving basic index, or `m` when no basic leaves.
    pub fn get_leaving_variable_index(&self) -> usize {
        self.leaving_variable
    }

    /// The amount by which the entering variable will change.
    pub fn get_change_ratio(&self) -> f64 {
        self.change_ratio
    }

    /// True iff the selected pivot changes no basis: the entering variable
    /// just hops to its opposite bound.
    pub fn performing_fake_pivot(&self) -> bool {
        self.leaving_variable == self.m
    }

    // ------------------------------------------------------------------
    // Pivot engine
    // ------------------------------------------------------------------

    /// Compute `d = inv(B) * a` for the entering variable's column.
    pub fn compute_change_column(&mut self) {
        let variable = self.non_basic_index_to_variable[self.entering_variable];
        let column = &self.a[variable * self.m..(variable + 1) * self.m];
        self.factorization
            .forward_transformation(column, &mut self.change_column);
    }

    /// The change column computed by [`Self::compute_change_column`].
    pub fn get_change_column(&self) -> &[f64] {
        &self.change_column
    }

    /// Maximal ratio the given basic imposes on the entering variable's
    /// change. `coefficient` is the basic's change-column entry; `decrease`
    /// is true iff the entering variable is decreasing.
    pub fn ratio_constraint_per_basic(
        &self,
        basic_index: usize,
        coefficient: f64,
        decrease: bool,
    ) -> f64 {
        let basic = self.basic_index_to_variable[basic_index];
        let epsilon = self.config.epsilon;

        // Negate to the more convenient form basic = coefficient * nonBasic,
        // rather than basic + coefficient * nonBasic = 0.
        let coefficient = -coefficient;
        debug_assert!(!float::is_zero_within(coefficient, epsilon));

        let basic_decreasing = (float::is_positive_within(coefficient, epsilon) && decrease)
            || (float::is_negative_within(coefficient, epsilon) && !decrease);

        let max_change = if basic_decreasing {
            match self.basic_status[basic_index] {
                // Still above range: the first stop going down is the upper
                // bound.
                BasicStatus::AboveUb => self.upper_bounds[basic] - self.basic_assignment[basic_index],
                BasicStatus::Between | BasicStatus::AtUb => {
                    self.lower_bounds[basic] - self.basic_assignment[basic_index]
                }
                // Pressed against the bound, no movement.
                BasicStatus::AtLb => 0.0,
                // Below its lower bound already, unconstrained downward.
                BasicStatus::BelowLb => f64::NEG_INFINITY - self.basic_assignment[basic_index],
            }
        } else {
            match self.basic_status[basic_index] {
                BasicStatus::BelowLb => self.lower_bounds[basic] - self.basic_assignment[basic_index],
                BasicStatus::Between | BasicStatus::AtLb => {
                    self.upper_bounds[basic] - self.basic_assignment[basic_index]
                }
                BasicStatus::AtUb => 0.0,
                BasicStatus::AboveUb => f64::INFINITY - self.basic_assignment[basic_index],
            }
        };

        max_change / coefficient
    }

    /// Run the ratio test against the internal change column.
    pub fn pick_leaving_variable(&mut self) {
        let d = std::mem::take(&mut self.change_column);
        self.pick_leaving_variable_with(&d);
        self.change_column = d;
    }

    /// Run the ratio test against an explicit change column.
    ///
    /// The initial candidate is the entering variable's own bound-induced
    /// change; every basic with a change-column entry above the pivot
    /// tolerance may tighten it. If none does, the leaving index stays at
    /// the sentinel `m` and the pivot degenerates to a bound hop.
    pub fn pick_leaving_variable_with(&mut self, change_column: &[f64]) {
        debug_assert_eq!(change_column.len(), self.m);
        debug_assert!(!float::is_zero_within(
            self.cost_function[self.entering_variable],
            self.config.epsilon
        ));

        let decrease = float::is_positive_within(
            self.cost_function[self.entering_variable],
            self.config.epsilon,
        );

        let entering = self.non_basic_index_to_variable[self.entering_variable];
        let lb = self.lower_bounds[entering];
        let ub = self.upper_bounds[entering];
        let current = self.non_basic_assignment[self.entering_variable];

        self.leaving_variable = self.m;
        self.leaving_variable_increases = false;

        if decrease {
            // Bound-induced maximum decrease, a non-positive quantity.
            self.change_ratio = lb - current;

            for i in 0..self.m {
                if !float::is_zero_within(change_column[i], self.config.pivot_column_tolerance) {
                    let ratio = self.ratio_constraint_per_basic(i, change_column[i], true);
                    if ratio > self.change_ratio {
                        self.change_ratio = ratio;
                        self.leaving_variable = i;
                    }
                }
            }

            if self.leaving_variable < self.m {
                self.leaving_variable_increases = float::is_positive_within(
                    change_column[self.leaving_variable],
                    self.config.epsilon,
                );
            }
        } else {
            // Bound-induced maximum increase, a non-negative quantity.
            self.change_ratio = ub - current;

            for i in 0..self.m {
                if !float::is_zero_within(change_column[i], self.config.pivot_column_tolerance) {
                    let ratio = self.ratio_constraint_per_basic(i, change_column[i], false);
                    if ratio < self.change_ratio {
                        self.change_ratio = ratio;
                        self.leaving_variable = i;
                    }
                }
            }

            if self.leaving_variable < self.m {
                self.leaving_variable_increases = float::is_negative_within(
                    change_column[self.leaving_variable],
                    self.config.epsilon,
                );
            }
        }
    }

    /// Apply the selected pivot.
    ///
    /// With the leaving sentinel at `m` this is a fake pivot: the entering
    /// non-basic snaps to the bound it was moving toward and no basis
    /// changes. Otherwise membership and indices swap, the leaving variable
    /// lands on the bound it reached, and the factorization absorbs the
    /// change column as an eta update.
    pub fn perform_pivot(&mut self) {
        debug_assert!(self.bounds_valid, "pivoting while bounds are invalid");

        // Any kind of pivot invalidates the assignment.
        self.assignment_status = AssignmentStatus::Invalid;

        if self.leaving_variable == self.m {
            self.stats.bound_hops += 1;

            let decrease = float::is_positive_within(
                self.cost_function[self.entering_variable],
                self.config.epsilon,
            );
            let variable = self.non_basic_index_to_variable[self.entering_variable];
            let target = if decrease {
                self.lower_bounds[variable]
            } else {
                self.upper_bounds[variable]
            };

            tracing::trace!(
                variable,
                bound = target,
                decrease,
                "fake pivot: entering variable hops to its bound"
            );
            self.set_non_basic_assignment(variable, target);
            return;
        }

        self.stats.pivots += 1;

        let current_basic = self.basic_index_to_variable[self.leaving_variable];
        let current_non_basic = self.non_basic_index_to_variable[self.entering_variable];

        tracing::trace!(
            entering = current_non_basic,
            leaving = current_basic,
            ratio = self.change_ratio,
            "pivot"
        );

        self.basic_variables.insert(current_non_basic);
        self.basic_variables.remove(&current_basic);

        self.basic_index_to_variable[self.leaving_variable] = current_non_basic;
        self.non_basic_index_to_variable[self.entering_variable] = current_basic;
        self.variable_to_index[current_basic] = self.entering_variable;
        self.variable_to_index[current_non_basic] = self.leaving_variable;

        // The leaving variable lands on the bound it was moving toward.
        let status = self.basic_status[self.leaving_variable];
        let non_basic_assignment = if self.leaving_variable_increases {
            if status == BasicStatus::BelowLb {
                self.lower_bounds[current_basic]
            } else {
                self.upper_bounds[current_basic]
            }
        } else if status == BasicStatus::AboveUb {
            self.upper_bounds[current_basic]
        } else {
            self.lower_bounds[current_basic]
        };

        if float::is_zero_within(self.change_ratio, self.config.epsilon) {
            self.stats.degenerate_pivots += 1;
        }

        self.set_non_basic_assignment(current_basic, non_basic_assignment);

        // The column at the leaving index is the one that changed.
        let d = std::mem::take(&mut self.change_column);
        self.factorization.push_eta(self.leaving_variable, &d);
        self.change_column = d;
    }

    /// Swap the selected entering and leaving variables without moving any
    /// value. The leaving basic must be strictly within bounds so that it
    /// stays in bounds as a non-basic. Requires a prior
    /// [`Self::compute_change_column`] for the eta update.
    pub fn perform_degenerate_pivot(&mut self) {
        self.stats.degenerate_pivots += 1;
        self.stats.degenerate_pivots_by_request += 1;

        debug_assert!(self.entering_variable < self.n - self.m);
        debug_assert!(self.leaving_variable < self.m);
        debug_assert!(!self.basic_out_of_bounds(self.leaving_variable));

        let current_basic = self.basic_index_to_variable[self.leaving_variable];
        let current_non_basic = self.non_basic_index_to_variable[self.entering_variable];

        self.basic_variables.insert(current_non_basic);
        self.basic_variables.remove(&current_basic);

        self.basic_index_to_variable[self.leaving_variable] = current_non_basic;
        self.non_basic_index_to_variable[self.entering_variable] = current_basic;
        self.variable_to_index[current_basic] = self.entering_variable;
        self.variable_to_index[current_non_basic] = self.leaving_variable;

        let d = std::mem::take(&mut self.change_column);
        self.factorization.push_eta(self.leaving_variable, &d);
        self.change_column = d;

        // Exchange the assignment slots; every variable keeps its value.
        let temp = self.basic_assignment[self.leaving_variable];
        self.basic_assignment[self.leaving_variable] =
            self.non_basic_assignment[self.entering_variable];
        self.set_non_basic_assignment(current_basic, temp);

        // The basic slot now classifies a different variable, and no value
        // moved, so the assignment can stay valid.
        self.compute_basic_status_one(self.leaving_variable);
        self.assignment_status = AssignmentStatus::Valid;
    }

    // ------------------------------------------------------------------
    // Row extraction
    // ------------------------------------------------------------------

    /// Extract basic row `index` in symbolic form:
    /// `xB_index = scalar + sum(coefficient_j * xN_j)`.
    ///
    /// A unit vector BTRAN gives `e * inv(B)`; dotting it against each
    /// non-basic column yields the coefficients, and an FTRAN of `b` the
    /// scalar.
    pub fn get_tableau_row(&mut self, index: usize, row: &mut TableauRow) {
        debug_assert!(index < self.m);

        let non_basic_count = self.n - self.m;
        if row.entries.len() != non_basic_count {
            *row = TableauRow::new(non_basic_count);
        }

        self.unit_vector.fill(0.0);
        self.unit_vector[index] = 1.0;
        self.factorization
            .backward_transformation(&self.unit_vector, &mut self.multipliers);

        for i in 0..non_basic_count {
            let variable = self.non_basic_index_to_variable[i];
            let column = &self.a[variable * self.m..(variable + 1) * self.m];
            let mut coefficient = 0.0;
            for (multiplier, entry) in self.multipliers.iter().zip(column) {
                coefficient -= multiplier * entry;
            }
            row.entries[i] = RowEntry {
                variable,
                coefficient,
            };
        }

        self.factorization
            .forward_transformation(&self.b, &mut self.row_scalars);
        row.scalar = self.row_scalars[index];
    }

    /// Extract the leaving variable's row into the internal pivot row.
    pub fn compute_pivot_row(&mut self) {
        debug_assert!(self.leaving_variable < self.m);
        let mut row = std::mem::replace(&mut self.pivot_row, TableauRow::new(0));
        self.get_tableau_row(self.leaving_variable, &mut row);
        self.pivot_row = row;
    }

    /// The row extracted by [`Self::compute_pivot_row`].
    pub fn get_pivot_row(&self) -> &TableauRow {
        &self.pivot_row
    }

    /// Log every basic row at debug level.
    pub fn dump_equations(&mut self) {
        let mut row = TableauRow::new(self.n - self.m);
        for i in 0..self.m {
            let variable = self.basic_index_to_variable[i];
            self.get_tableau_row(i, &mut row);
            tracing::debug!("x{variable} = {row}");
        }
    }

    // ------------------------------------------------------------------
    // Dynamic growth
    // ------------------------------------------------------------------

    /// Add an equation with a fresh auxiliary variable.
    ///
    /// The auxiliary variable must equal the current `n`. The basis grows by
    /// embedding the condensed `B0` into an `(m+1)` square with a unit
    /// diagonal entry for the auxiliary variable; addends that are already
    /// basic contribute their coefficients to the new last row, expressing
    /// the equation over the current basis. The auxiliary variable becomes
    /// basic at index `m` and tracks the equation's slack.
    pub fn add_equation(&mut self, equation: &Equation) -> Result<(), TableauError> {
        if equation.aux_variable != self.n {
            return Err(TableauError::InvalidEquation {
                aux_variable: equation.aux_variable,
                expected: self.n,
            });
        }

        // Condense so B0 is explicit, then embed it top-left.
        self.factorization.condense_etas()?;
        let old_b0 = self.factorization.b0().to_vec();

        let new_m = self.m + 1;
        let mut new_b0 = alloc_buffer(0.0, new_m * new_m, "Tableau::newB0")?;
        for i in 0..self.m {
            new_b0[i * new_m..i * new_m + self.m]
                .copy_from_slice(&old_b0[i * self.m..(i + 1) * self.m]);
        }
        new_b0[(new_m - 1) * new_m + (new_m - 1)] = 1.0;

        self.add_row()?;

        let aux = equation.aux_variable;
        self.basic_variables.insert(aux);
        self.basic_index_to_variable[self.m - 1] = aux;
        self.variable_to_index[aux] = self.m - 1;

        self.b[self.m - 1] = equation.scalar;
        for addend in &equation.addends {
            self.set_entry_value(self.m - 1, addend.variable, addend.coefficient);

            // The equation is written over original variables, some of which
            // may have become basic since; those contribute to the last row
            // of B0.
            if self.basic_variables.contains(&addend.variable) {
                let index = self.variable_to_index[addend.variable];
                new_b0[(new_m - 1) * new_m + index] = addend.coefficient;
            }
        }

        self.factorization.set_b0(&new_b0)?;

        tracing::debug!(aux, m = self.m, n = self.n, "added equation");
        Ok(())
    }

    /// Grow every per-row and per-variable buffer by one. Structures sized
    /// `n - m` are untouched, since the difference is unchanged.
    fn add_row(&mut self) -> Result<(), TableauError> {
        let new_m = self.m + 1;
        let new_n = self.n + 1;

        let mut new_a = alloc_buffer(0.0, new_n * new_m, "Tableau::newA")?;
        for variable in 0..self.n {
            let old = &self.a[variable * self.m..(variable + 1) * self.m];
            new_a[variable * new_m..variable * new_m + self.m].copy_from_slice(old);
        }
        self.a = new_a;

        self.change_column = alloc_buffer(0.0, new_m, "Tableau::newChangeColumn")?;

        let mut new_b = alloc_buffer(0.0, new_m, "Tableau::newB")?;
        new_b[..self.m].copy_from_slice(&self.b);
        self.b = new_b;

        self.unit_vector = alloc_buffer(0.0, new_m, "Tableau::newUnitVector")?;
        self.basic_costs = alloc_buffer(0.0, new_m, "Tableau::newBasicCosts")?;
        self.multipliers = alloc_buffer(0.0, new_m, "Tableau::newMultipliers")?;

        let mut new_basic_index_to_variable =
            alloc_buffer(0, new_m, "Tableau::newBasicIndexToVariable")?;
        new_basic_index_to_variable[..self.m].copy_from_slice(&self.basic_index_to_variable);
        self.basic_index_to_variable = new_basic_index_to_variable;

        let mut new_variable_to_index = alloc_buffer(0, new_n, "Tableau::newVariableToIndex")?;
        new_variable_to_index[..self.n].copy_from_slice(&self.variable_to_index);
        self.variable_to_index = new_variable_to_index;

        let mut new_basic_assignment = alloc_buffer(0.0, new_m, "Tableau::newBasicAssignment")?;
        new_basic_assignment[..self.m].copy_from_slice(&self.basic_assignment);
        self.basic_assignment = new_basic_assignment;
        self.assignment_status = AssignmentStatus::Invalid;

        self.basic_status = alloc_buffer(BasicStatus::Between, new_m, "Tableau::newBasicStatus")?;

        let mut new_lower_bounds = alloc_buffer(0.0, new_n, "Tableau::newLowerBounds")?;
        new_lower_bounds[..self.n].copy_from_slice(&self.lower_bounds);
        new_lower_bounds[self.n] = f64::NEG_INFINITY;
        self.lower_bounds = new_lower_bounds;

        let mut new_upper_bounds = alloc_buffer(0.0, new_n, "Tableau::newUpperBounds")?;
        new_upper_bounds[..self.n].copy_from_slice(&self.upper_bounds);
        new_upper_bounds[self.n] = f64::INFINITY;
        self.upper_bounds = new_upper_bounds;

        self.row_scalars = alloc_buffer(0.0, new_m, "Tableau::newRowScalars")?;
        self.factorization = F::identity(new_m);

        self.m = new_m;
        self.n = new_n;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshot and restore
    // ------------------------------------------------------------------

    /// Deep-copy the tableau's state. The assignment must be valid.
    pub fn store_state(&self) -> TableauState<F> {
        debug_assert!(
            self.assignment_status == AssignmentStatus::Valid,
            "snapshot requires a valid assignment"
        );

        TableauState {
            m: self.m,
            n: self.n,
            a: self.a.clone(),
            b: self.b.clone(),
            lower_bounds: self.lower_bounds.clone(),
            upper_bounds: self.upper_bounds.clone(),
            basic_variables: self.basic_variables.clone(),
            basic_assignment: self.basic_assignment.clone(),
            non_basic_assignment: self.non_basic_assignment.clone(),
            basic_index_to_variable: self.basic_index_to_variable.clone(),
            non_basic_index_to_variable: self.non_basic_index_to_variable.clone(),
            variable_to_index: self.variable_to_index.clone(),
            factorization: self.factorization.store_factorization(),
            bounds_valid: self.bounds_valid,
        }
    }

    /// Restore a snapshot. Resizes to the snapshot's dimensions, copies
    /// everything back and revalidates the assignment without a solve, since
    /// the stored one is verbatim.
    pub fn restore_state(&mut self, state: &TableauState<F>) -> Result<(), TableauError> {
        self.set_dimensions(state.m, state.n)?;

        self.a.copy_from_slice(&state.a);
        self.b.copy_from_slice(&state.b);
        self.lower_bounds.copy_from_slice(&state.lower_bounds);
        self.upper_bounds.copy_from_slice(&state.upper_bounds);
        self.basic_variables = state.basic_variables.clone();
        self.basic_assignment.copy_from_slice(&state.basic_assignment);
        self.non_basic_assignment
            .copy_from_slice(&state.non_basic_assignment);
        self.basic_index_to_variable
            .copy_from_slice(&state.basic_index_to_variable);
        self.non_basic_index_to_variable
            .copy_from_slice(&state.non_basic_index_to_variable);
        self.variable_to_index.copy_from_slice(&state.variable_to_index);
        self.factorization.restore_factorization(&state.factorization);
        self.bounds_valid = state.bounds_valid;

        self.compute_basic_status_all();
        self.assignment_status = AssignmentStatus::Valid;

        tracing::debug!(m = self.m, n = self.n, "restored tableau state");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// Lower bound of a variable.
    pub fn get_lower_bound(&self, variable: VarId) -> f64 {
        debug_assert!(variable < self.n);
        self.lower_bounds[variable]
    }

    /// Upper bound of a variable.
    pub fn get_upper_bound(&self, variable: VarId) -> f64 {
        debug_assert!(variable < self.n);
        self.upper_bounds[variable]
    }

    /// Set a lower bound. Part of initialization; notifies watchers and
    /// rechecks bound validity.
    pub fn set_lower_bound(&mut self, variable: VarId, value: f64) {
        debug_assert!(variable < self.n);
        self.lower_bounds[variable] = value;
        self.notify_lower_bound(variable, value);
        self.check_bounds_valid_for(variable);
        self.refresh_basic_status(variable);
    }

    /// Set an upper bound. Part of initialization; notifies watchers and
    /// rechecks bound validity.
    pub fn set_upper_bound(&mut self, variable: VarId, value: f64) {
        debug_assert!(variable < self.n);
        self.upper_bounds[variable] = value;
        self.notify_upper_bound(variable, value);
        self.check_bounds_valid_for(variable);
        self.refresh_basic_status(variable);
    }

    /// Raise a lower bound discovered during the solve. Only a strict
    /// improvement is applied; a non-basic variable is clamped up to the new
    /// bound.
    pub fn tighten_lower_bound(&mut self, variable: VarId, value: f64) {
        debug_assert!(variable < self.n);

        if !float::gt_within(value, self.lower_bounds[variable], self.config.epsilon) {
            return;
        }

        self.stats.tightened_bounds += 1;
        self.set_lower_bound(variable, value);

        if !self.basic_variables.contains(&variable) {
            let index = self.variable_to_index[variable];
            if float::gt_within(value, self.non_basic_assignment[index], self.config.epsilon) {
                self.set_non_basic_assignment(variable, value);
            }
        }
    }

    /// Lower an upper bound discovered during the solve. Only a strict
    /// improvement is applied; a non-basic variable is clamped down to the
    /// new bound.
    pub fn tighten_upper_bound(&mut self, variable: VarId, value: f64) {
        debug_assert!(variable < self.n);

        if !float::lt_within(value, self.upper_bounds[variable], self.config.epsilon) {
            return;
        }

        self.stats.tightened_bounds += 1;
        self.set_upper_bound(variable, value);

        if !self.basic_variables.contains(&variable) {
            let index = self.variable_to_index[variable];
            if float::lt_within(value, self.non_basic_assignment[index], self.config.epsilon) {
                self.set_non_basic_assignment(variable, value);
            }
        }
    }

    /// False once some variable's bounds have crossed. The outer solver
    /// polls this after every bound change and backtracks when it clears.
    pub fn all_bounds_valid(&self) -> bool {
        self.bounds_valid
    }

    fn check_bounds_valid_for(&mut self, variable: VarId) {
        if !float::lte_within(
            self.lower_bounds[variable],
            self.upper_bounds[variable],
            self.config.epsilon,
        ) {
            self.bounds_valid = false;
        }
    }

    /// A bound move can reclassify a basic variable in place.
    fn refresh_basic_status(&mut self, variable: VarId) {
        if self.assignment_status == AssignmentStatus::Valid
            && self.basic_variables.contains(&variable)
        {
            let index = self.variable_to_index[variable];
            self.compute_basic_status_one(index);
        }
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Register a watcher for one variable's events.
    pub fn register_to_watch_variable(
        &mut self,
        watcher: &Rc<dyn VariableWatcher>,
        variable: VarId,
    ) {
        self.watchers.register(watcher, variable);
    }

    /// Remove a previously registered per-variable watcher.
    pub fn unregister_to_watch_variable(
        &mut self,
        watcher: &Rc<dyn VariableWatcher>,
        variable: VarId,
    ) {
        self.watchers.unregister(watcher, variable);
    }

    /// Register a watcher for every variable's events.
    pub fn register_to_watch_all_variables(&mut self, watcher: &Rc<dyn VariableWatcher>) {
        self.watchers.register_global(watcher);
    }

    fn notify_variable_value(&mut self, variable: VarId, value: f64) {
        for watcher in self.watchers.collect(variable) {
            if let Some(watcher) = watcher.upgrade() {
                watcher.notify_variable_value(self, variable, value);
            }
        }
    }

    fn notify_lower_bound(&mut self, variable: VarId, bound: f64) {
        for watcher in self.watchers.collect(variable) {
            if let Some(watcher) = watcher.upgrade() {
                watcher.notify_lower_bound(self, variable, bound);
            }
        }
    }

    fn notify_upper_bound(&mut self, variable: VarId, bound: f64) {
        for watcher in self.watchers.collect(variable) {
            if let Some(watcher) = watcher.upgrade() {
                watcher.notify_upper_bound(self, variable, bound);
            }
        }
    }

    // ------------------------------------------------------------------
    // Utilities
    // ------------------------------------------------------------------

    /// FTRAN passthrough: solve `B * x = y`.
    pub fn forward_transformation(&self, y: &[f64], x: &mut [f64]) {
        self.factorization.forward_transformation(y, x);
    }

    /// BTRAN passthrough: solve `x^T * B = y^T`.
    pub fn backward_transformation(&self, y: &[f64], x: &mut [f64]) {
        self.factorization.backward_transformation(y, x);
    }

    /// Assert that every non-basic variable sits within its bounds.
    pub fn verify_invariants(&self) {
        for i in 0..self.n - self.m {
            let variable = self.non_basic_index_to_variable[i];
            let value = self.non_basic_assignment[i];
            assert!(
                float::gte_within(value, self.lower_bounds[variable], self.config.epsilon)
                    && float::lte_within(value, self.upper_bounds[variable], self.config.epsilon),
                "non-basic x{variable} at {value} escapes [{}, {}]",
                self.lower_bounds[variable],
                self.upper_bounds[variable],
            );
        }
    }
}

impl<F: BasisFactorization> TableauAccess for Tableau<F> {
    fn get_m(&self) -> usize {
        self.m
    }

    fn get_n(&self) -> usize {
        self.n
    }

    fn get_lower_bound(&self, variable: VarId) -> f64 {
        Tableau::get_lower_bound(self, variable)
    }

    fn get_upper_bound(&self, variable: VarId) -> f64 {
        Tableau::get_upper_bound(self, variable)
    }

    fn is_basic(&self, variable: VarId) -> bool {
        Tableau::is_basic(self, variable)
    }

    fn all_bounds_valid(&self) -> bool {
        self.bounds_valid
    }

    fn tighten_lower_bound(&mut self, variable: VarId, value: f64) {
        Tableau::tighten_lower_bound(self, variable, value);
    }

    fn tighten_upper_bound(&mut self, variable: VarId, value: f64) {
        Tableau::tighten_upper_bound(self, variable, value);
    }
}
