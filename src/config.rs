//! Engine configuration.

use crate::float::DEFAULT_EPSILON;

/// Numerical configuration for the tableau engine.
#[derive(Debug, Clone, Copy)]
pub struct TableauConfig {
    /// General comparison epsilon.
    pub epsilon: f64,
    /// Tolerance used only when classifying basic variables against their
    /// bounds. Looser than the general epsilon so that values hovering at a
    /// bound are reported as sitting on it.
    pub bound_comparison_tolerance: f64,
    /// Change-column entries below this magnitude are treated as
    /// structurally zero during the ratio test, so near-zero reductions do
    /// not produce spurious pivots.
    pub pivot_column_tolerance: f64,
}

impl Default for TableauConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            bound_comparison_tolerance: 1e-7,
            pivot_column_tolerance: 1e-8,
        }
    }
}
