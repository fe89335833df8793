//! Property-based tests for the tableau engine.

use plexus_simplex::{Tableau, VarId};
use proptest::prelude::*;

/// x0 + x2 = b0 and x1 + x3 = b1, slack variables 2 and 3 basic, the
/// non-basics bounded below at zero.
fn two_by_four(b: &[f64]) -> Tableau {
    let mut tableau: Tableau = Tableau::new();
    tableau.set_dimensions(2, 4).unwrap();
    tableau.set_entry_value(0, 0, 1.0);
    tableau.set_entry_value(1, 1, 1.0);
    tableau.set_entry_value(0, 2, 1.0);
    tableau.set_entry_value(1, 3, 1.0);
    tableau.set_right_hand_side(b);
    tableau.set_lower_bound(0, 0.0);
    tableau.set_lower_bound(1, 0.0);
    tableau.mark_as_basic(2);
    tableau.mark_as_basic(3);
    tableau.initialize_tableau();
    tableau
}

/// x0 + x1 = 0 with x0 basic, x0 in [0, 10] and x1 in [-10, 10].
fn one_by_two() -> Tableau {
    let mut tableau: Tableau = Tableau::new();
    tableau.set_dimensions(1, 2).unwrap();
    tableau.set_entry_value(0, 0, 1.0);
    tableau.set_entry_value(0, 1, 1.0);
    tableau.set_right_hand_side(&[0.0]);
    tableau.set_lower_bound(0, 0.0);
    tableau.set_upper_bound(0, 10.0);
    tableau.set_lower_bound(1, -10.0);
    tableau.set_upper_bound(1, 10.0);
    tableau.mark_as_basic(0);
    tableau.initialize_tableau();
    tableau
}

/// One outer-solver iteration: assignment, cost, candidates, enter, ratio
/// test, pivot. Returns false once no improving direction remains.
fn pivot_step(tableau: &mut Tableau) -> bool {
    tableau.compute_assignment();
    tableau.compute_cost_function();
    let candidates = tableau.get_entry_candidates();
    let Some(&entering) = candidates.first() else {
        return false;
    };
    tableau.set_entering_variable_index(entering);
    tableau.compute_change_column();
    tableau.pick_leaving_variable();
    tableau.perform_pivot();
    true
}

proptest! {
    #[test]
    fn non_basics_stay_in_bounds_under_tightening(
        b in prop::collection::vec(-5.0f64..5.0, 2),
        raises in prop::collection::vec((0usize..2, 0.0f64..3.0), 0..6),
    ) {
        let mut tableau = two_by_four(&b);
        for (variable, value) in raises {
            tableau.tighten_lower_bound(variable, value);
        }
        tableau.verify_invariants();
    }

    #[test]
    fn snapshot_restore_is_the_identity(start in -10.0f64..10.0) {
        let mut tableau = one_by_two();
        tableau.set_non_basic_assignment(1, start);
        let _ = tableau.get_value(0);

        let values: Vec<f64> = (0..2).map(|v| tableau.get_value(v)).collect();
        let basis: Vec<bool> = (0..2).map(|v| tableau.is_basic(v)).collect();
        let state = tableau.store_state();

        // Disturb everything restorable: bounds, assignment, possibly the
        // basis.
        tableau.tighten_upper_bound(1, 7.5);
        tableau.tighten_lower_bound(0, 1.0);
        while pivot_step(&mut tableau) {}

        tableau.restore_state(&state).unwrap();

        for variable in 0..2 {
            prop_assert!((tableau.get_value(variable) - values[variable]).abs() < 1e-9);
            prop_assert_eq!(tableau.is_basic(variable), basis[variable]);
        }
        prop_assert!((tableau.get_lower_bound(0) - 0.0).abs() < 1e-9);
        prop_assert!((tableau.get_upper_bound(1) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_pivot_preserves_every_value(
        b in prop::collection::vec(-5.0f64..5.0, 2),
        index in 0usize..2,
    ) {
        let mut tableau = two_by_four(&b);

        let before: Vec<f64> = (0..4).map(|v| tableau.get_value(v)).collect();

        // With the identity basis the change column of non-basic `index` has
        // its nonzero exactly at basic index `index`.
        tableau.set_entering_variable_index(index);
        tableau.set_leaving_variable_index(index);
        tableau.compute_change_column();
        tableau.perform_degenerate_pivot();

        for (variable, expected) in before.iter().enumerate() {
            prop_assert!((tableau.get_value(variable) - expected).abs() < 1e-9);
        }
        tableau.verify_invariants();
    }

    #[test]
    fn pivoting_keeps_the_equations_satisfied(start in -10.0f64..10.0) {
        let mut tableau = one_by_two();
        tableau.set_non_basic_assignment(1, start);
        let _ = tableau.get_value(0);

        for _ in 0..4 {
            // A * x = b holds whenever the assignment is live.
            let sum: f64 = (0..2).map(|v: VarId| tableau.get_value(v)).sum();
            prop_assert!(sum.abs() < 1e-6);
            tableau.verify_invariants();

            if !pivot_step(&mut tableau) {
                break;
            }
        }

        // No improving direction on this system means feasibility.
        tableau.compute_cost_function();
        if tableau.get_entry_candidates().is_empty() {
            let sum: f64 = (0..2).map(|v: VarId| tableau.get_value(v)).sum();
            prop_assert!(sum.abs() < 1e-6);
        }
    }
}
