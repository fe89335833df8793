//! Property-based tests for the basis factorization.
//!
//! The laws checked here are the ones the tableau relies on: FTRAN solves
//! the basis, BTRAN solves its transpose, the two agree on the bilinear
//! form, and condensing the eta file changes nothing observable.

use plexus_simplex::{BasisFactorization, EtaFactorization};
use proptest::prelude::*;

const M: usize = 4;

/// Diagonally dominant matrices stay comfortably invertible.
fn matrix_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0f64..1.0, M * M).prop_map(|mut entries| {
        for i in 0..M {
            let bump = M as f64 + 1.0;
            entries[i * M + i] += if entries[i * M + i] >= 0.0 { bump } else { -bump };
        }
        entries
    })
}

fn vector_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10.0f64..10.0, M)
}

fn matvec(matrix: &[f64], x: &[f64]) -> Vec<f64> {
    (0..M)
        .map(|i| (0..M).map(|j| matrix[i * M + j] * x[j]).sum())
        .collect()
}

fn vecmat(x: &[f64], matrix: &[f64]) -> Vec<f64> {
    (0..M)
        .map(|j| (0..M).map(|i| x[i] * matrix[i * M + j]).sum())
        .collect()
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

proptest! {
    #[test]
    fn ftran_solves_the_basis(matrix in matrix_strategy(), y in vector_strategy()) {
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();

        let mut x = vec![0.0; M];
        factorization.forward_transformation(&y, &mut x);

        for (reproduced, original) in matvec(&matrix, &x).iter().zip(&y) {
            prop_assert!((reproduced - original).abs() < 1e-6);
        }
    }

    #[test]
    fn btran_solves_the_transpose(matrix in matrix_strategy(), y in vector_strategy()) {
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();

        let mut x = vec![0.0; M];
        factorization.backward_transformation(&y, &mut x);

        for (reproduced, original) in vecmat(&x, &matrix).iter().zip(&y) {
            prop_assert!((reproduced - original).abs() < 1e-6);
        }
    }

    #[test]
    fn ftran_and_btran_agree_on_the_bilinear_form(
        matrix in matrix_strategy(),
        y in vector_strategy(),
        z in vector_strategy(),
    ) {
        // z^T * (B^-1 * y) and (z^T * B^-1) * y are the same number.
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();

        let mut forward = vec![0.0; M];
        factorization.forward_transformation(&y, &mut forward);
        let mut backward = vec![0.0; M];
        factorization.backward_transformation(&z, &mut backward);

        prop_assert!((dot(&z, &forward) - dot(&backward, &y)).abs() < 1e-6);
    }

    #[test]
    fn eta_updates_track_the_replaced_column(
        matrix in matrix_strategy(),
        y in vector_strategy(),
        column in 0usize..M,
        scale in 1.5f64..3.0,
    ) {
        // Replace one column with a scaled copy of itself; the replaced
        // matrix stays invertible and is easy to write down explicitly.
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();

        let a: Vec<f64> = (0..M).map(|i| scale * matrix[i * M + column]).collect();
        let mut d = vec![0.0; M];
        factorization.forward_transformation(&a, &mut d);
        factorization.push_eta(column, &d);

        let mut replaced = matrix.clone();
        for i in 0..M {
            replaced[i * M + column] = a[i];
        }

        let mut x = vec![0.0; M];
        factorization.forward_transformation(&y, &mut x);
        for (reproduced, original) in matvec(&replaced, &x).iter().zip(&y) {
            prop_assert!((reproduced - original).abs() < 1e-6);
        }
    }

    #[test]
    fn condensing_preserves_both_solves(
        matrix in matrix_strategy(),
        y in vector_strategy(),
        column in 0usize..M,
        scale in 1.5f64..3.0,
    ) {
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();

        let a: Vec<f64> = (0..M).map(|i| scale * matrix[i * M + column]).collect();
        let mut d = vec![0.0; M];
        factorization.forward_transformation(&a, &mut d);
        factorization.push_eta(column, &d);

        let mut forward_before = vec![0.0; M];
        factorization.forward_transformation(&y, &mut forward_before);
        let mut backward_before = vec![0.0; M];
        factorization.backward_transformation(&y, &mut backward_before);

        factorization.condense_etas().unwrap();
        prop_assert_eq!(factorization.eta_count(), 0);

        let mut forward_after = vec![0.0; M];
        factorization.forward_transformation(&y, &mut forward_after);
        let mut backward_after = vec![0.0; M];
        factorization.backward_transformation(&y, &mut backward_after);

        for (before, after) in forward_before.iter().zip(&forward_after) {
            prop_assert!((before - after).abs() < 1e-6);
        }
        for (before, after) in backward_before.iter().zip(&backward_after) {
            prop_assert!((before - after).abs() < 1e-6);
        }
    }

    #[test]
    fn store_restore_round_trips(
        matrix in matrix_strategy(),
        y in vector_strategy(),
        column in 0usize..M,
    ) {
        let mut factorization = EtaFactorization::identity(M);
        factorization.set_b0(&matrix).unwrap();
        let stored = factorization.store_factorization();

        // Disturb the factorization, then restore.
        let a: Vec<f64> = (0..M).map(|i| 2.0 * matrix[i * M + column]).collect();
        let mut d = vec![0.0; M];
        factorization.forward_transformation(&a, &mut d);
        factorization.push_eta(column, &d);
        factorization.restore_factorization(&stored);

        let mut x = vec![0.0; M];
        factorization.forward_transformation(&y, &mut x);
        for (reproduced, original) in matvec(&matrix, &x).iter().zip(&y) {
            prop_assert!((reproduced - original).abs() < 1e-6);
        }
    }
}
