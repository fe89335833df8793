//! Basis factorizations.
//!
//! The tableau never inspects its basis matrix `B` directly. It consumes it
//! through the [`BasisFactorization`] trait: forward and backward triangular
//! solves, rank-1 eta updates after each pivot, and explicit access to the
//! condensed basis for dynamic growth. Refactorization policy is entirely
//! the factorization's concern.
//!
//! [`EtaFactorization`] is the provided implementation. It keeps an explicit
//! dense `B0` with a cached LU decomposition (partial pivoting), plus an eta
//! file recording the column replacements performed since `B0` was last
//! rebuilt. A solve against `B = B0 * E1 * ... * Ek` runs the LU passes and
//! then replays the eta file; once the file grows past a threshold it is
//! condensed back into `B0` and the LU is recomputed.

use crate::error::TableauError;
use crate::float;

/// Eta updates accumulated before [`EtaFactorization`] condenses them into
/// an explicit `B0`.
pub const DEFAULT_CONDENSE_THRESHOLD: usize = 64;

/// Abstract carrier of the basis matrix `B`.
pub trait BasisFactorization: Sized {
    /// Create a factorization of the `m x m` identity basis.
    fn identity(m: usize) -> Self;

    /// Basis dimension `m`.
    fn dimension(&self) -> usize;

    /// Solve `B * x = y` (FTRAN).
    fn forward_transformation(&self, y: &[f64], x: &mut [f64]);

    /// Solve `x^T * B = y^T` (BTRAN).
    fn backward_transformation(&self, y: &[f64], x: &mut [f64]);

    /// Record that basis column `column_index` was replaced by a column `a`
    /// with change image `d = B^-1 * a`. Subsequent solves honour the new
    /// basis.
    fn push_eta(&mut self, column_index: usize, d: &[f64]);

    /// Collapse all outstanding eta updates into the explicit basis matrix.
    /// Fails if the condensed basis is numerically singular; the eta file
    /// is left intact in that case and solves stay exact.
    fn condense_etas(&mut self) -> Result<(), TableauError>;

    /// The explicit basis matrix, row-major `m * m`. Callers must condense
    /// first; the eta file must be empty.
    fn b0(&self) -> &[f64];

    /// Replace the basis with an explicit row-major `m * m` matrix. Fails
    /// if the matrix is numerically singular, leaving the previous basis in
    /// place.
    fn set_b0(&mut self, b0: &[f64]) -> Result<(), TableauError>;

    /// Deep-copy snapshot.
    fn store_factorization(&self) -> Self;

    /// Restore from a snapshot taken by [`Self::store_factorization`].
    fn restore_factorization(&mut self, stored: &Self);
}

/// A rank-1 basis update: the identity with one column replaced.
#[derive(Debug, Clone)]
struct EtaMatrix {
    /// Index of the replaced column.
    column: usize,
    /// The replacing column, dense.
    values: Vec<f64>,
}

impl EtaMatrix {
    /// In-place solve `E * x' = x`.
    fn forward_solve(&self, x: &mut [f64]) {
        let c = self.column;
        let pivot = x[c] / self.values[c];
        x[c] = pivot;
        for (i, value) in self.values.iter().enumerate() {
            if i != c {
                x[i] -= value * pivot;
            }
        }
    }

    /// In-place solve `x'^T * E = x^T`.
    fn backward_solve(&self, x: &mut [f64]) {
        let c = self.column;
        let mut sum = 0.0;
        for (i, value) in self.values.iter().enumerate() {
            if i != c {
                sum += value * x[i];
            }
        }
        x[c] = (x[c] - sum) / self.values[c];
    }
}

/// Dense LU decomposition with partial pivoting.
///
/// Row `i` of the factored matrix is row `perm[i]` of the original. `L` is
/// unit lower triangular and shares storage with `U`.
#[derive(Debug, Clone)]
struct LuDecomposition {
    m: usize,
    lu: Vec<f64>,
    perm: Vec<usize>,
}

impl LuDecomposition {
    fn identity(m: usize) -> Self {
        let mut lu = vec![0.0; m * m];
        for i in 0..m {
            lu[i * m + i] = 1.0;
        }
        Self {
            m,
            lu,
            perm: (0..m).collect(),
        }
    }

    fn factor(m: usize, matrix: &[f64]) -> Result<Self, TableauError> {
        debug_assert_eq!(matrix.len(), m * m);

        let mut lu = matrix.to_vec();
        let mut perm: Vec<usize> = (0..m).collect();

        for k in 0..m {
            let mut pivot_row = k;
            let mut best = lu[k * m + k].abs();
            for i in k + 1..m {
                let candidate = lu[i * m + k].abs();
                if candidate > best {
                    best = candidate;
                    pivot_row = i;
                }
            }
            if pivot_row != k {
                perm.swap(k, pivot_row);
                for j in 0..m {
                    lu.swap(k * m + j, pivot_row * m + j);
                }
            }

            // The pivot is the column's largest remaining entry; a vanishing
            // one means the matrix has no usable rank here.
            let pivot = lu[k * m + k];
            if float::is_zero(pivot) {
                return Err(TableauError::SingularBasis { column: k });
            }
            for i in k + 1..m {
                let factor = lu[i * m + k] / pivot;
                lu[i * m + k] = factor;
                for j in k + 1..m {
                    lu[i * m + j] -= factor * lu[k * m + j];
                }
            }
        }

        Ok(Self { m, lu, perm })
    }

    /// Solve `A * x = y`.
    fn solve(&self, y: &[f64], x: &mut [f64]) {
        let m = self.m;

        // L * w = P * y, with w stored in x.
        for i in 0..m {
            let mut sum = y[self.perm[i]];
            for j in 0..i {
                sum -= self.lu[i * m + j] * x[j];
            }
            x[i] = sum;
        }

        // U * x = w.
        for i in (0..m).rev() {
            let mut sum = x[i];
            for j in i + 1..m {
                sum -= self.lu[i * m + j] * x[j];
            }
            x[i] = sum / self.lu[i * m + i];
        }
    }

    /// Solve `A^T * x = y`.
    fn solve_transposed(&self, y: &[f64], x: &mut [f64]) {
        let m = self.m;
        let mut work = y.to_vec();

        // U^T * w = y.
        for i in 0..m {
            let mut sum = work[i];
            for j in 0..i {
                sum -= self.lu[j * m + i] * work[j];
            }
            work[i] = sum / self.lu[i * m + i];
        }

        // L^T * v = w, unit diagonal.
        for i in (0..m).rev() {
            let mut sum = work[i];
            for j in i + 1..m {
                sum -= self.lu[j * m + i] * work[j];
            }
            work[i] = sum;
        }

        // Undo the row permutation.
        for i in 0..m {
            x[self.perm[i]] = work[i];
        }
    }
}

/// Explicit dense `B0` plus an eta file, with a cached LU of `B0`.
#[derive(Debug, Clone)]
pub struct EtaFactorization {
    m: usize,
    /// Explicit basis matrix, row-major. Valid once the eta file is empty.
    b0: Vec<f64>,
    lu: LuDecomposition,
    etas: Vec<EtaMatrix>,
    condense_threshold: usize,
    /// True while `b0` is still the identity, letting solves skip the LU
    /// passes.
    identity_b0: bool,
}

impl EtaFactorization {
    /// Override the eta-condense threshold.
    pub fn with_condense_threshold(mut self, threshold: usize) -> Self {
        self.condense_threshold = threshold.max(1);
        self
    }

    /// Outstanding eta updates.
    pub fn eta_count(&self) -> usize {
        self.etas.len()
    }
}

impl BasisFactorization for EtaFactorization {
    fn identity(m: usize) -> Self {
        let mut b0 = vec![0.0; m * m];
        for i in 0..m {
            b0[i * m + i] = 1.0;
        }
        Self {
            m,
            b0,
            lu: LuDecomposition::identity(m),
            etas: Vec::new(),
            condense_threshold: DEFAULT_CONDENSE_THRESHOLD,
            identity_b0: true,
        }
    }

    fn dimension(&self) -> usize {
        self.m
    }

    fn forward_transformation(&self, y: &[f64], x: &mut [f64]) {
        debug_assert_eq!(y.len(), self.m);
        debug_assert_eq!(x.len(), self.m);

        if self.identity_b0 {
            x.copy_from_slice(y);
        } else {
            self.lu.solve(y, x);
        }
        for eta in &self.etas {
            eta.forward_solve(x);
        }
    }

    fn backward_transformation(&self, y: &[f64], x: &mut [f64]) {
        debug_assert_eq!(y.len(), self.m);
        debug_assert_eq!(x.len(), self.m);

        let mut work = y.to_vec();
        for eta in self.etas.iter().rev() {
            eta.backward_solve(&mut work);
        }
        if self.identity_b0 {
            x.copy_from_slice(&work);
        } else {
            self.lu.solve_transposed(&work, x);
        }
    }

    fn push_eta(&mut self, column_index: usize, d: &[f64]) {
        debug_assert!(column_index < self.m);
        debug_assert_eq!(d.len(), self.m);
        debug_assert!(
            !float::is_zero(d[column_index]),
            "eta pivot element is zero"
        );

        self.etas.push(EtaMatrix {
            column: column_index,
            values: d.to_vec(),
        });

        if self.etas.len() >= self.condense_threshold {
            tracing::trace!(
                etas = self.etas.len(),
                "eta file full, condensing into explicit basis"
            );
            if let Err(error) = self.condense_etas() {
                // The eta file stays and solves keep replaying it exactly;
                // condensing is retried on the next push.
                tracing::warn!(%error, "condense failed, keeping eta file");
            }
        }
    }

    fn condense_etas(&mut self) -> Result<(), TableauError> {
        if self.etas.is_empty() {
            return Ok(());
        }

        let m = self.m;
        let mut condensed = self.b0.clone();
        let mut column = vec![0.0; m];
        for eta in &self.etas {
            // Replace column `eta.column` of the condensed matrix with its
            // image of d.
            for i in 0..m {
                let mut sum = 0.0;
                for j in 0..m {
                    sum += condensed[i * m + j] * eta.values[j];
                }
                column[i] = sum;
            }
            for i in 0..m {
                condensed[i * m + eta.column] = column[i];
            }
        }

        // Commit only once the condensed matrix factors.
        let lu = LuDecomposition::factor(m, &condensed)?;
        self.b0 = condensed;
        self.lu = lu;
        self.etas.clear();
        self.identity_b0 = false;
        Ok(())
    }

    fn b0(&self) -> &[f64] {
        debug_assert!(self.etas.is_empty(), "condense etas before reading B0");
        &self.b0
    }

    fn set_b0(&mut self, b0: &[f64]) -> Result<(), TableauError> {
        debug_assert_eq!(b0.len(), self.m * self.m);
        let lu = LuDecomposition::factor(self.m, b0)?;
        self.b0.copy_from_slice(b0);
        self.lu = lu;
        self.etas.clear();
        self.identity_b0 = false;
        Ok(())
    }

    fn store_factorization(&self) -> Self {
        self.clone()
    }

    fn restore_factorization(&mut self, stored: &Self) {
        self.clone_from(stored);
    }
}
