//! Error types for the tableau engine.

use crate::VarId;

/// Errors surfaced by the tableau engine.
///
/// Both variants are fatal to the caller. Recoverable conditions (invalid
/// bounds, no improving direction, fake pivots) are reported through queries
/// instead, and precondition violations are debug assertions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableauError {
    /// A buffer allocation failed.
    #[error("allocation failed for buffer `{buffer}`")]
    Allocation {
        /// Name of the buffer whose allocation failed.
        buffer: &'static str,
    },

    /// An equation was added whose auxiliary variable is not fresh.
    #[error("invalid equation: auxiliary variable {aux_variable} must equal the tableau width {expected}")]
    InvalidEquation {
        /// The auxiliary variable carried by the equation.
        aux_variable: VarId,
        /// The tableau's current total variable count.
        expected: VarId,
    },

    /// The basis matrix is numerically singular: partial pivoting found no
    /// usable pivot while refactorizing.
    #[error("singular basis matrix: no usable pivot in column {column}")]
    SingularBasis {
        /// The elimination column with no usable pivot.
        column: usize,
    },
}

/// Allocate a buffer of `len` copies of `value`, or fail with the buffer's
/// name. All sized tableau buffers go through this.
pub(crate) fn alloc_buffer<T: Clone>(
    value: T,
    len: usize,
    buffer: &'static str,
) -> Result<Vec<T>, TableauError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| TableauError::Allocation { buffer })?;
    v.resize(len, value);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_buffer() {
        let v = alloc_buffer(0.0f64, 4, "test").unwrap();
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_error_display() {
        let err = TableauError::Allocation { buffer: "Tableau::A" };
        assert!(err.to_string().contains("Tableau::A"));

        let err = TableauError::InvalidEquation {
            aux_variable: 3,
            expected: 5,
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('5'));
    }
}
