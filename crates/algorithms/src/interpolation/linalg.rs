//! Dense linear algebra for kriging and variogram fitting
//!
//! The systems are small (tens to a few thousand unknowns) and dense, so a
//! straightforward Cholesky factorization and pivoted Gaussian elimination
//! are enough.

use geokrige_core::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// Lower-triangular Cholesky factor L of a symmetric positive definite matrix A = L·Lᵀ.
#[derive(Debug, Clone)]
pub(crate) struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor `a`. A pivot at or below `pivot_tol` is reported as
    /// [`Error::DegenerateInput`] along with the offending row.
    pub(crate) fn factor(a: &Array2<f64>, pivot_tol: f64) -> Result<Self> {
        let n = a.nrows();
        debug_assert_eq!(n, a.ncols(), "Cholesky requires a square matrix");

        let mut l = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut diag = a[[j, j]];
            for k in 0..j {
                diag -= l[[j, k]] * l[[j, k]];
            }
            if !diag.is_finite() || diag <= pivot_tol {
                return Err(Error::degenerate(format!(
                    "covariance matrix is singular or near-singular at observation {} \
                     (pivot {:.3e})",
                    j, diag
                )));
            }
            let ljj = diag.sqrt();
            l[[j, j]] = ljj;

            for i in (j + 1)..n {
                let mut sum = a[[i, j]];
                for k in 0..j {
                    sum -= l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = sum / ljj;
            }
        }

        Ok(Self { l })
    }

    pub(crate) fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Solve A·x = b with the stored factor (forward then back substitution).
    pub(crate) fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let l = &self.l;

        // L·y = b
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l[[i, j]] * y[j];
            }
            y[i] = sum / l[[i, i]];
        }

        // Lᵀ·x = y
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l[[j, i]] * x[j];
            }
            x[i] = sum / l[[i, i]];
        }
        x
    }
}

/// Solve A·x = b using Gaussian elimination with partial pivoting.
/// Used for the small damped normal equations of the variogram fit.
pub(crate) fn solve_dense(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();

    // Forward elimination
    for col in 0..n {
        let mut max_val = a[[col, col]].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = a[[row, col]].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-14 || !max_val.is_finite() {
            return Err(Error::Algorithm("singular linear system".into()));
        }

        if max_row != col {
            for j in 0..n {
                a.swap([col, j], [max_row, j]);
            }
            b.swap(col, max_row);
        }

        let pivot = a[[col, col]];
        for row in (col + 1)..n {
            let factor = a[[row, col]] / pivot;
            a[[row, col]] = 0.0;
            for j in (col + 1)..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution
    let mut x = Array1::<f64>::zeros(n);
    for col in (0..n).rev() {
        let mut sum = b[col];
        for j in (col + 1)..n {
            sum -= a[[col, j]] * x[j];
        }
        x[col] = sum / a[[col, col]];
    }

    Ok(x)
}
