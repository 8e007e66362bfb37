//! regressors::legendre — Legendre nuisance basis for slow drift.
//!
//! Purpose
//! -------
//! Build the polynomial nuisance basis included in every fit: Legendre
//! polynomials of order `0..=order` evaluated over the normalized time index
//! `[-1, 1]`, optionally extended with user-supplied confound columns (e.g.
//! motion parameters).
//!
//! Key behaviors
//! -------------
//! - Evaluate `Pₙ(x)` via Bonnet's recursion
//!   `n·Pₙ(x) = (2n − 1)·x·Pₙ₋₁(x) − (n − 1)·Pₙ₋₂(x)`.
//! - Orthogonalize every column against the lower orders on the discrete
//!   grid (modified Gram–Schmidt) and rescale to unit max-abs, so the basis
//!   is exactly orthogonal and well conditioned at any order.
//! - Append confounds after projecting out the existing basis; confounds
//!   that are linearly redundant with it are flagged and pruned.
//!
//! Invariants & assumptions
//! ------------------------
//! - Column 0 is the constant `1`.
//! - Columns are pairwise orthogonal up to round-off; the span of the first
//!   `order + 1` columns equals the span of `P₀, …, P_order`.
//! - `order < len`, otherwise the basis cannot have full column rank.
//!
//! Testing notes
//! -------------
//! - Unit tests check the constant column, discrete orthogonality, the
//!   order/length guard, and pruning of a redundant confound.
use crate::regressors::errors::{RegressorError, RegressorResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use tracing::warn;

/// A confound whose residual norm (after projecting out the current basis)
/// falls below this fraction of its original norm is treated as redundant.
pub const REDUNDANCY_TOL: f64 = 1e-8;

/// NuisanceBasis — Legendre drift terms plus optional confounds.
///
/// Fields
/// ------
/// - `columns`: `Array2<f64>` of shape `(len, n_columns)`.
/// - `order`: highest Legendre order.
/// - `redundant_confounds`: indices (into the confound matrix passed to
///   [`NuisanceBasis::with_confounds`]) of pruned columns.
///
/// Notes
/// -----
/// - Built once per run and shared read-only by every voxel fit.
#[derive(Debug, Clone, PartialEq)]
pub struct NuisanceBasis {
    columns: Array2<f64>,
    order: usize,
    redundant_confounds: Vec<usize>,
}

impl NuisanceBasis {
    /// Build the Legendre basis of orders `0..=order` over `len` samples.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::OrderTooLarge` if `order >= len`.
    pub fn legendre(order: usize, len: usize) -> RegressorResult<Self> {
        if order >= len {
            return Err(RegressorError::OrderTooLarge { order, len });
        }

        let x = normalized_index(len);
        let mut raw: Vec<Array1<f64>> = Vec::with_capacity(order + 1);
        for n in 0..=order {
            let p = match n {
                0 => Array1::ones(len),
                1 => x.clone(),
                _ => {
                    let nf = n as f64;
                    (&x * &raw[n - 1] * (2.0 * nf - 1.0) - &raw[n - 2] * (nf - 1.0)) / nf
                }
            };
            raw.push(p);
        }

        let mut columns: Vec<Array1<f64>> = Vec::with_capacity(order + 1);
        for p in raw {
            let mut col = p;
            if !columns.is_empty() {
                project_out(&mut col, &columns);
            }
            if !rescale_max_abs(&mut col) {
                return Err(RegressorError::OrderTooLarge { order, len });
            }
            columns.push(col);
        }

        Ok(NuisanceBasis { columns: from_columns(len, &columns), order, redundant_confounds: vec![] })
    }

    /// Append confound columns (`len × m`) to the basis.
    ///
    /// Each confound is projected onto the orthogonal complement of the
    /// current basis. If what remains is smaller than [`REDUNDANCY_TOL`]
    /// times its original norm, the confound is pruned and its index is
    /// recorded in [`redundant_confounds`](Self::redundant_confounds).
    ///
    /// Errors
    /// ------
    /// - `RegressorError::ConfoundShapeMismatch` if the row count differs
    ///   from the basis length.
    /// - `RegressorError::NonFiniteConfound` for a column with NaN/±∞.
    pub fn with_confounds(self, confounds: ArrayView2<'_, f64>) -> RegressorResult<Self> {
        let len = self.len();
        if confounds.nrows() != len {
            return Err(RegressorError::ConfoundShapeMismatch {
                expected: len,
                actual: confounds.nrows(),
            });
        }

        let mut columns: Vec<Array1<f64>> =
            self.columns.columns().into_iter().map(|c| c.to_owned()).collect();
        let mut redundant = self.redundant_confounds;

        for (j, confound) in confounds.columns().into_iter().enumerate() {
            if confound.iter().any(|v| !v.is_finite()) {
                return Err(RegressorError::NonFiniteConfound { column: j });
            }
            let original_norm = norm(confound);
            let mut col = confound.to_owned();
            // Two passes keep the residual orthogonal when the confound is
            // nearly inside the current span.
            project_out(&mut col, &columns);
            project_out(&mut col, &columns);
            if original_norm == 0.0 || norm(col.view()) < REDUNDANCY_TOL * original_norm {
                warn!(confound = j, "redundant confound pruned from the nuisance basis");
                redundant.push(j);
                continue;
            }
            rescale_max_abs(&mut col);
            columns.push(col);
        }

        Ok(NuisanceBasis {
            columns: from_columns(len, &columns),
            order: self.order,
            redundant_confounds: redundant,
        })
    }

    pub fn columns(&self) -> ArrayView2<'_, f64> {
        self.columns.view()
    }

    /// Rows `start..end` of the basis, for fits restricted to a sub-window.
    pub fn rows(&self, start: usize, end: usize) -> ArrayView2<'_, f64> {
        self.columns.slice(s![start..end, ..])
    }

    pub fn len(&self) -> usize {
        self.columns.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.nrows() == 0
    }

    pub fn ncols(&self) -> usize {
        self.columns.ncols()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn redundant_confounds(&self) -> &[usize] {
        &self.redundant_confounds
    }
}

/// `len` equally spaced points on `[-1, 1]`.
fn normalized_index(len: usize) -> Array1<f64> {
    if len == 1 {
        return Array1::zeros(1);
    }
    Array1::linspace(-1.0, 1.0, len)
}

#[inline]
fn norm(v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Modified Gram–Schmidt step: remove from `col` its projection on each of
/// the (mutually orthogonal) `basis` columns.
fn project_out(col: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let bb = b.dot(b);
        if bb > 0.0 {
            let coef = col.dot(b) / bb;
            col.scaled_add(-coef, b);
        }
    }
}

/// Scale to unit max-abs. Returns `false` for an all-zero column.
fn rescale_max_abs(col: &mut Array1<f64>) -> bool {
    let max_abs = col.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if max_abs == 0.0 || !max_abs.is_finite() {
        return false;
    }
    col.mapv_inplace(|v| v / max_abs);
    true
}

fn from_columns(len: usize, columns: &[Array1<f64>]) -> Array2<f64> {
    Array2::from_shape_fn((len, columns.len()), |(i, j)| columns[j][i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Shape and constant column of the Legendre basis.
    // - Discrete orthogonality and unit max-abs scaling.
    // - The `order < len` guard.
    // - Pruning of redundant confounds and acceptance of informative ones.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify basic shape, the constant column, and that the linear column
    // matches P₁(x) = x on the normalized grid.
    //
    // Given
    // -----
    // - order = 2, len = 11.
    //
    // Expect
    // ------
    // - 3 columns; column 0 all ones; column 1 equals linspace(-1, 1, 11).
    fn legendre_basis_has_constant_and_linear_columns() {
        // Arrange / Act
        let basis = NuisanceBasis::legendre(2, 11).unwrap();

        // Assert
        assert_eq!(basis.ncols(), 3);
        assert_eq!(basis.len(), 11);
        let x = Array1::linspace(-1.0, 1.0, 11);
        for i in 0..11 {
            assert_relative_eq!(basis.columns()[[i, 0]], 1.0);
            assert_relative_eq!(basis.columns()[[i, 1]], x[i], epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Ensure columns are orthogonal on the discrete grid even at higher
    // order, where raw Legendre polynomials are not.
    //
    // Given
    // -----
    // - order = 5, len = 40.
    //
    // Expect
    // ------
    // - |cᵢ · cⱼ| < 1e-10 for all i ≠ j; max |cⱼ| = 1.
    fn legendre_basis_is_discretely_orthogonal() {
        // Arrange / Act
        let basis = NuisanceBasis::legendre(5, 40).unwrap();
        let cols = basis.columns();

        // Assert
        for i in 0..cols.ncols() {
            let ci = cols.column(i);
            let max_abs = ci.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            assert_relative_eq!(max_abs, 1.0, epsilon = 1e-12);
            for j in (i + 1)..cols.ncols() {
                let dot = ci.dot(&cols.column(j));
                assert!(dot.abs() < 1e-10, "columns {i} and {j} not orthogonal: {dot}");
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Ensure an order that is not smaller than the length is rejected.
    //
    // Given
    // -----
    // - order = 4, len = 4.
    //
    // Expect
    // ------
    // - `OrderTooLarge { order: 4, len: 4 }`.
    fn legendre_rejects_order_not_smaller_than_length() {
        // Act
        let result = NuisanceBasis::legendre(4, 4);

        // Assert
        assert_eq!(result, Err(RegressorError::OrderTooLarge { order: 4, len: 4 }));
    }

    #[test]
    // Purpose
    // -------
    // Verify that a confound lying in the span of the basis is pruned and
    // flagged, while an informative confound is kept.
    //
    // Given
    // -----
    // - order = 1 basis over 20 samples.
    // - Confound 0 = 3 + 2·t (linear, redundant).
    // - Confound 1 = sin(t) (informative).
    //
    // Expect
    // ------
    // - redundant_confounds == [0]; ncols == 3.
    fn with_confounds_prunes_redundant_columns() {
        // Arrange
        let len = 20;
        let basis = NuisanceBasis::legendre(1, len).unwrap();
        let confounds =
            Array2::from_shape_fn((len, 2), |(i, j)| match j {
                0 => 3.0 + 2.0 * i as f64,
                _ => (i as f64).sin(),
            });

        // Act
        let extended = basis.with_confounds(confounds.view()).unwrap();

        // Assert
        assert_eq!(extended.redundant_confounds(), &[0]);
        assert_eq!(extended.ncols(), 3);
    }

    #[test]
    // Purpose
    // -------
    // Ensure confounds with the wrong row count are rejected.
    //
    // Given
    // -----
    // - Basis over 10 samples; confounds with 9 rows.
    //
    // Expect
    // ------
    // - `ConfoundShapeMismatch { expected: 10, actual: 9 }`.
    fn with_confounds_rejects_row_mismatch() {
        // Arrange
        let basis = NuisanceBasis::legendre(1, 10).unwrap();
        let confounds = Array2::<f64>::zeros((9, 1));

        // Act
        let result = basis.with_confounds(confounds.view());

        // Assert
        assert_eq!(
            result,
            Err(RegressorError::ConfoundShapeMismatch { expected: 10, actual: 9 })
        );
    }
}
