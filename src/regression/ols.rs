//! regression::ols — QR-based ordinary least squares with rank detection.
//!
//! Purpose
//! -------
//! Fit `y = Xβ + ε` for one design matrix and one response, returning the
//! coefficients, residual and total sums of squares, the coefficient of
//! determination, and inference for the amplitude coefficient. This is both
//! the scoring function of the lag search and the final per-voxel fit.
//!
//! Key behaviors
//! -------------
//! - Copy the `ndarray` design into a `nalgebra::DMatrix` and factor it with
//!   a Householder QR; no normal-equations inverse is ever formed.
//! - Detect rank deficiency column by column: column `j` is rejected when
//!   `|R_jj| ≤ RANK_TOL · ‖x_j‖`, i.e. when the part of `x_j` orthogonal to
//!   the previous columns is negligible relative to `x_j` itself. The check
//!   is scale-invariant, so a CO2 regressor in mmHg and unit-scaled
//!   Legendre columns are treated alike.
//! - Compute `R² = 1 − RSS/TSS`. Values within [`R2_TOL`] of `[0, 1]` are
//!   clamped; anything further out is a numerical fault.
//! - Report the amplitude standard error `σ̂·‖R⁻ᵀ e_a‖`, its t-statistic
//!   and a two-sided Student-t p-value (`statrs`).
//!
//! Invariants & assumptions
//! ------------------------
//! - `R² ∈ [0, 1]` presumes an intercept (or a column spanning the
//!   constant) in the design; the nuisance basis always provides one.
//! - A successful fit always has `n_obs > n_params`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover exact recovery on noiseless data, agreement with a
//!   hand-computed simple regression, rank-deficiency detection for a
//!   duplicated column, the constant-response guard, and inference values on
//!   a perfect fit.
use crate::regression::errors::{RegressionError, RegressionResult};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Relative threshold on `|R_jj| / ‖x_j‖` below which column `j` is treated
/// as linearly dependent on the previous columns.
pub const RANK_TOL: f64 = 1e-10;

/// Slack allowed outside `[0, 1]` before R² is reported as a fault.
pub const R2_TOL: f64 = 1e-9;

/// FitResult — outcome of one OLS fit.
///
/// Fields
/// ------
/// - `coefficients`: one per design column.
/// - `rss`: residual sum of squares.
/// - `tss`: total sum of squares of the response around its mean.
/// - `r_squared`: `1 − rss/tss`, clamped to `[0, 1]`.
/// - `dof`: residual degrees of freedom `n_obs − n_params`.
/// - `amplitude_column`: index of the coefficient reported as amplitude.
/// - `amplitude_se`: standard error of that coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub coefficients: Array1<f64>,
    pub rss: f64,
    pub tss: f64,
    pub r_squared: f64,
    pub dof: usize,
    pub amplitude_column: usize,
    pub amplitude_se: f64,
}

impl FitResult {
    /// Coefficient of the amplitude column (the CVR value).
    pub fn amplitude(&self) -> f64 {
        self.coefficients[self.amplitude_column]
    }

    /// `amplitude / amplitude_se`. Infinite for a perfect, non-zero fit.
    pub fn t_stat(&self) -> f64 {
        let beta = self.amplitude();
        if self.amplitude_se > 0.0 {
            beta / self.amplitude_se
        } else if beta == 0.0 {
            0.0
        } else {
            beta.signum() * f64::INFINITY
        }
    }

    /// Two-sided p-value of the amplitude t-statistic.
    pub fn p_value(&self) -> f64 {
        let t = self.t_stat();
        if !t.is_finite() {
            return 0.0;
        }
        StudentsT::new(0.0, 1.0, self.dof as f64).map(|d| 2.0 * d.sf(t.abs())).unwrap_or(f64::NAN)
    }
}

/// Fit `response ≈ design · β` by least squares.
///
/// Parameters
/// ----------
/// - `design`: `ArrayView2<f64>` of shape `(n_obs, n_params)`.
/// - `response`: `ArrayView1<f64>` of length `n_obs`.
/// - `amplitude_column`: index of the coefficient whose standard error and
///   t-statistic are reported.
///
/// Returns
/// -------
/// `RegressionResult<FitResult>`
///
/// Errors
/// ------
/// - `DimensionMismatch`, `InvalidAmplitudeColumn` for caller mistakes.
/// - `Underdetermined` when `n_obs ≤ n_params`.
/// - `NonFiniteResponse`, `ConstantResponse` for unusable responses.
/// - `RankDeficient { column }` for the first dependent column.
/// - `RSquaredOutOfRange` when R² leaves `[0, 1]` beyond [`R2_TOL`].
pub fn fit_ols(
    design: ArrayView2<'_, f64>, response: ArrayView1<'_, f64>, amplitude_column: usize,
) -> RegressionResult<FitResult> {
    let (n, k) = design.dim();
    if response.len() != n {
        return Err(RegressionError::DimensionMismatch { rows: n, response: response.len() });
    }
    if amplitude_column >= k {
        return Err(RegressionError::InvalidAmplitudeColumn { column: amplitude_column, ncols: k });
    }
    if n <= k {
        return Err(RegressionError::Underdetermined { n_obs: n, n_params: k });
    }
    if let Some((index, &value)) = response.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(RegressionError::NonFiniteResponse { index, value });
    }

    let mean = response.sum() / n as f64;
    let tss: f64 = response.iter().map(|v| (v - mean) * (v - mean)).sum();
    if tss <= 0.0 {
        return Err(RegressionError::ConstantResponse);
    }

    let x = DMatrix::from_fn(n, k, |i, j| design[[i, j]]);
    let y = DVector::from_iterator(n, response.iter().copied());

    let qr = x.clone().qr();
    let r = qr.r();
    for j in 0..k {
        let col_norm = x.column(j).norm();
        if col_norm == 0.0 || r[(j, j)].abs() <= RANK_TOL * col_norm {
            return Err(RegressionError::RankDeficient { column: j });
        }
    }

    let qty = qr.q().transpose() * &y;
    let beta = r
        .solve_upper_triangular(&qty)
        .ok_or(RegressionError::RankDeficient { column: k - 1 })?;

    let residuals = &y - &x * &beta;
    let rss = residuals.norm_squared();
    let r_squared = 1.0 - rss / tss;
    if !r_squared.is_finite() || r_squared < -R2_TOL || r_squared > 1.0 + R2_TOL {
        return Err(RegressionError::RSquaredOutOfRange { value: r_squared });
    }

    let dof = n - k;
    let sigma2 = rss / dof as f64;
    let mut unit = DVector::<f64>::zeros(k);
    unit[amplitude_column] = 1.0;
    let amplitude_se = r
        .transpose()
        .solve_lower_triangular(&unit)
        .map(|z| (sigma2 * z.norm_squared()).sqrt())
        .ok_or(RegressionError::RankDeficient { column: amplitude_column })?;

    Ok(FitResult {
        coefficients: Array1::from_iter(beta.iter().copied()),
        rss,
        tss,
        r_squared: r_squared.clamp(0.0, 1.0),
        dof,
        amplitude_column,
        amplitude_se,
    })
}
