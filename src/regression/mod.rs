//! regression — least-squares engine used to score and report every fit.
//!
//! Purpose
//! -------
//! Provide the numerically stable OLS fit (QR with an explicit per-column
//! rank check) and the reusable design matrix into which the lag search
//! substitutes one candidate regressor at a time.
//!
//! Key behaviors
//! -------------
//! - [`fit_ols`] returns a [`FitResult`] (coefficients, RSS, TSS, R²,
//!   amplitude standard error / t / p) or a [`RegressionError`] that
//!   separates rank deficiency from degenerate responses and numerical
//!   faults.
//! - [`DesignMatrix`] lays out `[nuisance | regressor | derivative?]` and
//!   always reports the regressor coefficient as the amplitude.
//!
//! Invariants & assumptions
//! ------------------------
//! - A returned `FitResult` has `r_squared ∈ [0, 1]` and `dof ≥ 1`.
//! - Low R² is a valid outcome, not an error.
//!
//! Conventions
//! -----------
//! - `ndarray` at the API boundary; `nalgebra` only inside [`fit_ols`] for
//!   the factorization.
//! - Pure functions: no logging, no global state.

pub mod design;
pub mod errors;
pub mod ols;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::design::{DesignMatrix, gradient_into};
pub use self::errors::{RegressionError, RegressionResult};
pub use self::ols::{FitResult, R2_TOL, RANK_TOL, fit_ols};
