//! CVR options — configuration for a lag-optimized CVR run.
//!
//! Purpose
//! -------
//! Collect every knob of the two-stage lag search and the final regression
//! in one validated value, so the engine receives explicit settings instead
//! of ad-hoc flags.
//!
//! Key behaviors
//! -------------
//! - [`CvrOptions`] bundles the lag range, fine step, nuisance basis order,
//!   derivative flag, bulk-shift options, legacy upper-limit exclusion,
//!   parallelism, and the missing-value sentinel.
//! - [`Parallelism`] selects the sequential loop or a rayon-partitioned one.
//!
//! Invariants & assumptions
//! ------------------------
//! - `CvrOptions::new` checks only what can be checked without data:
//!   `fine_step > 0` and a non-zero thread count. Whether the fine step
//!   divides the response sample interval is checked when the engine is
//!   built.
//! - The result of a run does not depend on `parallelism`.
//!
//! Conventions
//! -----------
//! - All lags and steps are in seconds.
//! - With the `serde` feature, every option type derives
//!   `Serialize`/`Deserialize` so an outer CLI can load it from a file.
//!
//! Testing notes
//! -------------
//! - Unit tests check defaults and the validation performed by `new`.
//!   Behavioral coverage lives in the engine and integration tests.
use crate::{
    lag::bulk::BulkShiftOptions,
    pipeline::errors::{CvrError, CvrResult},
    regressors::{bank::LagRange, errors::RegressorError},
};

/// How the per-unit loop is scheduled.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Single-threaded loop in unit order.
    #[default]
    Sequential,
    /// Rayon work-stealing over unit chunks. `threads: None` uses the global
    /// pool; `Some(n)` builds a dedicated pool of `n` workers.
    Rayon { threads: Option<usize> },
}

/// CvrOptions — configuration of a CVR run.
///
/// Fields
/// ------
/// - `lag_range`: [`LagRange`] searched, in seconds (default `±9`).
/// - `fine_step`: fine-grid spacing; must evenly subdivide the response
///   sample interval (default `0.1`).
/// - `polynomial_order`: highest Legendre order in the nuisance basis
///   (default `2`).
/// - `derivative`: append the regressor's time derivative to the design
///   (default `false`).
/// - `bulk`: [`BulkShiftOptions`].
/// - `exclude_upper_limit`: drop the fine candidate exactly on
///   `lag_range.max()` (legacy grid; default `false`).
/// - `parallelism`: [`Parallelism`] (default sequential).
/// - `missing_value`: sentinel for masked/invalid map entries (default NaN).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvrOptions {
    pub lag_range: LagRange,
    pub fine_step: f64,
    pub polynomial_order: usize,
    pub derivative: bool,
    pub bulk: BulkShiftOptions,
    pub exclude_upper_limit: bool,
    pub parallelism: Parallelism,
    pub missing_value: f64,
}

impl CvrOptions {
    /// Construct validated options.
    ///
    /// Errors
    /// ------
    /// - `CvrError::Regressor(InvalidStep)` for a non-positive or non-finite
    ///   `fine_step`.
    /// - `CvrError::InvalidThreadCount` for `Rayon { threads: Some(0) }`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lag_range: LagRange, fine_step: f64, polynomial_order: usize, derivative: bool,
        bulk: BulkShiftOptions, exclude_upper_limit: bool, parallelism: Parallelism,
        missing_value: f64,
    ) -> CvrResult<Self> {
        if !fine_step.is_finite() || fine_step <= 0.0 {
            return Err(RegressorError::InvalidStep { step: fine_step }.into());
        }
        if parallelism == (Parallelism::Rayon { threads: Some(0) }) {
            return Err(CvrError::InvalidThreadCount);
        }
        Ok(CvrOptions {
            lag_range,
            fine_step,
            polynomial_order,
            derivative,
            bulk,
            exclude_upper_limit,
            parallelism,
            missing_value,
        })
    }
}

impl Default for CvrOptions {
    fn default() -> Self {
        CvrOptions {
            lag_range: LagRange::default(),
            fine_step: 0.1,
            polynomial_order: 2,
            derivative: false,
            bulk: BulkShiftOptions::default(),
            exclude_upper_limit: false,
            parallelism: Parallelism::Sequential,
            missing_value: f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Documented defaults.
    // - Validation of fine step and thread count.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify documented defaults.
    //
    // Given
    // -----
    // - `CvrOptions::default()`.
    //
    // Expect
    // ------
    // - ±9 s range, step 0.1, order 2, sequential, NaN sentinel.
    fn default_options_match_documentation() {
        let opts = CvrOptions::default();
        assert_eq!((opts.lag_range.min(), opts.lag_range.max()), (-9.0, 9.0));
        assert_eq!(opts.fine_step, 0.1);
        assert_eq!(opts.polynomial_order, 2);
        assert!(!opts.derivative && !opts.exclude_upper_limit);
        assert_eq!(opts.parallelism, Parallelism::Sequential);
        assert!(opts.missing_value.is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Ensure invalid fine steps and zero threads are rejected.
    //
    // Given
    // -----
    // - fine_step = 0 and threads = Some(0).
    //
    // Expect
    // ------
    // - InvalidStep and InvalidThreadCount respectively.
    fn new_rejects_invalid_step_and_threads() {
        // Arrange
        let range = LagRange::default();
        let bulk = BulkShiftOptions::default();

        // Act
        let bad_step =
            CvrOptions::new(range, 0.0, 1, false, bulk, false, Parallelism::Sequential, f64::NAN);
        let bad_threads = CvrOptions::new(
            range,
            0.5,
            1,
            false,
            bulk,
            false,
            Parallelism::Rayon { threads: Some(0) },
            f64::NAN,
        );

        // Assert
        assert_eq!(bad_step, Err(CvrError::Regressor(RegressorError::InvalidStep { step: 0.0 })));
        assert_eq!(bad_threads, Err(CvrError::InvalidThreadCount));
    }
}
