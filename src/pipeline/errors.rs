//! Run-level errors for the CVR pipeline.
//!
//! [`CvrError`] is the single error type returned by [`crate::pipeline`]
//! entry points. It wraps the subtree errors through `From` so `?` works
//! across stage boundaries, and converts to a Python `ValueError` when the
//! `python-bindings` feature is enabled.
//!
//! ## Conventions
//! - Any `CvrError` means the run was aborted; no partial maps are returned.
//! - Per-unit regression failures never reach this type; they are reported
//!   through `VoxelStatus` and the run report.
use crate::{
    lag::errors::LagError, maps::errors::MapError, regression::errors::RegressionError,
    regressors::{errors::RegressorError, series::SampleTiming},
};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*};

pub type CvrResult<T> = Result<T, CvrError>;

/// Unified error type for a CVR run.
#[derive(Debug, Clone, PartialEq)]
pub enum CvrError {
    // ---- Stage errors ----
    Regressor(RegressorError),
    Regression(RegressionError),
    Lag(LagError),
    Map(MapError),

    // ---- Run configuration ----
    /// Responses do not match the engine's response timing or layout.
    ShapeMismatch { what: &'static str, expected: usize, actual: usize },
    /// Responses are sampled on a different grid than the engine's banks.
    TimingMismatch { expected: SampleTiming, actual: SampleTiming },
    /// The fine-search window holds no fine-grid candidate.
    EmptyWindow { min: f64, max: f64 },
    /// The full design (nuisance, regressor, derivative) has at least as
    /// many columns as the response has samples.
    DesignTooWide { columns: usize, len: usize },
    InvalidThreadCount,
    ThreadPool { reason: String },
    /// The representative series could not be formed (no finite unit).
    NoFiniteUnits,
}

impl std::error::Error for CvrError {}

impl std::fmt::Display for CvrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Stage errors ----
            CvrError::Regressor(err) => write!(f, "{err}"),
            CvrError::Regression(err) => write!(f, "{err}"),
            CvrError::Lag(err) => write!(f, "{err}"),
            CvrError::Map(err) => write!(f, "{err}"),

            // ---- Run configuration ----
            CvrError::ShapeMismatch { what, expected, actual } => {
                write!(f, "Shape mismatch in {what}: expected {expected}, got {actual}.")
            }
            CvrError::TimingMismatch { expected, actual } => write!(
                f,
                "Response timing (start {} s, interval {} s, {} samples) differs from the engine \
                 timing (start {} s, interval {} s, {} samples).",
                actual.start,
                actual.sample_interval,
                actual.len,
                expected.start,
                expected.sample_interval,
                expected.len
            ),
            CvrError::EmptyWindow { min, max } => {
                write!(f, "Lag window [{min}, {max}] contains no fine-grid candidate.")
            }
            CvrError::DesignTooWide { columns, len } => write!(
                f,
                "Design with {columns} columns needs more than {columns} samples; the responses \
                 have {len}."
            ),
            CvrError::InvalidThreadCount => write!(f, "Thread count must be ≥ 1."),
            CvrError::ThreadPool { reason } => write!(f, "Failed to build thread pool: {reason}"),
            CvrError::NoFiniteUnits => write!(
                f,
                "Cannot form a representative series: no unit has an all-finite time series."
            ),
        }
    }
}

impl From<RegressorError> for CvrError {
    fn from(err: RegressorError) -> Self {
        CvrError::Regressor(err)
    }
}

impl From<RegressionError> for CvrError {
    fn from(err: RegressionError) -> Self {
        CvrError::Regression(err)
    }
}

impl From<LagError> for CvrError {
    fn from(err: LagError) -> Self {
        CvrError::Lag(err)
    }
}

impl From<MapError> for CvrError {
    fn from(err: MapError) -> Self {
        CvrError::Map(err)
    }
}

/// Convert a [`CvrError`] into a Python `ValueError` with the error message.
#[cfg(feature = "python-bindings")]
impl From<CvrError> for PyErr {
    fn from(err: CvrError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `From` conversions from each stage error.
    // - Display messages forwarding the wrapped cause.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify stage errors convert and keep their message.
    //
    // Given
    // -----
    // - A range-exhaustion regressor error and a map count mismatch.
    //
    // Expect
    // ------
    // - Wrapped variants; Display equals the inner Display.
    fn stage_errors_convert_and_forward_display() {
        // Arrange
        let inner = RegressorError::LagRangeExhausted {
            lag: 9.0,
            needed: -3.0,
            available: (0.0, 100.0),
        };
        let map = MapError::ResultCountMismatch { expected: 3, actual: 1 };

        // Act
        let a: CvrError = inner.clone().into();
        let b: CvrError = map.clone().into();

        // Assert
        assert_eq!(a, CvrError::Regressor(inner.clone()));
        assert_eq!(a.to_string(), inner.to_string());
        assert_eq!(b.to_string(), map.to_string());
    }
}
