//! regressors::errors — failures while preparing regressors and nuisance bases.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias used by every builder in the
//! `regressors` subtree: time-series containers, the lag grid, the regressor
//! bank, and the Legendre nuisance basis.
//!
//! Key behaviors
//! -------------
//! - Attach human-readable `Display` messages embedding the offending value,
//!   so run-level diagnostics are meaningful without extra context.
//! - Keep variants small and `Clone` so they can be wrapped by the run-level
//!   `CvrError` without allocation beyond the message payloads.
//!
//! Conventions
//! -----------
//! - All times and lags are expressed in seconds.
//! - Every variant here is structural: when one escapes a builder the run
//!   cannot proceed and must be aborted by the caller.

pub type RegressorResult<T> = Result<T, RegressorError>;

/// RegressorError — structural failures of the regressor-preparation stage.
///
/// Variants
/// --------
/// - `EmptySeries`
///   A series has fewer than two samples, so no sample interval can be
///   associated with it.
/// - `NonFiniteValue { index, value }`
///   A regressor sample is NaN or ±∞.
/// - `InvalidSampleInterval { value }`
///   Sample interval is non-finite or not strictly positive.
/// - `InvalidStart { value }`
///   Start offset is non-finite.
/// - `InvalidLagRange { min, max }`
///   Lag limits are non-finite or `min > max`.
/// - `InvalidStep { step }`
///   Fine step is non-finite or not strictly positive.
/// - `StepNotDivisor { step, sample_interval }`
///   Fine step does not evenly subdivide the response sample interval.
/// - `LagRangeExhausted { lag, needed, available }`
///   Shifting the regressor by `lag` needs regressor samples at time
///   `needed`, outside the recorded span `available = (start, end)`.
/// - `OrderTooLarge { order, len }`
///   Polynomial order is not smaller than the response length.
/// - `ConfoundShapeMismatch { expected, actual }`
///   Confound matrix row count differs from the response length.
/// - `NonFiniteConfound { column }`
///   A confound column contains NaN or ±∞.
/// - `EmptyGrid { min, max }`
///   The lag range contains no grid point.
#[derive(Debug, Clone, PartialEq)]
pub enum RegressorError {
    // ---- Series validation ----
    EmptySeries,
    NonFiniteValue { index: usize, value: f64 },
    InvalidSampleInterval { value: f64 },
    InvalidStart { value: f64 },

    // ---- Lag grid ----
    InvalidLagRange { min: f64, max: f64 },
    InvalidStep { step: f64 },
    StepNotDivisor { step: f64, sample_interval: f64 },
    EmptyGrid { min: f64, max: f64 },

    // ---- Bank construction ----
    LagRangeExhausted { lag: f64, needed: f64, available: (f64, f64) },

    // ---- Nuisance basis ----
    OrderTooLarge { order: usize, len: usize },
    ConfoundShapeMismatch { expected: usize, actual: usize },
    NonFiniteConfound { column: usize },
}

impl std::error::Error for RegressorError {}

impl std::fmt::Display for RegressorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Series validation ----
            RegressorError::EmptySeries => {
                write!(f, "Time series must contain at least 2 samples.")
            }
            RegressorError::NonFiniteValue { index, value } => {
                write!(f, "Non-finite sample {value} at index {index}.")
            }
            RegressorError::InvalidSampleInterval { value } => {
                write!(f, "Invalid sample interval {value}. Must be finite and > 0.")
            }
            RegressorError::InvalidStart { value } => {
                write!(f, "Invalid start offset {value}. Must be finite.")
            }

            // ---- Lag grid ----
            RegressorError::InvalidLagRange { min, max } => {
                write!(f, "Invalid lag range [{min}, {max}]. Limits must be finite with min ≤ max.")
            }
            RegressorError::InvalidStep { step } => {
                write!(f, "Invalid lag step {step}. Must be finite and > 0.")
            }
            RegressorError::StepNotDivisor { step, sample_interval } => write!(
                f,
                "Lag step {step} does not evenly subdivide the sample interval {sample_interval}."
            ),
            RegressorError::EmptyGrid { min, max } => {
                write!(f, "Lag range [{min}, {max}] contains no grid point.")
            }

            // ---- Bank construction ----
            RegressorError::LagRangeExhausted { lag, needed, available } => write!(
                f,
                "Shifting the regressor by {lag} s needs data at t = {needed} s, outside the \
                 recorded span [{}, {}] s.",
                available.0, available.1
            ),

            // ---- Nuisance basis ----
            RegressorError::OrderTooLarge { order, len } => write!(
                f,
                "Polynomial order {order} must be smaller than the series length {len}."
            ),
            RegressorError::ConfoundShapeMismatch { expected, actual } => {
                write!(f, "Confounds have {actual} rows, expected {expected}.")
            }
            RegressorError::NonFiniteConfound { column } => {
                write!(f, "Confound column {column} contains non-finite values.")
            }
        }
    }
}
