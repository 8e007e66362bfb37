//! lag::errors — failures of the bulk-shift stage.
//!
//! Purpose
//! -------
//! Report why a global (bulk) lag could not be estimated from the
//! representative series. All variants abort the run: without a bulk shift
//! there is no window for the per-voxel search. Per-voxel failures never
//! use this type; they become a `VoxelStatus`.
use crate::regression::errors::RegressionError;

pub type LagResult<T> = Result<T, LagError>;

/// LagError — bulk-shift configuration and estimation failures.
///
/// Variants
/// --------
/// - `LengthMismatch { expected, actual }`
///   Representative series length differs from the bank/basis length.
/// - `NonFiniteRepresentative { index, value }`
///   The representative series contains NaN/±∞.
/// - `TooFewSamples { available, required }`
///   The trial structure leaves too few samples for a match.
/// - `InvalidTrialStructure { trial_len, n_trials }`
///   Non-positive trial length or zero trials.
/// - `InvalidHalfWidth { value }`
///   Fine-window half-width is negative or non-finite.
/// - `NoValidCandidate`
///   No coarse candidate produced a finite score.
/// - `Regression(RegressionError)`
///   The representative series itself cannot be fitted (e.g. it is
///   constant).
#[derive(Debug, Clone, PartialEq)]
pub enum LagError {
    // ---- Input shape ----
    LengthMismatch { expected: usize, actual: usize },
    NonFiniteRepresentative { index: usize, value: f64 },
    TooFewSamples { available: usize, required: usize },

    // ---- Options ----
    InvalidTrialStructure { trial_len: f64, n_trials: usize },
    InvalidHalfWidth { value: f64 },

    // ---- Estimation ----
    NoValidCandidate,
    Regression(RegressionError),
}

impl From<RegressionError> for LagError {
    fn from(err: RegressionError) -> Self {
        LagError::Regression(err)
    }
}

impl std::error::Error for LagError {}

impl std::fmt::Display for LagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Input shape ----
            LagError::LengthMismatch { expected, actual } => write!(
                f,
                "Bulk shift: representative series has {actual} samples, expected {expected}."
            ),
            LagError::NonFiniteRepresentative { index, value } => write!(
                f,
                "Bulk shift: representative series has non-finite value {value} at index {index}."
            ),
            LagError::TooFewSamples { available, required } => write!(
                f,
                "Bulk shift: {available} samples left after trial exclusion, need at least \
                 {required}."
            ),

            // ---- Options ----
            LagError::InvalidTrialStructure { trial_len, n_trials } => write!(
                f,
                "Invalid trial structure ({n_trials} trials of {trial_len} s). Trial length \
                 must be > 0 and there must be at least one trial."
            ),
            LagError::InvalidHalfWidth { value } => {
                write!(f, "Invalid fine-window half-width {value}. Must be finite and ≥ 0.")
            }

            // ---- Estimation ----
            LagError::NoValidCandidate => {
                write!(f, "Bulk shift: no candidate lag produced a finite score.")
            }
            LagError::Regression(err) => write!(f, "Bulk shift: {err}"),
        }
    }
}
