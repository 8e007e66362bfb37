//! regression::errors — failures of a single least-squares fit.
//!
//! Purpose
//! -------
//! Distinguish the ways one OLS fit can fail: caller mistakes (dimension
//! mismatches), structurally unsolvable systems (underdetermined or rank
//! deficient), degenerate responses, and numerical faults. A poor fit
//! (low R²) is never an error.
//!
//! Conventions
//! -----------
//! - Inside the voxel loop these errors are caught and turned into a
//!   per-voxel status; they only abort a run when raised by the bulk-shift
//!   stage on the representative series.

pub type RegressionResult<T> = Result<T, RegressionError>;

/// RegressionError — why a fit produced no coefficients.
///
/// Variants
/// --------
/// - `DimensionMismatch { rows, response }`
///   Design matrix rows and response length differ.
/// - `InvalidAmplitudeColumn { column, ncols }`
///   The column designated as amplitude does not exist.
/// - `Underdetermined { n_obs, n_params }`
///   No residual degrees of freedom (`n_obs ≤ n_params`).
/// - `RankDeficient { column }`
///   Column `column` is (numerically) a linear combination of the columns
///   before it.
/// - `ConstantResponse`
///   The response has zero total sum of squares, so R² is undefined.
/// - `NonFiniteResponse { index, value }`
///   The response contains NaN or ±∞.
/// - `RSquaredOutOfRange { value }`
///   R² fell outside `[0, 1]` beyond tolerance (numerical fault).
#[derive(Debug, Clone, PartialEq)]
pub enum RegressionError {
    // ---- Caller contract ----
    DimensionMismatch { rows: usize, response: usize },
    InvalidAmplitudeColumn { column: usize, ncols: usize },

    // ---- Structure ----
    Underdetermined { n_obs: usize, n_params: usize },
    RankDeficient { column: usize },

    // ---- Response ----
    ConstantResponse,
    NonFiniteResponse { index: usize, value: f64 },

    // ---- Numerical ----
    RSquaredOutOfRange { value: f64 },
}

impl RegressionError {
    /// `true` when a design column is linearly dependent on earlier ones.
    pub fn is_rank_deficiency(&self) -> bool {
        matches!(self, RegressionError::RankDeficient { .. })
    }
}

impl std::error::Error for RegressionError {}

impl std::fmt::Display for RegressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Caller contract ----
            RegressionError::DimensionMismatch { rows, response } => write!(
                f,
                "Regression Error: design has {rows} rows but the response has {response} samples"
            ),
            RegressionError::InvalidAmplitudeColumn { column, ncols } => write!(
                f,
                "Regression Error: amplitude column {column} out of range for {ncols} columns"
            ),

            // ---- Structure ----
            RegressionError::Underdetermined { n_obs, n_params } => write!(
                f,
                "Regression Error: {n_obs} observations cannot determine {n_params} parameters"
            ),
            RegressionError::RankDeficient { column } => {
                write!(f, "Regression Error: design matrix is rank deficient at column {column}")
            }

            // ---- Response ----
            RegressionError::ConstantResponse => {
                write!(f, "Regression Error: response is constant (zero total sum of squares)")
            }
            RegressionError::NonFiniteResponse { index, value } => {
                write!(f, "Regression Error: non-finite response value {value} at index {index}")
            }

            // ---- Numerical ----
            RegressionError::RSquaredOutOfRange { value } => {
                write!(f, "Regression Error: R² = {value} outside [0, 1]")
            }
        }
    }
}
