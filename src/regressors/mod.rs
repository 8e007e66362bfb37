//! regressors — inputs of the lag search, built once per run.
//!
//! Purpose
//! -------
//! Turn the physiological regressor and the response sampling grid into the
//! immutable objects every voxel fit reads: banks of lag-shifted regressors
//! (coarse and fine) and the Legendre nuisance basis.
//!
//! Key behaviors
//! -------------
//! - [`TimeSeries`], [`SampleTiming`] and [`ResponseData`] validate raw
//!   inputs and provide interpolation at arbitrary instants.
//! - [`LagRange`] and [`LagGrid`] describe admissible lags and their
//!   discretization; [`RegressorBank`] materializes the shifted regressors.
//! - [`NuisanceBasis`] builds orthogonal Legendre drift terms, optionally
//!   extended with confounds.
//! - Every failure is structural and reported through [`RegressorError`].
//!
//! Conventions
//! -----------
//! - Seconds everywhere. A positive lag means the response trails the
//!   physiological regressor.
//!
//! Downstream usage
//! ----------------
//! - `pipeline::engine::CvrEngine` builds one coarse bank, one fine bank and
//!   one nuisance basis, then shares them read-only with the `lag` stage.

pub mod bank;
pub mod errors;
pub mod legendre;
pub mod series;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::bank::{LagGrid, LagRange, RegressorBank};
pub use self::errors::{RegressorError, RegressorResult};
pub use self::legendre::NuisanceBasis;
pub use self::series::{ResponseData, SampleTiming, TimeSeries};
