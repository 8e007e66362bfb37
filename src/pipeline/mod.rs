//! pipeline — configuration and orchestration of a CVR run.
//!
//! Purpose
//! -------
//! Tie the stages together behind one entry point: [`CvrEngine`] owns the
//! immutable banks and basis, [`CvrOptions`] carries the configuration, and
//! [`CvrError`] is the single run-level error.
//!
//! Key behaviors
//! -------------
//! - Structural failures (bad grid, range exhaustion, shape mismatch) abort
//!   with a [`CvrError`].
//! - Per-unit failures are isolated into unit statuses and summarized in
//!   [`RunReport`], so "all units processed, some invalid" is always
//!   distinguishable from "run aborted".
//!
//! Downstream usage
//! ----------------
//! - Rust callers usually `use cvr_lag::pipeline::prelude::*`.

pub mod engine;
pub mod errors;
pub mod options;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::engine::{CvrEngine, CvrOutput, RunReport};
pub use self::errors::{CvrError, CvrResult};
pub use self::options::{CvrOptions, Parallelism};

pub mod prelude {
    pub use super::{CvrEngine, CvrError, CvrOptions, CvrOutput, CvrResult, Parallelism, RunReport};
    pub use crate::lag::{BulkCriterion, BulkShift, BulkShiftOptions, TrialStructure};
    pub use crate::lag::{VoxelResult, VoxelStatus};
    pub use crate::maps::{CvrMaps, SpatialLayout};
    pub use crate::regressors::{LagRange, ResponseData, SampleTiming, TimeSeries};
}
