//! lag — two-stage lag search (bulk shift, then per-unit refinement).
//!
//! Purpose
//! -------
//! Turn a [`RegressorBank`](crate::regressors::RegressorBank) into lag
//! estimates: a single global lag from a representative series, then a
//! refined lag per unit restricted to a window around it.
//!
//! Key behaviors
//! -------------
//! - [`estimate_bulk_shift`] scores coarse candidates on the representative
//!   series and returns the bulk lag, its score profile and the fine-search
//!   window.
//! - [`optimize_voxel`] fits the full model at each fine candidate inside
//!   the window and keeps the best R².
//! - Both stages share the tie-break in [`select`]: higher score wins,
//!   near-ties go to the smaller |lag|, then the more negative lag.
//!
//! Conventions
//! -----------
//! - Bulk-stage failures are [`LagError`]s and abort the run; per-unit
//!   failures are encoded in [`VoxelStatus`].

pub mod bulk;
pub mod errors;
pub mod select;
pub mod voxel;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::bulk::{
    BulkCriterion, BulkShift, BulkShiftOptions, TrialStructure, estimate_bulk_shift,
};
pub use self::errors::{LagError, LagResult};
pub use self::select::{BestCandidate, SCORE_TIE_TOL};
pub use self::voxel::{VoxelResult, VoxelStatus, optimize_voxel};
