//! CVR engine — orchestration of the lag-optimized CVR run.
//!
//! Purpose
//! -------
//! Own the immutable run state (nuisance basis, coarse and fine regressor
//! banks, options) and drive the stages: bulk shift on a representative
//! series, per-unit lag optimization inside the bulk window, and map
//! assembly.
//!
//! Key behaviors
//! -------------
//! - [`CvrEngine::new`] builds the nuisance basis and both banks once.
//!   Range exhaustion and grid errors surface here, before any unit is
//!   touched.
//! - [`CvrEngine::fit_units`] runs [`optimize_voxel`] for every unit, either
//!   sequentially or with rayon over disjoint chunks of a preallocated
//!   result vector. Each chunk owns its [`DesignMatrix`] scratch; the banks
//!   and basis are only read.
//! - [`CvrEngine::run`] chains the stages and returns a [`CvrOutput`]
//!   holding the bulk shift, the maps, the raw unit results, and a
//!   [`RunReport`] with per-status counts.
//!
//! Invariants & assumptions
//! ------------------------
//! - Results depend only on each unit's own series and the shared,
//!   immutable state: chunking and thread count never change the output.
//! - Unit results are stored in unit order regardless of scheduling.
//! - An `Err` always means the run was aborted; a returned [`CvrOutput`]
//!   covers every unit (invalid ones included, see [`RunReport`]).
//!
//! Downstream usage
//! ----------------
//! - Build the engine with the response timing, optionally append confounds
//!   via [`CvrEngine::with_confounds`], then call [`CvrEngine::run`].
//! - [`CvrEngine::shifted_regressor`] returns the demeaned regressor at any
//!   grid lag, e.g. the bulk lag, for export.
//!
//! Testing notes
//! -------------
//! - Unit tests here cover window handling, timing checks, and
//!   sequential/parallel equality. End-to-end recovery is covered in
//!   `tests/integration_cvr_pipeline.rs`.
use crate::{
    lag::{
        bulk::{BulkShift, estimate_bulk_shift},
        voxel::{VoxelResult, VoxelStatus, optimize_voxel},
    },
    maps::{
        assemble::{CvrMaps, assemble_maps},
        layout::SpatialLayout,
    },
    pipeline::{
        errors::{CvrError, CvrResult},
        options::{CvrOptions, Parallelism},
    },
    regression::design::DesignMatrix,
    regressors::{
        bank::{LagGrid, LagRange, RegressorBank},
        legendre::NuisanceBasis,
        series::{POSITION_TOL, ResponseData, SampleTiming, TimeSeries},
    },
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::ops::Range;
use tracing::{info, warn};

/// Units handed to one rayon task.
const UNIT_CHUNK: usize = 64;

/// RunReport — per-status unit counts for one run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub n_units: usize,
    pub n_valid: usize,
    pub rank_deficient: usize,
    pub numerical_fault: usize,
    pub constant_response: usize,
    pub non_finite_response: usize,
    /// Indices of user confound columns pruned as redundant.
    pub redundant_confounds: Vec<usize>,
}

impl RunReport {
    pub fn tally(results: &[VoxelResult]) -> Self {
        let mut report = RunReport { n_units: results.len(), ..Default::default() };
        for r in results {
            match r.status {
                VoxelStatus::Valid => report.n_valid += 1,
                VoxelStatus::RankDeficient => report.rank_deficient += 1,
                VoxelStatus::NumericalFault => report.numerical_fault += 1,
                VoxelStatus::ConstantResponse => report.constant_response += 1,
                VoxelStatus::NonFiniteResponse => report.non_finite_response += 1,
            }
        }
        report
    }

    pub fn n_invalid(&self) -> usize {
        self.n_units - self.n_valid
    }
}

/// CvrOutput — everything produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct CvrOutput {
    pub bulk: BulkShift,
    pub maps: CvrMaps,
    pub report: RunReport,
    /// Unit results in unit order.
    pub voxels: Vec<VoxelResult>,
}

/// CvrEngine — immutable run state shared by every unit fit.
///
/// Fields
/// ------
/// - `opts`: validated [`CvrOptions`].
/// - `timing`: response [`SampleTiming`] the banks are evaluated on.
/// - `nuisance`: [`NuisanceBasis`] (Legendre plus optional confounds).
/// - `coarse`, `fine`: [`RegressorBank`]s on the coarse and fine grids.
#[derive(Debug, Clone)]
pub struct CvrEngine {
    opts: CvrOptions,
    timing: SampleTiming,
    nuisance: NuisanceBasis,
    coarse: RegressorBank,
    fine: RegressorBank,
}

impl CvrEngine {
    /// Build the nuisance basis and both regressor banks.
    ///
    /// Parameters
    /// ----------
    /// - `regressor`: physiological regressor with its own timing.
    /// - `timing`: sampling grid of the responses.
    /// - `opts`: [`CvrOptions`].
    ///
    /// Errors
    /// ------
    /// - `CvrError::Regressor` for invalid grids (`InvalidStep`,
    ///   `StepNotDivisor`, `EmptyGrid`), an oversized polynomial order, or
    ///   `LagRangeExhausted` when the regressor does not cover
    ///   `[t − max, t − min]` for every response time `t`.
    /// - `CvrError::DesignTooWide` when the nuisance, regressor and
    ///   derivative columns leave no residual degree of freedom.
    /// - `CvrError::InvalidThreadCount` for `Rayon { threads: Some(0) }`.
    pub fn new(regressor: &TimeSeries, timing: SampleTiming, opts: CvrOptions) -> CvrResult<Self> {
        if opts.parallelism == (Parallelism::Rayon { threads: Some(0) }) {
            return Err(CvrError::InvalidThreadCount);
        }
        let nuisance = NuisanceBasis::legendre(opts.polynomial_order, timing.len)?;
        let coarse_grid = LagGrid::coarse(opts.lag_range, timing.sample_interval)?;
        let fine_grid = LagGrid::fine(
            opts.lag_range,
            timing.sample_interval,
            opts.fine_step,
            opts.exclude_upper_limit,
        )?;
        check_design_width(nuisance.ncols(), opts.derivative, timing.len)?;
        let coarse = RegressorBank::build(regressor, timing, coarse_grid)?;
        let fine = RegressorBank::build(regressor, timing, fine_grid)?;

        info!(
            lag_min = opts.lag_range.min(),
            lag_max = opts.lag_range.max(),
            coarse_candidates = coarse.len(),
            fine_candidates = fine.len(),
            nuisance_columns = nuisance.ncols(),
            derivative = opts.derivative,
            "CVR engine ready"
        );
        Ok(CvrEngine { opts, timing, nuisance, coarse, fine })
    }

    /// Append user confound columns (`n_time × k`) to the nuisance basis.
    ///
    /// Redundant columns are pruned and listed in
    /// [`RunReport::redundant_confounds`]. Fails with
    /// `CvrError::DesignTooWide` if the kept columns leave too few samples.
    pub fn with_confounds(mut self, confounds: ArrayView2<'_, f64>) -> CvrResult<Self> {
        let nuisance = self.nuisance.with_confounds(confounds)?;
        check_design_width(nuisance.ncols(), self.opts.derivative, self.timing.len)?;
        self.nuisance = nuisance;
        Ok(self)
    }

    pub fn options(&self) -> &CvrOptions {
        &self.opts
    }

    pub fn timing(&self) -> SampleTiming {
        self.timing
    }

    pub fn nuisance(&self) -> &NuisanceBasis {
        &self.nuisance
    }

    pub fn coarse_bank(&self) -> &RegressorBank {
        &self.coarse
    }

    pub fn fine_bank(&self) -> &RegressorBank {
        &self.fine
    }

    /// Estimate the bulk shift of `representative` on the coarse bank.
    pub fn bulk_shift(&self, representative: ArrayView1<'_, f64>) -> CvrResult<BulkShift> {
        Ok(estimate_bulk_shift(
            representative,
            &self.coarse,
            &self.nuisance,
            &self.opts.lag_range,
            &self.opts.bulk,
        )?)
    }

    /// Optimize every row of `responses` (`n_units × n_time`) over the fine
    /// candidates inside `window`.
    ///
    /// Errors
    /// ------
    /// - `CvrError::ShapeMismatch` if the time axis differs from the engine
    ///   timing.
    /// - `CvrError::EmptyWindow` if no fine candidate lies in `window`.
    /// - `CvrError::ThreadPool` if a dedicated pool cannot be built.
    pub fn fit_units(
        &self, responses: ArrayView2<'_, f64>, window: &LagRange,
    ) -> CvrResult<Vec<VoxelResult>> {
        if responses.ncols() != self.timing.len {
            return Err(CvrError::ShapeMismatch {
                what: "response time axis",
                expected: self.timing.len,
                actual: responses.ncols(),
            });
        }
        let candidates = self.fine.grid().index_range(window);
        if candidates.is_empty() {
            return Err(CvrError::EmptyWindow { min: window.min(), max: window.max() });
        }

        let mut results = vec![VoxelResult::default(); responses.nrows()];
        match self.opts.parallelism {
            Parallelism::Sequential => {
                self.fit_chunk(responses, 0, &mut results, &candidates);
            }
            Parallelism::Rayon { threads } => {
                let run = |out: &mut [VoxelResult]| {
                    out.par_chunks_mut(UNIT_CHUNK).enumerate().for_each(|(c, chunk)| {
                        self.fit_chunk(responses, c * UNIT_CHUNK, chunk, &candidates);
                    });
                };
                match threads {
                    None => run(&mut results),
                    Some(n) => {
                        let pool = rayon::ThreadPoolBuilder::new()
                            .num_threads(n)
                            .build()
                            .map_err(|e| CvrError::ThreadPool { reason: e.to_string() })?;
                        pool.install(|| run(&mut results));
                    }
                }
            }
        }
        Ok(results)
    }

    fn fit_chunk(
        &self, responses: ArrayView2<'_, f64>, offset: usize, out: &mut [VoxelResult],
        candidates: &Range<usize>,
    ) {
        let mut design = DesignMatrix::new(
            self.nuisance.columns(),
            self.opts.derivative,
            self.timing.sample_interval,
        );
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = optimize_voxel(
                responses.row(offset + k),
                &self.fine,
                candidates.clone(),
                &mut design,
            );
        }
    }

    /// Run bulk shift, per-unit optimization, and map assembly.
    ///
    /// Parameters
    /// ----------
    /// - `responses`: [`ResponseData`] with one row per in-mask unit of
    ///   `layout`, sampled on the engine timing.
    /// - `layout`: [`SpatialLayout`] used to assemble the maps.
    /// - `representative`: series for the bulk shift; `None` uses the mean
    ///   of all finite units. Ignored when the bulk shift is skipped.
    ///
    /// Errors
    /// ------
    /// - `CvrError::TimingMismatch`, `CvrError::ShapeMismatch` for
    ///   inconsistent inputs.
    /// - `CvrError::NoFiniteUnits` when the bulk shift needs a mean
    ///   representative and no unit is all-finite.
    /// - Any bulk-shift (`CvrError::Lag`) or assembly (`CvrError::Map`)
    ///   error.
    pub fn run(
        &self, responses: &ResponseData, layout: &SpatialLayout,
        representative: Option<ArrayView1<'_, f64>>,
    ) -> CvrResult<CvrOutput> {
        let actual = responses.timing();
        let tol = POSITION_TOL * self.timing.sample_interval;
        if actual.len != self.timing.len
            || (actual.start - self.timing.start).abs() > tol
            || (actual.sample_interval - self.timing.sample_interval).abs() > tol
        {
            return Err(CvrError::TimingMismatch { expected: self.timing, actual });
        }
        if responses.n_units() != layout.n_units() {
            return Err(CvrError::ShapeMismatch {
                what: "unit count",
                expected: layout.n_units(),
                actual: responses.n_units(),
            });
        }

        let bulk = match representative {
            Some(r) => self.bulk_shift(r)?,
            None if self.opts.bulk.skip => {
                let unused: [f64; 0] = [];
                self.bulk_shift(ArrayView1::from(&unused))?
            }
            None => {
                let mean = responses.mean_series().ok_or(CvrError::NoFiniteUnits)?;
                self.bulk_shift(mean.view())?
            }
        };
        let voxels = self.fit_units(responses.series(), &bulk.window)?;
        let maps = assemble_maps(&voxels, layout, self.opts.missing_value)?;

        let mut report = RunReport::tally(&voxels);
        report.redundant_confounds = self.nuisance.redundant_confounds().to_vec();
        info!(
            bulk_lag = bulk.lag,
            units = report.n_units,
            valid = report.n_valid,
            "CVR run complete"
        );
        if report.n_invalid() > 0 {
            warn!(
                invalid = report.n_invalid(),
                rank_deficient = report.rank_deficient,
                numerical_fault = report.numerical_fault,
                constant_response = report.constant_response,
                non_finite_response = report.non_finite_response,
                "some units produced no valid fit"
            );
        }
        Ok(CvrOutput { bulk, maps, report, voxels })
    }

    /// Demeaned regressor shifted by `lag`, if `lag` is a grid lag.
    pub fn shifted_regressor(&self, lag: f64) -> Option<Array1<f64>> {
        self.fine.demeaned(lag).or_else(|| self.coarse.demeaned(lag))
    }
}

/// Reject designs with `nuisance + 1 (+ 1 derivative) >= len` columns.
fn check_design_width(nuisance_cols: usize, derivative: bool, len: usize) -> CvrResult<()> {
    let columns = nuisance_cols + 1 + usize::from(derivative);
    if columns >= len {
        return Err(CvrError::DesignTooWide { columns, len });
    }
    Ok(())
}
