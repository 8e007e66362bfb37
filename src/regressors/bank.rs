//! regressors::bank — lag grids and banks of time-shifted regressors.
//!
//! Purpose
//! -------
//! Synthesize, once per run, every candidate regressor the lag search will
//! score: the physiological regressor shifted by each grid lag and
//! resampled (by linear interpolation) at the response sample times.
//!
//! Key behaviors
//! -------------
//! - [`LagRange`] holds the admissible lag interval `[min, max]` and derives
//!   bulk-centered sub-windows clipped to it.
//! - [`LagGrid`] enumerates lags as integer multiples of a step that evenly
//!   subdivides the response sample interval; the coarse grid uses one
//!   sample interval per candidate.
//! - [`RegressorBank::build`] evaluates the shifted regressor for every grid
//!   lag and fails with `LagRangeExhausted` instead of padding when the
//!   recording is too short for a requested shift.
//!
//! Invariants & assumptions
//! ------------------------
//! - Sign convention: a candidate with lag `L` holds `x_L(tᵢ) = r(tᵢ − L)`.
//!   A positive lag therefore means the response trails the physiological
//!   regressor by `L` seconds.
//! - Grid lag `k` equals `k · sample_interval / subdivisions`, computed from
//!   the integer index so lags never accumulate round-off.
//! - Every grid lag lies inside the originating [`LagRange`].
//!
//! Conventions
//! -----------
//! - Bank rows are candidates (ordered by increasing lag), columns are
//!   response time points.
//!
//! Testing notes
//! -------------
//! - Unit tests cover grid enumeration (inclusive limits, legacy upper-limit
//!   exclusion, divisibility checks), window restriction, exact shifting of
//!   a ramp, and range exhaustion.
use crate::regressors::{
    errors::{RegressorError, RegressorResult},
    series::{SampleTiming, TimeSeries},
};
use ndarray::{Array1, Array2, ArrayView1};
use std::ops::Range;
use tracing::debug;

/// Relative tolerance (in units of the grid step) when snapping range
/// limits onto the grid.
pub const GRID_TOL: f64 = 1e-9;

/// LagRange — admissible lags `[min, max]` in seconds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagRange {
    min: f64,
    max: f64,
}

impl LagRange {
    /// Construct a range with `min ≤ max`, both finite.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::InvalidLagRange` otherwise.
    pub fn new(min: f64, max: f64) -> RegressorResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(RegressorError::InvalidLagRange { min, max });
        }
        Ok(LagRange { min, max })
    }

    /// The symmetric range `[-maxlag, +maxlag]`.
    pub fn symmetric(maxlag: f64) -> RegressorResult<Self> {
        if !maxlag.is_finite() || maxlag < 0.0 {
            return Err(RegressorError::InvalidLagRange { min: -maxlag, max: maxlag });
        }
        LagRange::new(-maxlag, maxlag)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Largest distance of a limit from zero.
    pub fn max_abs(&self) -> f64 {
        self.min.abs().max(self.max.abs())
    }

    pub fn contains(&self, lag: f64) -> bool {
        lag >= self.min && lag <= self.max
    }

    /// `[center − half_width, center + half_width]` clipped to `self`.
    ///
    /// The result is never empty as long as `center` lies inside `self`.
    pub fn centered(&self, center: f64, half_width: f64) -> LagRange {
        let lo = (center - half_width).max(self.min);
        let hi = (center + half_width).min(self.max);
        if lo > hi {
            let c = center.clamp(self.min, self.max);
            return LagRange { min: c, max: c };
        }
        LagRange { min: lo, max: hi }
    }
}

impl Default for LagRange {
    fn default() -> Self {
        LagRange { min: -9.0, max: 9.0 }
    }
}

/// LagGrid — lags `k · step` for `k ∈ [k_min, k_max]`.
///
/// Fields
/// ------
/// - `sample_interval`: response sample interval in seconds.
/// - `subdivisions`: number of grid steps per sample interval (1 for the
///   coarse grid).
/// - `k_min`, `k_max`: inclusive integer limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagGrid {
    sample_interval: f64,
    subdivisions: usize,
    k_min: i64,
    k_max: i64,
}

impl LagGrid {
    /// One candidate per response sample interval over `range`.
    pub fn coarse(range: LagRange, sample_interval: f64) -> RegressorResult<Self> {
        LagGrid::over_range(range, sample_interval, 1, false)
    }

    /// Sub-sample grid with spacing `step` over `range`.
    ///
    /// Parameters
    /// ----------
    /// - `step`: must evenly subdivide `sample_interval`.
    /// - `exclude_upper_limit`: drop the candidate sitting exactly on
    ///   `range.max()` (legacy behavior).
    ///
    /// Errors
    /// ------
    /// - `RegressorError::InvalidStep` for a non-positive step.
    /// - `RegressorError::StepNotDivisor` when `sample_interval / step` is
    ///   not an integer.
    /// - `RegressorError::EmptyGrid` when no grid point fits.
    pub fn fine(
        range: LagRange, sample_interval: f64, step: f64, exclude_upper_limit: bool,
    ) -> RegressorResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(RegressorError::InvalidStep { step });
        }
        let ratio = sample_interval / step;
        let subdivisions = ratio.round();
        if subdivisions < 1.0 || (ratio - subdivisions).abs() > GRID_TOL * subdivisions {
            return Err(RegressorError::StepNotDivisor { step, sample_interval });
        }
        LagGrid::over_range(range, sample_interval, subdivisions as usize, exclude_upper_limit)
    }

    fn over_range(
        range: LagRange, sample_interval: f64, subdivisions: usize, exclude_upper_limit: bool,
    ) -> RegressorResult<Self> {
        if !sample_interval.is_finite() || sample_interval <= 0.0 {
            return Err(RegressorError::InvalidSampleInterval { value: sample_interval });
        }
        let step = sample_interval / subdivisions as f64;
        let k_min = (range.min() / step - GRID_TOL).ceil() as i64;
        let mut k_max = (range.max() / step + GRID_TOL).floor() as i64;
        if exclude_upper_limit && ((k_max as f64) * step - range.max()).abs() <= GRID_TOL * step {
            k_max -= 1;
        }
        if k_min > k_max {
            return Err(RegressorError::EmptyGrid { min: range.min(), max: range.max() });
        }
        Ok(LagGrid { sample_interval, subdivisions, k_min, k_max })
    }

    pub fn step(&self) -> f64 {
        self.sample_interval / self.subdivisions as f64
    }

    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    pub fn len(&self) -> usize {
        (self.k_max - self.k_min + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.k_max < self.k_min
    }

    /// Lag of the `i`-th candidate (0-based, increasing).
    #[inline]
    pub fn lag(&self, i: usize) -> f64 {
        let k = self.k_min + i as i64;
        k as f64 * self.sample_interval / self.subdivisions as f64
    }

    pub fn lags(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.lag(i)).collect()
    }

    /// Candidate indices whose lag lies inside `window`.
    ///
    /// Returns an empty range when the window misses the grid entirely.
    pub fn index_range(&self, window: &LagRange) -> Range<usize> {
        let step = self.step();
        let lo = ((window.min() / step - GRID_TOL).ceil() as i64).max(self.k_min);
        let hi = ((window.max() / step + GRID_TOL).floor() as i64).min(self.k_max);
        if lo > hi {
            return 0..0;
        }
        (lo - self.k_min) as usize..(hi - self.k_min + 1) as usize
    }

    /// Index of the grid point nearest to `lag`, if within tolerance.
    pub fn index_of(&self, lag: f64) -> Option<usize> {
        let k = (lag / self.step()).round();
        if (k * self.step() - lag).abs() > GRID_TOL * self.step().max(lag.abs()) {
            return None;
        }
        let k = k as i64;
        if k < self.k_min || k > self.k_max {
            return None;
        }
        Some((k - self.k_min) as usize)
    }
}

/// RegressorBank — shifted copies of the regressor at the response times.
///
/// Fields
/// ------
/// - `grid`: [`LagGrid`] indexing the candidates.
/// - `regressors`: `Array2<f64>` of shape `(grid.len(), timing.len)`.
/// - `timing`: response [`SampleTiming`] the candidates are evaluated on.
///
/// Notes
/// -----
/// - Immutable after construction and `Sync`, so it can be shared by every
///   worker of the voxel loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressorBank {
    grid: LagGrid,
    regressors: Array2<f64>,
    timing: SampleTiming,
}

impl RegressorBank {
    /// Evaluate `regressor` shifted by every lag of `grid` at `timing`.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::LagRangeExhausted` for the first (lag, instant)
    ///   pair that falls outside the recorded regressor span.
    pub fn build(
        regressor: &TimeSeries, timing: SampleTiming, grid: LagGrid,
    ) -> RegressorResult<Self> {
        let reg_timing = regressor.timing();
        let available = (reg_timing.start, reg_timing.end());
        let mut regressors = Array2::<f64>::zeros((grid.len(), timing.len));

        for (c, mut row) in regressors.rows_mut().into_iter().enumerate() {
            let lag = grid.lag(c);
            for (i, slot) in row.iter_mut().enumerate() {
                let needed = timing.time_at(i) - lag;
                *slot = regressor
                    .sample_at(needed)
                    .ok_or(RegressorError::LagRangeExhausted { lag, needed, available })?;
            }
        }

        debug!(
            candidates = grid.len(),
            step = grid.step(),
            first_lag = grid.lag(0),
            last_lag = grid.lag(grid.len() - 1),
            "regressor bank built"
        );
        Ok(RegressorBank { grid, regressors, timing })
    }

    pub fn grid(&self) -> &LagGrid {
        &self.grid
    }

    pub fn timing(&self) -> SampleTiming {
        self.timing
    }

    pub fn len(&self) -> usize {
        self.regressors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.regressors.nrows() == 0
    }

    pub fn lag(&self, i: usize) -> f64 {
        self.grid.lag(i)
    }

    /// Candidate regressor `i` evaluated at the response times.
    pub fn candidate(&self, i: usize) -> ArrayView1<'_, f64> {
        self.regressors.row(i)
    }

    /// Demeaned copy of the candidate at `lag`, if `lag` is on the grid.
    pub fn demeaned(&self, lag: f64) -> Option<Array1<f64>> {
        let i = self.grid.index_of(lag)?;
        let row = self.regressors.row(i);
        let mean = row.mean()?;
        Some(row.mapv(|v| v - mean))
    }
}
