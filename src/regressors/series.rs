//! regressors::series — validated time-series containers and sample timing.
//!
//! Purpose
//! -------
//! Represent the two kinds of series consumed by the engine: the
//! physiological regressor (one 1-D trace with its own sample interval and
//! start offset) and the response data (many equal-length series sharing one
//! sample interval). Centralizes the interpolation used to evaluate the
//! regressor at arbitrary, possibly sub-sample, instants.
//!
//! Key behaviors
//! -------------
//! - [`TimeSeries`] enforces at least two finite samples, a finite, strictly
//!   positive sample interval, and a finite start offset.
//! - [`TimeSeries::sample_at`] evaluates the series by linear interpolation
//!   and refuses to extrapolate outside the recorded span.
//! - [`SampleTiming`] describes the response sampling grid (`start`,
//!   `sample_interval`, `len`) independently of any data.
//! - [`ResponseData`] stores a `units × time` matrix. Non-finite entries are
//!   accepted here and handled per unit by the optimizer.
//!
//! Invariants & assumptions
//! ------------------------
//! - Sample `i` of a series lives at `start + i · sample_interval`.
//! - Interpolation is only defined on `[start, end]`; an instant that lies a
//!   hair outside because of floating-point round-off (relative to the
//!   sample interval, see [`POSITION_TOL`]) is snapped back to the edge.
//!
//! Conventions
//! -----------
//! - Times are in seconds. Rows of [`ResponseData::series`] are spatial
//!   units in the order fixed by the spatial layout; columns are time.
//!
//! Testing notes
//! -------------
//! - Unit tests cover constructor validation, exact interpolation at nodes
//!   and midpoints, refusal to extrapolate, and the finite-unit mean.
use crate::regressors::errors::{RegressorError, RegressorResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Tolerance on fractional sample positions when snapping to the edges of a
/// recording, expressed in units of the sample interval.
pub const POSITION_TOL: f64 = 1e-9;

/// SampleTiming — the sampling grid of a series, without its values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTiming {
    /// Time of the first sample, in seconds.
    pub start: f64,
    /// Time between consecutive samples, in seconds.
    pub sample_interval: f64,
    /// Number of samples.
    pub len: usize,
}

impl SampleTiming {
    /// Construct a validated timing description.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::EmptySeries` if `len < 2`.
    /// - `RegressorError::InvalidSampleInterval` if `sample_interval` is not
    ///   finite and strictly positive.
    /// - `RegressorError::InvalidStart` if `start` is not finite.
    pub fn new(start: f64, sample_interval: f64, len: usize) -> RegressorResult<Self> {
        if len < 2 {
            return Err(RegressorError::EmptySeries);
        }
        if !sample_interval.is_finite() || sample_interval <= 0.0 {
            return Err(RegressorError::InvalidSampleInterval { value: sample_interval });
        }
        if !start.is_finite() {
            return Err(RegressorError::InvalidStart { value: start });
        }
        Ok(SampleTiming { start, sample_interval, len })
    }

    /// Time of sample `i`.
    #[inline]
    pub fn time_at(&self, i: usize) -> f64 {
        self.start + i as f64 * self.sample_interval
    }

    /// Time of the last sample.
    #[inline]
    pub fn end(&self) -> f64 {
        self.time_at(self.len - 1)
    }

    /// All sample times as a vector.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_iter((0..self.len).map(|i| self.time_at(i)))
    }
}

/// TimeSeries — a validated 1-D series with its sampling grid.
///
/// Purpose
/// -------
/// Hold the physiological regressor (e.g. an end-tidal CO2 trace already
/// convolved with a response function) and evaluate it at arbitrary
/// instants.
///
/// Fields
/// ------
/// - `values`: `Array1<f64>`
///   Samples; all finite, at least two.
/// - `timing`: [`SampleTiming`]
///   Start offset and sample interval of `values`.
///
/// Invariants
/// ----------
/// - `values.len() == timing.len ≥ 2` and every value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    values: Array1<f64>,
    timing: SampleTiming,
}

impl TimeSeries {
    /// Construct a validated [`TimeSeries`].
    ///
    /// Parameters
    /// ----------
    /// - `values`: `Array1<f64>`
    ///   Samples; must contain at least two finite values.
    /// - `sample_interval`: `f64`
    ///   Time between samples in seconds; finite and `> 0`.
    /// - `start`: `f64`
    ///   Time of the first sample in seconds; finite.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::EmptySeries`, `InvalidSampleInterval`,
    ///   `InvalidStart` as for [`SampleTiming::new`].
    /// - `RegressorError::NonFiniteValue { index, value }` for the first
    ///   NaN/±∞ sample.
    pub fn new(values: Array1<f64>, sample_interval: f64, start: f64) -> RegressorResult<Self> {
        let timing = SampleTiming::new(start, sample_interval, values.len())?;
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(RegressorError::NonFiniteValue { index, value });
        }
        Ok(TimeSeries { values, timing })
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn timing(&self) -> SampleTiming {
        self.timing
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Evaluate the series at time `t` by linear interpolation.
    ///
    /// Returns `None` when `t` lies outside `[start, end]` by more than
    /// [`POSITION_TOL`] sample intervals.
    pub fn sample_at(&self, t: f64) -> Option<f64> {
        let last = (self.values.len() - 1) as f64;
        let pos = (t - self.timing.start) / self.timing.sample_interval;
        if !pos.is_finite() || pos < -POSITION_TOL || pos > last + POSITION_TOL {
            return None;
        }
        let pos = pos.clamp(0.0, last);
        let j = pos.floor() as usize;
        if j + 1 >= self.values.len() {
            return Some(self.values[self.values.len() - 1]);
        }
        let frac = pos - j as f64;
        Some(self.values[j] + frac * (self.values[j + 1] - self.values[j]))
    }
}

/// ResponseData — equal-length response series for every spatial unit.
///
/// Fields
/// ------
/// - `series`: `Array2<f64>` with shape `(n_units, n_time)`.
/// - `timing`: [`SampleTiming`] shared by every row.
///
/// Notes
/// -----
/// - Rows may contain non-finite values; such units are reported as invalid
///   by the optimizer instead of aborting the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    series: Array2<f64>,
    timing: SampleTiming,
}

impl ResponseData {
    /// Construct response data from a `units × time` matrix.
    ///
    /// Errors
    /// ------
    /// - `RegressorError::EmptySeries` if there are fewer than two time
    ///   points.
    /// - `RegressorError::InvalidSampleInterval` / `InvalidStart` for a bad
    ///   sampling grid.
    pub fn new(series: Array2<f64>, sample_interval: f64, start: f64) -> RegressorResult<Self> {
        let timing = SampleTiming::new(start, sample_interval, series.ncols())?;
        Ok(ResponseData { series, timing })
    }

    pub fn series(&self) -> ArrayView2<'_, f64> {
        self.series.view()
    }

    pub fn unit(&self, i: usize) -> ArrayView1<'_, f64> {
        self.series.row(i)
    }

    pub fn timing(&self) -> SampleTiming {
        self.timing
    }

    pub fn n_units(&self) -> usize {
        self.series.nrows()
    }

    pub fn n_time(&self) -> usize {
        self.series.ncols()
    }

    /// Spatial mean of every unit whose samples are all finite.
    ///
    /// Returns `None` when no unit qualifies.
    pub fn mean_series(&self) -> Option<Array1<f64>> {
        let mut acc = Array1::<f64>::zeros(self.n_time());
        let mut count = 0usize;
        for row in self.series.axis_iter(Axis(0)) {
            if row.iter().all(|v| v.is_finite()) {
                acc += &row;
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        acc /= count as f64;
        Some(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Constructor validation for `TimeSeries` and `SampleTiming`.
    // - Linear interpolation at nodes, midpoints, and the recording edges.
    // - `ResponseData::mean_series` skipping non-finite units.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure that `TimeSeries::new` rejects short series, bad intervals,
    // and non-finite samples with the matching error variant.
    //
    // Given
    // -----
    // - A single-sample series, a zero interval, and a NaN sample.
    //
    // Expect
    // ------
    // - `EmptySeries`, `InvalidSampleInterval`, `NonFiniteValue { index: 1 }`.
    fn time_series_new_rejects_invalid_inputs() {
        // Arrange / Act
        let short = TimeSeries::new(array![1.0], 1.0, 0.0);
        let zero_dt = TimeSeries::new(array![1.0, 2.0], 0.0, 0.0);
        let nan = TimeSeries::new(array![1.0, f64::NAN, 3.0], 1.0, 0.0);

        // Assert
        assert_eq!(short, Err(RegressorError::EmptySeries));
        assert_eq!(zero_dt, Err(RegressorError::InvalidSampleInterval { value: 0.0 }));
        match nan {
            Err(RegressorError::NonFiniteValue { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected NonFiniteValue, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify interpolation at nodes and between nodes with a start offset.
    //
    // Given
    // -----
    // - values = [0, 2, 4, 10], dt = 0.5, start = 10.
    //
    // Expect
    // ------
    // - sample_at(10.5) = 2, sample_at(10.25) = 1, sample_at(11.25) = 7,
    //   sample_at(11.5) = 10 (last node).
    fn sample_at_interpolates_linearly_between_nodes() {
        // Arrange
        let ts = TimeSeries::new(array![0.0, 2.0, 4.0, 10.0], 0.5, 10.0).unwrap();

        // Act / Assert
        assert_relative_eq!(ts.sample_at(10.5).unwrap(), 2.0);
        assert_relative_eq!(ts.sample_at(10.25).unwrap(), 1.0);
        assert_relative_eq!(ts.sample_at(11.25).unwrap(), 7.0);
        assert_relative_eq!(ts.sample_at(11.5).unwrap(), 10.0);
    }

    #[test]
    // Purpose
    // -------
    // Ensure that `sample_at` never extrapolates outside the recording.
    //
    // Given
    // -----
    // - values on [0, 3] s.
    //
    // Expect
    // ------
    // - `None` for t = -0.1 and t = 3.1; `Some` for t = 3 + 1e-12.
    fn sample_at_refuses_to_extrapolate() {
        // Arrange
        let ts = TimeSeries::new(array![1.0, 2.0, 3.0, 4.0], 1.0, 0.0).unwrap();

        // Act / Assert
        assert!(ts.sample_at(-0.1).is_none());
        assert!(ts.sample_at(3.1).is_none());
        assert_relative_eq!(ts.sample_at(3.0 + 1e-12).unwrap(), 4.0);
    }

    #[test]
    // Purpose
    // -------
    // Verify that the representative mean ignores units with NaNs.
    //
    // Given
    // -----
    // - Three units, the second containing a NaN.
    //
    // Expect
    // ------
    // - Mean of the first and third rows only.
    fn mean_series_skips_non_finite_units() {
        // Arrange
        let data = ResponseData::new(
            array![[1.0, 2.0, 3.0], [f64::NAN, 0.0, 0.0], [3.0, 4.0, 5.0]],
            2.0,
            0.0,
        )
        .unwrap();

        // Act
        let mean = data.mean_series().unwrap();

        // Assert
        assert_eq!(mean, array![2.0, 3.0, 4.0]);
    }
}
