//! cvr_lag — lag-optimized cerebrovascular reactivity (CVR) mapping.
//!
//! Purpose
//! -------
//! Estimate, for every spatial unit of a functional recording, the
//! hemodynamic lag and the CVR amplitude that best explain its signal given
//! a physiological regressor (e.g. end-tidal CO₂). Serve as the crate root
//! for Rust callers and, with the `python-bindings` feature, as the PyO3
//! bridge exposing the `_cvr_lag` extension module.
//!
//! Key behaviors
//! -------------
//! - [`regressors`] builds the lagged regressor banks and the nuisance
//!   basis.
//! - [`regression`] provides the QR-based least-squares engine.
//! - [`lag`] runs the two-stage search (bulk shift, then per-unit
//!   refinement).
//! - [`maps`] gathers volumes into units and scatters results back into
//!   maps.
//! - [`pipeline`] ties the stages together in [`pipeline::CvrEngine`].
//!
//! Invariants & assumptions
//! ------------------------
//! - A candidate at lag `L` is `x_L(t) = r(t − L)`: positive lags mean the
//!   response trails the regressor.
//! - The engine never extrapolates the regressor; a lag range it cannot
//!   cover aborts the run.
//! - All inputs are fully materialized; the library performs no I/O and
//!   never installs a `tracing` subscriber.
//!
//! Conventions
//! -----------
//! - Times, lags and steps are in seconds.
//! - Errors are typed per subtree and unified in
//!   [`pipeline::CvrError`]; at the PyO3 boundary they become `ValueError`.
//!
//! Downstream usage
//! ----------------
//! - Rust: `use cvr_lag::pipeline::prelude::*;`, build a `CvrEngine`, call
//!   `run`.
//! - Python: `_cvr_lag.estimate_cvr(...)` returns a `CvrFit` with numpy
//!   maps.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; the full pipeline is exercised in
//!   `tests/integration_cvr_pipeline.rs`.

pub mod lag;
pub mod maps;
pub mod pipeline;
pub mod regression;
pub mod regressors;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1, PyArrayDyn};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    maps::layout::SpatialLayout,
    pipeline::{
        engine::{CvrEngine, CvrOutput},
        errors::CvrError,
    },
    regressors::series::{ResponseData, TimeSeries},
    utils::{
        build_cvr_options, extract_f64_array, extract_f64_matrix, extract_f64_volume,
        extract_mask,
    },
};

/// CvrFit — Python-facing result of [`estimate_cvr`].
///
/// Purpose
/// -------
/// Hold a completed [`CvrOutput`] plus the demeaned bulk-shifted regressor
/// and expose them as numpy arrays and Python scalars.
///
/// Fields
/// ------
/// - `inner`: [`CvrOutput`] of the run.
/// - `bulk_regressor`: demeaned regressor at the bulk lag, at the response
///   times.
///
/// Notes
/// -----
/// - Map getters copy into fresh numpy arrays on every access.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "cvr_lag")]
pub struct CvrFit {
    inner: CvrOutput,
    bulk_regressor: Vec<f64>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl CvrFit {
    #[getter]
    pub fn bulk_lag(&self) -> f64 {
        self.inner.bulk.lag
    }

    #[getter]
    pub fn bulk_score(&self) -> f64 {
        self.inner.bulk.score
    }

    /// `(lag, score)` pairs of the coarse bulk-shift scan.
    #[getter]
    pub fn bulk_profile(&self) -> Vec<(f64, f64)> {
        self.inner.bulk.profile.clone()
    }

    #[getter]
    pub fn window(&self) -> (f64, f64) {
        (self.inner.bulk.window.min(), self.inner.bulk.window.max())
    }

    #[getter]
    pub fn lag<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.inner.maps.lag.clone().into_pyarray(py)
    }

    #[getter]
    pub fn amplitude<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.inner.maps.amplitude.clone().into_pyarray(py)
    }

    #[getter]
    pub fn r_squared<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.inner.maps.r_squared.clone().into_pyarray(py)
    }

    #[getter]
    pub fn t_stat<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.inner.maps.t_stat.clone().into_pyarray(py)
    }

    #[getter]
    pub fn valid<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<bool>> {
        self.inner.maps.valid.clone().into_pyarray(py)
    }

    #[getter]
    pub fn bulk_regressor<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.bulk_regressor.clone().into_pyarray(py)
    }

    #[getter]
    pub fn n_valid(&self) -> usize {
        self.inner.report.n_valid
    }

    #[getter]
    pub fn n_invalid(&self) -> usize {
        self.inner.report.n_invalid()
    }

    /// Per-status counts of invalid units.
    #[getter]
    pub fn invalid_counts(&self) -> Vec<(String, usize)> {
        let r = &self.inner.report;
        vec![
            ("rank_deficient".to_string(), r.rank_deficient),
            ("numerical_fault".to_string(), r.numerical_fault),
            ("constant_response".to_string(), r.constant_response),
            ("non_finite_response".to_string(), r.non_finite_response),
        ]
    }

    #[getter]
    pub fn redundant_confounds(&self) -> Vec<usize> {
        self.inner.report.redundant_confounds.clone()
    }
}

/// Run the lag-optimized CVR pipeline on a functional volume.
///
/// Parameters
/// ----------
/// - `regressor`: 1-D physiological regressor sampled every
///   `regressor_interval` seconds from `regressor_start`.
/// - `responses`: float64 array `(spatial..., time)` sampled every `tr`
///   seconds from `start`; a 2-D array is `(units, time)`.
/// - `mask`: optional boolean array with the spatial shape.
/// - `confounds`: optional `(time, k)` nuisance regressors.
/// - `representative`: optional series for the bulk shift (default: mean of
///   finite units).
/// - Search options: `lag_max`, `lag_min`, `fine_step`,
///   `polynomial_order`, `derivative`, `bulk_criterion`
///   (`"signed"`/`"abs"`/`"r2"`), `skip_bulk`, `half_width`, `trial_len`,
///   `n_trials`, `legacy`, `threads`.
///
/// Returns
/// -------
/// `CvrFit`
///
/// Errors
/// ------
/// - `ValueError` for any aborted run (range exhaustion, shape mismatch,
///   invalid options); `TypeError` for unconvertible inputs.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (
    regressor, regressor_interval, responses, tr, /, start = 0.0, regressor_start = 0.0,
    mask = None, confounds = None, representative = None, lag_max = 9.0, lag_min = None,
    fine_step = 0.1, polynomial_order = 2, derivative = false, bulk_criterion = "signed",
    skip_bulk = false, half_width = None, trial_len = None, n_trials = None, legacy = false,
    threads = None
))]
#[allow(clippy::too_many_arguments)]
pub fn estimate_cvr<'py>(
    py: Python<'py>, regressor: &Bound<'py, PyAny>, regressor_interval: f64,
    responses: &Bound<'py, PyAny>, tr: f64, start: f64, regressor_start: f64,
    mask: Option<&Bound<'py, PyAny>>, confounds: Option<&Bound<'py, PyAny>>,
    representative: Option<&Bound<'py, PyAny>>, lag_max: f64, lag_min: Option<f64>,
    fine_step: f64, polynomial_order: usize, derivative: bool, bulk_criterion: &str,
    skip_bulk: bool, half_width: Option<f64>, trial_len: Option<f64>, n_trials: Option<usize>,
    legacy: bool, threads: Option<usize>,
) -> PyResult<CvrFit> {
    let opts = build_cvr_options(
        lag_max,
        lag_min,
        fine_step,
        polynomial_order,
        derivative,
        bulk_criterion,
        skip_bulk,
        half_width,
        trial_len,
        n_trials,
        legacy,
        threads,
    )?;

    let reg_values = extract_f64_array(py, regressor)?.as_array().to_owned();
    let regressor = TimeSeries::new(reg_values, regressor_interval, regressor_start)
        .map_err(CvrError::from)?;

    let volume = extract_f64_volume(responses)?;
    let ndim = volume.ndim();
    if ndim < 2 {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "responses must have at least one spatial axis and a time axis",
        ));
    }
    let layout = SpatialLayout::new(volume.shape()[..ndim - 1].to_vec(), extract_mask(mask)?)
        .map_err(CvrError::from)?;
    let units = layout.gather(volume.view()).map_err(CvrError::from)?;
    let data = ResponseData::new(units, tr, start).map_err(CvrError::from)?;

    let mut engine = CvrEngine::new(&regressor, data.timing(), opts)?;
    if let Some(raw) = confounds {
        engine = engine.with_confounds(extract_f64_matrix(raw)?.view())?;
    }
    let rep = representative
        .map(|raw| extract_f64_array(py, raw).map(|a| a.as_array().to_owned()))
        .transpose()?;

    let output = py.allow_threads(|| engine.run(&data, &layout, rep.as_ref().map(|r| r.view())))?;
    let bulk_regressor =
        engine.shifted_regressor(output.bulk.lag).map(|r| r.to_vec()).unwrap_or_default();
    Ok(CvrFit { inner: output, bulk_regressor })
}

/// _cvr_lag — PyO3 module initializer for the Python extension.
///
/// Registers [`estimate_cvr`] and the [`CvrFit`] class. Invoked by Python
/// when the compiled extension is imported.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _cvr_lag<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<CvrFit>()?;
    m.add_function(wrap_pyfunction!(estimate_cvr, m)?)?;
    Ok(())
}
