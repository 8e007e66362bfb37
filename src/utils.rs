//! Python-boundary helpers: array extraction and option building.
//!
//! Everything here is compiled only with the `python-bindings` feature and
//! is called from the `#[pyfunction]`s in the crate root.
#[cfg(feature = "python-bindings")]
use ndarray::{Array2, ArrayD};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use crate::{
    lag::bulk::{BulkCriterion, BulkShiftOptions, TrialStructure},
    pipeline::options::{CvrOptions, Parallelism},
    regressors::bank::LagRange,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArray2,
    PyReadonlyArrayDyn,
};

/// Borrow a contiguous 1-D `float64` view of a numpy array, pandas Series,
/// or Python sequence, copying only when necessary.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Copy a 2-D `float64` array (numpy or pandas DataFrame) into an owned
/// `Array2`.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(raw_data: &Bound<'py, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }
    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(arr_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(arr_ro.as_array().to_owned());
        }
    }
    Err(PyTypeError::new_err("expected a 2-D numpy.ndarray or pandas.DataFrame of float64"))
}

/// Copy an N-D `float64` array into an owned `ArrayD`.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_volume<'py>(raw_data: &Bound<'py, PyAny>) -> PyResult<ArrayD<f64>> {
    let arr_ro = raw_data
        .extract::<PyReadonlyArrayDyn<f64>>()
        .map_err(|_| PyTypeError::new_err("expected a numpy.ndarray of float64"))?;
    Ok(arr_ro.as_array().to_owned())
}

/// Copy an optional N-D boolean mask.
#[cfg(feature = "python-bindings")]
pub fn extract_mask<'py>(raw_mask: Option<&Bound<'py, PyAny>>) -> PyResult<Option<ArrayD<bool>>> {
    raw_mask
        .map(|m| {
            m.extract::<PyReadonlyArrayDyn<bool>>()
                .map(|arr| arr.as_array().to_owned())
                .map_err(|_| PyTypeError::new_err("expected a boolean numpy.ndarray mask"))
        })
        .transpose()
}

/// Map a criterion name to [`BulkCriterion`].
///
/// Accepts `"signed"`, `"abs"`, and `"r2"` (case-insensitive).
#[cfg(feature = "python-bindings")]
pub fn parse_bulk_criterion(name: &str) -> PyResult<BulkCriterion> {
    match name.to_ascii_lowercase().as_str() {
        "signed" | "xcorr" => Ok(BulkCriterion::SignedCorrelation),
        "abs" | "abs_xcorr" => Ok(BulkCriterion::AbsCorrelation),
        "r2" | "rsquared" => Ok(BulkCriterion::RSquared),
        other => Err(PyValueError::new_err(format!(
            "unknown bulk criterion '{other}'; expected 'signed', 'abs', or 'r2'"
        ))),
    }
}

/// Assemble validated [`CvrOptions`] from the flat Python keyword set.
///
/// `lag_min = None` gives the symmetric range `[-lag_max, lag_max]`.
/// `trial_len` and `n_trials` must be given together; if only one is set,
/// a warning is logged and the bulk shift uses every trial.
#[cfg(feature = "python-bindings")]
#[allow(clippy::too_many_arguments)]
pub fn build_cvr_options(
    lag_max: f64, lag_min: Option<f64>, fine_step: f64, polynomial_order: usize,
    derivative: bool, bulk_criterion: &str, skip_bulk: bool, half_width: Option<f64>,
    trial_len: Option<f64>, n_trials: Option<usize>, legacy: bool, threads: Option<usize>,
) -> PyResult<CvrOptions> {
    let lag_range = match lag_min {
        Some(min) => LagRange::new(min, lag_max),
        None => LagRange::symmetric(lag_max),
    }
    .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let trials = TrialStructure::from_parts(trial_len, n_trials)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let bulk = BulkShiftOptions::new(
        parse_bulk_criterion(bulk_criterion)?,
        skip_bulk,
        half_width,
        trials,
    )
    .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let parallelism = match threads {
        Some(1) => Parallelism::Sequential,
        Some(n) => Parallelism::Rayon { threads: Some(n) },
        None => Parallelism::Rayon { threads: None },
    };
    Ok(CvrOptions::new(
        lag_range,
        fine_step,
        polynomial_order,
        derivative,
        bulk,
        legacy,
        parallelism,
        f64::NAN,
    )?)
}
