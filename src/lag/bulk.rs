//! lag::bulk — global (bulk) lag estimated on a representative series.
//!
//! Purpose
//! -------
//! Find the single lag at which the coarse regressor bank best matches the
//! representative series (typically the whole-brain mean), and derive the
//! narrower window the per-voxel search is restricted to.
//!
//! Key behaviors
//! -------------
//! - Scores every coarse candidate with the configured [`BulkCriterion`]:
//!   signed Pearson correlation (default), absolute correlation, or the R²
//!   of the full nuisance + regressor model.
//! - Records the whole `(lag, score)` profile for diagnostics.
//! - With a [`TrialStructure`], the first trial is excluded from matching
//!   when there are more than three trials, and the last one too when there
//!   are more than four.
//! - `skip = true` fixes the bulk lag at zero (clamped into the range).
//!
//! Invariants & assumptions
//! ------------------------
//! - The returned lag lies in the configured lag range and on the coarse
//!   grid (except when skipped).
//! - The returned window is `[lag − h, lag + h]` clipped to the lag range,
//!   so it is never empty.
//! - Ties follow [`crate::lag::select`].
use crate::{
    lag::{
        errors::{LagError, LagResult},
        select::BestCandidate,
    },
    regression::{design::DesignMatrix, errors::RegressionError},
    regressors::{
        bank::{LagRange, RegressorBank},
        legendre::NuisanceBasis,
    },
};
use ndarray::{ArrayView1, s};
use tracing::{info, warn};

/// Minimum number of samples left for matching after trial exclusion.
pub const MIN_BULK_SAMPLES: usize = 3;

/// Score used to rank coarse candidates.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkCriterion {
    /// Pearson correlation; anti-correlated candidates score low.
    #[default]
    SignedCorrelation,
    /// |Pearson correlation|.
    AbsCorrelation,
    /// R² of `[nuisance | candidate]` against the representative series.
    RSquared,
}

/// TrialStructure — repeated-stimulus layout of the recording.
///
/// Fields
/// ------
/// - `trial_len`: duration of one trial in seconds.
/// - `n_trials`: number of trials in the recording.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialStructure {
    pub trial_len: f64,
    pub n_trials: usize,
}

impl TrialStructure {
    /// Errors
    /// ------
    /// - `LagError::InvalidTrialStructure` for a non-positive or non-finite
    ///   trial length, or zero trials.
    pub fn new(trial_len: f64, n_trials: usize) -> LagResult<Self> {
        if !trial_len.is_finite() || trial_len <= 0.0 || n_trials == 0 {
            return Err(LagError::InvalidTrialStructure { trial_len, n_trials });
        }
        Ok(TrialStructure { trial_len, n_trials })
    }

    /// Build from optional parts as supplied by a caller's keywords.
    ///
    /// Both parts give `Some(TrialStructure)`, neither gives `None`. If only
    /// one is set, a warning is logged and `None` is returned, so matching
    /// uses every trial.
    ///
    /// Errors
    /// ------
    /// - `LagError::InvalidTrialStructure` as for [`TrialStructure::new`].
    pub fn from_parts(trial_len: Option<f64>, n_trials: Option<usize>) -> LagResult<Option<Self>> {
        match (trial_len, n_trials) {
            (Some(len), Some(n)) => TrialStructure::new(len, n).map(Some),
            (None, None) => Ok(None),
            (len, n) => {
                warn!(
                    trial_len = ?len,
                    n_trials = ?n,
                    "trial length and trial count must be given together; using all trials"
                );
                Ok(None)
            }
        }
    }

    /// Half-open sample window `[start, end)` used for matching.
    pub fn sample_window(&self, len: usize, sample_interval: f64) -> (usize, usize) {
        let per_trial = (self.trial_len / sample_interval + 1e-9).floor() as usize;
        let start = if self.n_trials > 3 { per_trial.min(len) } else { 0 };
        let end = if self.n_trials > 4 { len.saturating_sub(per_trial) } else { len };
        (start, end.max(start))
    }
}

/// BulkShiftOptions — configuration of the bulk-shift stage.
///
/// Fields
/// ------
/// - `criterion`: candidate score, see [`BulkCriterion`].
/// - `skip`: fix the bulk lag at 0 instead of estimating it.
/// - `half_width`: fine-window half-width in seconds; `None` uses the
///   largest absolute lag of the range (the window then covers the range).
/// - `trials`: optional [`TrialStructure`] for edge-trial exclusion.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BulkShiftOptions {
    pub criterion: BulkCriterion,
    pub skip: bool,
    pub half_width: Option<f64>,
    pub trials: Option<TrialStructure>,
}

impl BulkShiftOptions {
    /// Errors
    /// ------
    /// - `LagError::InvalidHalfWidth` when `half_width` is negative or
    ///   non-finite.
    pub fn new(
        criterion: BulkCriterion, skip: bool, half_width: Option<f64>,
        trials: Option<TrialStructure>,
    ) -> LagResult<Self> {
        if let Some(h) = half_width {
            if !h.is_finite() || h < 0.0 {
                return Err(LagError::InvalidHalfWidth { value: h });
            }
        }
        Ok(BulkShiftOptions { criterion, skip, half_width, trials })
    }
}

/// BulkShift — outcome of the bulk-shift stage.
///
/// Fields
/// ------
/// - `lag`: global lag in seconds.
/// - `score`: criterion value at `lag` (NaN when skipped).
/// - `profile`: `(lag, score)` for every coarse candidate, NaN where a
///   candidate could not be scored. Empty when skipped.
/// - `window`: lag window for the per-voxel search.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BulkShift {
    pub lag: f64,
    pub score: f64,
    pub profile: Vec<(f64, f64)>,
    pub window: LagRange,
}

/// Estimate the bulk lag of `representative` over the coarse bank.
///
/// Parameters
/// ----------
/// - `representative`: response-timed series, one value per response
///   sample; not read when `opts.skip` is set.
/// - `coarse`: [`RegressorBank`] on the coarse grid.
/// - `nuisance`: [`NuisanceBasis`] used by the `RSquared` criterion.
/// - `range`: configured lag range (clips the window).
/// - `opts`: [`BulkShiftOptions`].
///
/// Errors
/// ------
/// - `LengthMismatch`, `NonFiniteRepresentative` for unusable input.
/// - `TooFewSamples` when trial exclusion leaves fewer than
///   [`MIN_BULK_SAMPLES`].
/// - `Regression(ConstantResponse)` when the matched segment is constant.
/// - `NoValidCandidate` when every candidate score is non-finite.
pub fn estimate_bulk_shift(
    representative: ArrayView1<'_, f64>, coarse: &RegressorBank, nuisance: &NuisanceBasis,
    range: &LagRange, opts: &BulkShiftOptions,
) -> LagResult<BulkShift> {
    let half_width = opts.half_width.unwrap_or_else(|| range.max_abs());

    if opts.skip {
        let lag = 0.0_f64.clamp(range.min(), range.max());
        let window = range.centered(lag, half_width);
        info!(lag, window_min = window.min(), window_max = window.max(), "bulk shift skipped");
        return Ok(BulkShift { lag, score: f64::NAN, profile: Vec::new(), window });
    }

    let timing = coarse.timing();
    if representative.len() != timing.len {
        return Err(LagError::LengthMismatch { expected: timing.len, actual: representative.len() });
    }
    if nuisance.len() != timing.len {
        return Err(LagError::LengthMismatch { expected: timing.len, actual: nuisance.len() });
    }
    if let Some((index, &value)) = representative.iter().enumerate().find(|(_, v)| !v.is_finite())
    {
        return Err(LagError::NonFiniteRepresentative { index, value });
    }

    let (start, end) = match &opts.trials {
        Some(trials) => trials.sample_window(timing.len, timing.sample_interval),
        None => (0, timing.len),
    };
    if end - start < MIN_BULK_SAMPLES {
        return Err(LagError::TooFewSamples { available: end - start, required: MIN_BULK_SAMPLES });
    }
    let y = representative.slice(s![start..end]);

    let mut profile = Vec::with_capacity(coarse.len());
    let mut best = BestCandidate::new();
    match opts.criterion {
        BulkCriterion::SignedCorrelation | BulkCriterion::AbsCorrelation => {
            if is_constant(y) {
                return Err(LagError::Regression(RegressionError::ConstantResponse));
            }
            for c in 0..coarse.len() {
                let x = coarse.candidate(c);
                let r = pearson(x.slice(s![start..end]), y);
                let score =
                    if opts.criterion == BulkCriterion::AbsCorrelation { r.abs() } else { r };
                profile.push((coarse.lag(c), score));
                best.offer(coarse.lag(c), score, ());
            }
        }
        BulkCriterion::RSquared => {
            let mut design =
                DesignMatrix::new(nuisance.rows(start, end), false, timing.sample_interval);
            for c in 0..coarse.len() {
                design.set_regressor(coarse.candidate(c).slice(s![start..end]))?;
                let score = match design.fit(y) {
                    Ok(fit) => fit.r_squared,
                    Err(err @ (RegressionError::ConstantResponse
                    | RegressionError::NonFiniteResponse { .. }
                    | RegressionError::Underdetermined { .. })) => {
                        return Err(LagError::Regression(err));
                    }
                    Err(_) => f64::NAN,
                };
                profile.push((coarse.lag(c), score));
                best.offer(coarse.lag(c), score, ());
            }
        }
    }

    let (lag, score, ()) = best.into_inner().ok_or(LagError::NoValidCandidate)?;
    let window = range.centered(lag, half_width);
    info!(
        lag,
        score,
        criterion = ?opts.criterion,
        samples = end - start,
        window_min = window.min(),
        window_max = window.max(),
        "bulk shift estimated"
    );
    Ok(BulkShift { lag, score, profile, window })
}

/// Pearson correlation; NaN when either series has zero variance.
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return f64::NAN;
    }
    let mx = x.sum() / n;
    let my = y.sum() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y.iter()) {
        let (da, db) = (a - mx, b - my);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

fn is_constant(y: ArrayView1<'_, f64>) -> bool {
    let first = y[0];
    y.iter().all(|&v| v == first)
}
