//! lag::voxel — per-unit lag optimization.
//!
//! Purpose
//! -------
//! For one response series, fit the full model at every fine candidate lag
//! inside the bulk window and keep the candidate with the highest R².
//!
//! Key behaviors
//! -------------
//! - Every candidate is scored with the same engine that produces the
//!   reported fit, so the reported amplitude, R² and t-statistic belong to
//!   the selected lag.
//! - Failures never propagate: a unit that cannot be fitted is returned
//!   with a non-`Valid` [`VoxelStatus`] and NaN estimates.
//! - Candidates whose design is rank-deficient or whose R² is out of range
//!   are skipped; the unit is invalid only if no candidate survives.
//!
//! Invariants & assumptions
//! ------------------------
//! - A valid result's lag is one of the bank's lags inside `window`, hence
//!   inside the configured lag range.
//! - `0 ≤ r_squared ≤ 1` for valid results.
use crate::{
    lag::select::BestCandidate,
    regression::{design::DesignMatrix, errors::RegressionError, ols::FitResult},
    regressors::bank::RegressorBank,
};
use ndarray::ArrayView1;
use std::ops::Range;
use tracing::{debug, warn};

/// Outcome class of one unit's fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelStatus {
    Valid,
    /// Every candidate design was rank-deficient.
    RankDeficient,
    /// No candidate produced a usable fit for numerical reasons.
    NumericalFault,
    ConstantResponse,
    NonFiniteResponse,
}

/// VoxelResult — estimates for one unit.
///
/// Fields
/// ------
/// - `lag`: selected lag in seconds.
/// - `amplitude`: regressor coefficient at `lag` (the CVR value).
/// - `r_squared`: fit quality at `lag`.
/// - `t_stat`, `p_value`: amplitude significance.
/// - `status`: [`VoxelStatus`]; non-`Valid` results carry NaN estimates.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelResult {
    pub lag: f64,
    pub amplitude: f64,
    pub r_squared: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub status: VoxelStatus,
}

impl VoxelResult {
    pub fn invalid(status: VoxelStatus) -> Self {
        VoxelResult {
            lag: f64::NAN,
            amplitude: f64::NAN,
            r_squared: f64::NAN,
            t_stat: f64::NAN,
            p_value: f64::NAN,
            status,
        }
    }

    fn from_fit(lag: f64, fit: &FitResult) -> Self {
        VoxelResult {
            lag,
            amplitude: fit.amplitude(),
            r_squared: fit.r_squared,
            t_stat: fit.t_stat(),
            p_value: fit.p_value(),
            status: VoxelStatus::Valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == VoxelStatus::Valid
    }
}

impl Default for VoxelResult {
    fn default() -> Self {
        VoxelResult::invalid(VoxelStatus::NumericalFault)
    }
}

/// Select the best lag for `response` among `bank` candidates in `window`.
///
/// Parameters
/// ----------
/// - `response`: unit series at the response times.
/// - `bank`: fine [`RegressorBank`].
/// - `window`: candidate index range (see `LagGrid::index_range`).
/// - `design`: worker-owned [`DesignMatrix`] whose nuisance block matches
///   the response length.
///
/// Returns
/// -------
/// `VoxelResult`, never an error; see [`VoxelStatus`].
pub fn optimize_voxel(
    response: ArrayView1<'_, f64>, bank: &RegressorBank, window: Range<usize>,
    design: &mut DesignMatrix,
) -> VoxelResult {
    if response.iter().any(|v| !v.is_finite()) {
        return VoxelResult::invalid(VoxelStatus::NonFiniteResponse);
    }
    if let Some(&first) = response.first() {
        if response.iter().all(|&v| v == first) {
            return VoxelResult::invalid(VoxelStatus::ConstantResponse);
        }
    }

    let mut best: BestCandidate<FitResult> = BestCandidate::new();
    let (mut n_rank, mut n_fault) = (0usize, 0usize);
    for c in window {
        if design.set_regressor(bank.candidate(c)).is_err() {
            n_fault += 1;
            continue;
        }
        match design.fit(response) {
            Ok(fit) => best.offer(bank.lag(c), fit.r_squared, fit),
            Err(RegressionError::ConstantResponse) => {
                return VoxelResult::invalid(VoxelStatus::ConstantResponse);
            }
            Err(RegressionError::NonFiniteResponse { .. }) => {
                return VoxelResult::invalid(VoxelStatus::NonFiniteResponse);
            }
            Err(err) if err.is_rank_deficiency() => n_rank += 1,
            Err(RegressionError::RSquaredOutOfRange { value }) => {
                warn!(lag = bank.lag(c), r_squared = value, "candidate R² outside [0, 1]");
                n_fault += 1;
            }
            Err(err) => {
                debug!(lag = bank.lag(c), error = %err, "candidate fit rejected");
                n_fault += 1;
            }
        }
    }

    match best.into_inner() {
        Some((lag, _, fit)) => VoxelResult::from_fit(lag, &fit),
        None if n_rank > 0 && n_rank >= n_fault => VoxelResult::invalid(VoxelStatus::RankDeficient),
        None => VoxelResult::invalid(VoxelStatus::NumericalFault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressors::{
        bank::{LagGrid, LagRange},
        legendre::NuisanceBasis,
        series::{SampleTiming, TimeSeries},
    };
    use approx::assert_relative_eq;
    use ndarray::Array1;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Sub-sample lag and amplitude recovery.
    // - Window restriction.
    // - Status classification for degenerate responses.
    // -------------------------------------------------------------------------

    fn fixture() -> (RegressorBank, NuisanceBasis, TimeSeries) {
        let values = Array1::from_iter((0..400).map(|i| {
            let t = i as f64 * 0.5;
            (0.11 * t).sin() + 0.5 * (0.037 * t).cos()
        }));
        let reg = TimeSeries::new(values, 0.5, 0.0).unwrap();
        let timing = SampleTiming::new(20.0, 1.0, 150).unwrap();
        let range = LagRange::symmetric(6.0).unwrap();
        let grid = LagGrid::fine(range, 1.0, 0.5, false).unwrap();
        let bank = RegressorBank::build(&reg, timing, grid).unwrap();
        let nuisance = NuisanceBasis::legendre(2, timing.len).unwrap();
        (bank, nuisance, reg)
    }

    fn response(reg: &TimeSeries, lag: f64, amp: f64) -> Array1<f64> {
        Array1::from_iter(
            (0..150).map(|i| amp * reg.sample_at(20.0 + i as f64 - lag).unwrap() + 3.0),
        )
    }

    #[test]
    // Purpose
    // -------
    // Verify recovery of a half-sample lag and its amplitude.
    //
    // Given
    // -----
    // - Response 1.5·r(t − 2.5) + 3, fine grid step 0.5 over ±6.
    //
    // Expect
    // ------
    // - lag 2.5, amplitude 1.5, R² ≈ 1, status Valid.
    fn optimize_voxel_recovers_half_sample_lag() {
        // Arrange
        let (bank, nuisance, reg) = fixture();
        let y = response(&reg, 2.5, 1.5);
        let mut design = DesignMatrix::new(nuisance.columns(), false, 1.0);

        // Act
        let res = optimize_voxel(y.view(), &bank, 0..bank.len(), &mut design);

        // Assert
        assert!(res.is_valid());
        assert_eq!(res.lag, 2.5);
        assert_relative_eq!(res.amplitude, 1.5, epsilon = 1e-6);
        assert_relative_eq!(res.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Verify the search never leaves the supplied window.
    //
    // Given
    // -----
    // - True lag 2.5 but window [−1, 1].
    //
    // Expect
    // ------
    // - Selected lag within [−1, 1].
    fn optimize_voxel_respects_window() {
        // Arrange
        let (bank, nuisance, reg) = fixture();
        let y = response(&reg, 2.5, 1.5);
        let mut design = DesignMatrix::new(nuisance.columns(), true, 1.0);
        let window = bank.grid().index_range(&LagRange::new(-1.0, 1.0).unwrap());

        // Act
        let res = optimize_voxel(y.view(), &bank, window, &mut design);

        // Assert
        assert!(res.is_valid());
        assert!((-1.0..=1.0).contains(&res.lag));
    }

    #[test]
    // Purpose
    // -------
    // Ensure degenerate responses are classified rather than fitted.
    //
    // Given
    // -----
    // - A constant response, a response with NaN, and an empty window.
    //
    // Expect
    // ------
    // - ConstantResponse, NonFiniteResponse, NumericalFault; NaN estimates.
    fn optimize_voxel_classifies_degenerate_inputs() {
        // Arrange
        let (bank, nuisance, reg) = fixture();
        let mut design = DesignMatrix::new(nuisance.columns(), false, 1.0);
        let flat = Array1::from_elem(150, 2.0);
        let mut nan = response(&reg, 0.0, 1.0);
        nan[3] = f64::NAN;
        let good = response(&reg, 0.0, 1.0);

        // Act
        let r_flat = optimize_voxel(flat.view(), &bank, 0..bank.len(), &mut design);
        let r_nan = optimize_voxel(nan.view(), &bank, 0..bank.len(), &mut design);
        let r_empty = optimize_voxel(good.view(), &bank, 0..0, &mut design);

        // Assert
        assert_eq!(r_flat.status, VoxelStatus::ConstantResponse);
        assert_eq!(r_nan.status, VoxelStatus::NonFiniteResponse);
        assert_eq!(r_empty.status, VoxelStatus::NumericalFault);
        assert!(r_flat.lag.is_nan() && r_flat.amplitude.is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Verify a regressor collinear with the nuisance basis is reported as
    // rank-deficient.
    //
    // Given
    // -----
    // - Constant regressor (collinear with the intercept).
    //
    // Expect
    // ------
    // - Status RankDeficient.
    fn optimize_voxel_flags_collinear_regressor() {
        // Arrange
        let reg = TimeSeries::new(Array1::from_elem(400, 1.0), 0.5, 0.0).unwrap();
        let timing = SampleTiming::new(20.0, 1.0, 150).unwrap();
        let grid = LagGrid::coarse(LagRange::symmetric(2.0).unwrap(), 1.0).unwrap();
        let bank = RegressorBank::build(&reg, timing, grid).unwrap();
        let nuisance = NuisanceBasis::legendre(1, 150).unwrap();
        let mut design = DesignMatrix::new(nuisance.columns(), false, 1.0);
        let y = Array1::from_iter((0..150).map(|i| (i as f64 * 0.3).sin()));

        // Act
        let res = optimize_voxel(y.view(), &bank, 0..bank.len(), &mut design);

        // Assert
        assert_eq!(res.status, VoxelStatus::RankDeficient);
    }
}
