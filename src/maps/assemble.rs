//! maps::assemble — scatter unit results back into spatial maps.
//!
//! Placement only: each in-mask position receives its unit's scalars; masked
//! positions and invalid units receive the missing-value sentinel. No
//! estimate is recomputed here.
use crate::{
    lag::voxel::VoxelResult,
    maps::{
        errors::{MapError, MapResult},
        layout::SpatialLayout,
    },
};
use ndarray::ArrayD;

/// CvrMaps — spatially aligned output maps.
///
/// Fields
/// ------
/// - `lag`, `amplitude`, `r_squared`, `t_stat`: `ArrayD<f64>` with the
///   layout's shape; `missing` where `valid` is false.
/// - `valid`: `true` exactly where a unit produced a valid fit.
/// - `missing`: the sentinel used.
#[derive(Debug, Clone, PartialEq)]
pub struct CvrMaps {
    pub lag: ArrayD<f64>,
    pub amplitude: ArrayD<f64>,
    pub r_squared: ArrayD<f64>,
    pub t_stat: ArrayD<f64>,
    pub valid: ArrayD<bool>,
    pub missing: f64,
}

impl CvrMaps {
    pub fn n_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

/// Scatter `results` (one per unit, in unit order) into maps of `layout`.
///
/// Errors
/// ------
/// - `MapError::ResultCountMismatch` if `results.len() != layout.n_units()`.
pub fn assemble_maps(
    results: &[VoxelResult], layout: &SpatialLayout, missing: f64,
) -> MapResult<CvrMaps> {
    let positions = layout.unit_positions();
    if positions.len() != results.len() {
        return Err(MapError::ResultCountMismatch {
            expected: positions.len(),
            actual: results.len(),
        });
    }

    let n = layout.n_positions();
    let mut lag = vec![missing; n];
    let mut amplitude = vec![missing; n];
    let mut r_squared = vec![missing; n];
    let mut t_stat = vec![missing; n];
    let mut valid = vec![false; n];
    for (&pos, res) in positions.iter().zip(results) {
        if !res.is_valid() {
            continue;
        }
        lag[pos] = res.lag;
        amplitude[pos] = res.amplitude;
        r_squared[pos] = res.r_squared;
        t_stat[pos] = res.t_stat;
        valid[pos] = true;
    }

    Ok(CvrMaps {
        lag: layout.shaped(lag)?,
        amplitude: layout.shaped(amplitude)?,
        r_squared: layout.shaped(r_squared)?,
        t_stat: layout.shaped(t_stat)?,
        valid: layout.shaped(valid)?,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::voxel::VoxelStatus;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Placement of valid results at their masked positions.
    // - Sentinel propagation for masked and invalid units.
    // - Result-count validation.
    // -------------------------------------------------------------------------

    fn valid(lag: f64) -> VoxelResult {
        VoxelResult {
            lag,
            amplitude: 2.0 * lag,
            r_squared: 0.5,
            t_stat: 3.0,
            p_value: 0.01,
            status: VoxelStatus::Valid,
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify placement and sentinel propagation.
    //
    // Given
    // -----
    // - 2×2 layout, mask excludes (0,1); units: valid 1.0, invalid, valid 3.0.
    //
    // Expect
    // ------
    // - lag = [[1, −1], [−1, 3]] with sentinel −1; valid matches.
    fn assemble_places_results_and_sentinels() {
        // Arrange
        let mask = array![[true, false], [true, true]].into_dyn();
        let layout = SpatialLayout::new(vec![2, 2], Some(mask)).unwrap();
        let results = [valid(1.0), VoxelResult::invalid(VoxelStatus::RankDeficient), valid(3.0)];

        // Act
        let maps = assemble_maps(&results, &layout, -1.0).unwrap();

        // Assert
        assert_eq!(maps.lag, array![[1.0, -1.0], [-1.0, 3.0]].into_dyn());
        assert_eq!(maps.amplitude, array![[2.0, -1.0], [-1.0, 6.0]].into_dyn());
        assert_eq!(maps.valid, array![[true, false], [false, true]].into_dyn());
        assert_eq!(maps.n_valid(), 2);
    }

    #[test]
    // Purpose
    // -------
    // Ensure NaN is usable as the sentinel.
    //
    // Given
    // -----
    // - Flat layout of 2 units, second invalid, missing = NaN.
    //
    // Expect
    // ------
    // - r_squared[1] is NaN; r_squared[0] = 0.5.
    fn assemble_supports_nan_sentinel() {
        let layout = SpatialLayout::flat(2).unwrap();
        let results = [valid(0.5), VoxelResult::invalid(VoxelStatus::ConstantResponse)];
        let maps = assemble_maps(&results, &layout, f64::NAN).unwrap();
        assert_eq!(maps.r_squared[[0]], 0.5);
        assert!(maps.r_squared[[1]].is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Ensure a wrong number of results is rejected.
    //
    // Given
    // -----
    // - Flat layout of 3 units, 2 results.
    //
    // Expect
    // ------
    // - ResultCountMismatch { expected: 3, actual: 2 }.
    fn assemble_rejects_result_count_mismatch() {
        let layout = SpatialLayout::flat(3).unwrap();
        let results = [valid(0.0), valid(1.0)];
        assert_eq!(
            assemble_maps(&results, &layout, f64::NAN),
            Err(MapError::ResultCountMismatch { expected: 3, actual: 2 })
        );
    }
}
