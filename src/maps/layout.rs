//! maps::layout — spatial shape and processing mask.
//!
//! Purpose
//! -------
//! Describe where each processed unit lives in the original volume. Units
//! are the in-mask positions in row-major (C) order; this ordering is the
//! contract between [`SpatialLayout::gather`], the unit loop, and
//! [`crate::maps::assemble_maps`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `mask`, when present, has exactly `shape`.
//! - Without a mask every position is a unit.
use crate::maps::errors::{MapError, MapResult};
use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn};

/// SpatialLayout — spatial shape plus optional boolean mask.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLayout {
    shape: Vec<usize>,
    mask: Option<ArrayD<bool>>,
}

impl SpatialLayout {
    /// Errors
    /// ------
    /// - `MapError::EmptyShape` if `shape` is empty or has a zero dimension.
    /// - `MapError::MaskShapeMismatch` if `mask.shape() != shape`.
    pub fn new(shape: Vec<usize>, mask: Option<ArrayD<bool>>) -> MapResult<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(MapError::EmptyShape);
        }
        if let Some(m) = &mask {
            if m.shape() != shape.as_slice() {
                return Err(MapError::MaskShapeMismatch { shape, mask: m.shape().to_vec() });
            }
        }
        Ok(SpatialLayout { shape, mask })
    }

    /// Unmasked flat layout of `n` units.
    pub fn flat(n: usize) -> MapResult<Self> {
        SpatialLayout::new(vec![n], None)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn mask(&self) -> Option<&ArrayD<bool>> {
        self.mask.as_ref()
    }

    /// Total number of spatial positions.
    pub fn n_positions(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of in-mask positions (processed units).
    pub fn n_units(&self) -> usize {
        match &self.mask {
            Some(m) => m.iter().filter(|&&b| b).count(),
            None => self.n_positions(),
        }
    }

    /// Row-major flat indices of the in-mask positions, in unit order.
    pub fn unit_positions(&self) -> Vec<usize> {
        match &self.mask {
            Some(m) => m.iter().enumerate().filter(|(_, b)| **b).map(|(i, _)| i).collect(),
            None => (0..self.n_positions()).collect(),
        }
    }

    /// Flatten a `(spatial..., time)` volume into the `units × time` matrix.
    ///
    /// Errors
    /// ------
    /// - `MapError::VolumeShapeMismatch` unless `volume.shape()` is
    ///   `shape` followed by exactly one time axis.
    pub fn gather(&self, volume: ArrayViewD<'_, f64>) -> MapResult<Array2<f64>> {
        let dims = volume.shape();
        if dims.len() != self.shape.len() + 1 || dims[..self.shape.len()] != self.shape[..] {
            return Err(MapError::VolumeShapeMismatch {
                expected: self.shape.clone(),
                actual: dims.to_vec(),
            });
        }
        let n_time = dims[self.shape.len()];
        let flat = volume
            .to_shape((self.n_positions(), n_time))
            .map_err(|_| MapError::VolumeShapeMismatch {
                expected: self.shape.clone(),
                actual: dims.to_vec(),
            })?;
        let positions = self.unit_positions();
        Ok(flat.select(Axis(0), &positions))
    }

    /// Reshape a row-major buffer of `n_positions()` values to `shape`.
    pub(crate) fn shaped<T>(&self, flat: Vec<T>) -> MapResult<ArrayD<T>> {
        let len = flat.len();
        ArrayD::from_shape_vec(IxDyn(&self.shape), flat).map_err(|_| {
            MapError::ResultCountMismatch { expected: self.n_positions(), actual: len }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction guards (empty shape, mask mismatch).
    // - Unit ordering under a mask.
    // - Volume gathering and its shape check.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure inconsistent layouts are rejected.
    //
    // Given
    // -----
    // - Empty shape, zero dimension, and a 2×2 mask for a 2×3 shape.
    //
    // Expect
    // ------
    // - EmptyShape twice, then MaskShapeMismatch.
    fn new_rejects_inconsistent_layouts() {
        // Arrange
        let mask = ArrayD::from_elem(IxDyn(&[2, 2]), true);

        // Act / Assert
        assert_eq!(SpatialLayout::new(vec![], None), Err(MapError::EmptyShape));
        assert_eq!(SpatialLayout::new(vec![3, 0], None), Err(MapError::EmptyShape));
        assert!(matches!(
            SpatialLayout::new(vec![2, 3], Some(mask)),
            Err(MapError::MaskShapeMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify unit ordering is row-major over in-mask positions and that
    // gather returns the matching rows.
    //
    // Given
    // -----
    // - 2×2 volume with 3 time points, value = 10·position + t; mask
    //   excludes position 1.
    //
    // Expect
    // ------
    // - Positions [0, 2, 3]; gathered rows start with 0, 20, 30.
    fn gather_follows_masked_row_major_order() {
        // Arrange
        let mask = array![[true, false], [true, true]].into_dyn();
        let layout = SpatialLayout::new(vec![2, 2], Some(mask)).unwrap();
        let volume = Array::from_shape_fn((2, 2, 3), |(i, j, t)| (10 * (2 * i + j) + t) as f64);

        // Act
        let units = layout.gather(volume.view().into_dyn()).unwrap();

        // Assert
        assert_eq!(layout.n_units(), 3);
        assert_eq!(layout.unit_positions(), vec![0, 2, 3]);
        assert_eq!(units.dim(), (3, 3));
        assert_eq!(units.column(0).to_vec(), vec![0.0, 20.0, 30.0]);
        assert_eq!(units.row(2).to_vec(), vec![30.0, 31.0, 32.0]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure gather rejects a volume whose spatial dims differ.
    //
    // Given
    // -----
    // - Layout 2×2; volume 2×3×4.
    //
    // Expect
    // ------
    // - VolumeShapeMismatch.
    fn gather_rejects_wrong_volume_shape() {
        let layout = SpatialLayout::new(vec![2, 2], None).unwrap();
        let volume = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        assert!(matches!(
            layout.gather(volume.view()),
            Err(MapError::VolumeShapeMismatch { .. })
        ));
    }
}
