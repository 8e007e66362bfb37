//! maps::errors — spatial layout and map assembly failures.
pub type MapResult<T> = Result<T, MapError>;

/// MapError — shape inconsistencies between layout, mask, volume, and
/// results.
///
/// Variants
/// --------
/// - `EmptyShape`
///   The spatial shape has no dimensions or a zero-length dimension.
/// - `MaskShapeMismatch { shape, mask }`
///   Mask shape differs from the spatial shape.
/// - `VolumeShapeMismatch { expected, actual }`
///   A volume's leading dimensions differ from the spatial shape (or the
///   volume lacks a trailing time axis).
/// - `ResultCountMismatch { expected, actual }`
///   Number of unit results differs from the number of in-mask positions.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    EmptyShape,
    MaskShapeMismatch { shape: Vec<usize>, mask: Vec<usize> },
    VolumeShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },
    ResultCountMismatch { expected: usize, actual: usize },
}

impl std::error::Error for MapError {}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::EmptyShape => {
                write!(f, "Spatial shape must have at least one non-empty dimension.")
            }
            MapError::MaskShapeMismatch { shape, mask } => {
                write!(f, "Mask shape {mask:?} does not match spatial shape {shape:?}.")
            }
            MapError::VolumeShapeMismatch { expected, actual } => write!(
                f,
                "Volume shape {actual:?} does not match spatial shape {expected:?} plus a time \
                 axis."
            ),
            MapError::ResultCountMismatch { expected, actual } => write!(
                f,
                "Got {actual} unit results for {expected} in-mask positions."
            ),
        }
    }
}
