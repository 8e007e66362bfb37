//! maps — spatial layout and output map assembly.
//!
//! Purpose
//! -------
//! Bridge between the spatial world (volumes, masks) and the flat list of
//! units the lag search runs over.
//!
//! Key behaviors
//! -------------
//! - [`SpatialLayout::gather`] turns a `(spatial..., time)` volume into the
//!   `units × time` matrix, in-mask positions in row-major order.
//! - [`assemble_maps`] scatters per-unit results back into [`CvrMaps`],
//!   writing the missing-value sentinel at masked and invalid positions.
//!
//! Invariants & assumptions
//! ------------------------
//! - Unit order is identical in `gather`, the unit loop, and
//!   `assemble_maps`, regardless of how the loop was scheduled.

pub mod assemble;
pub mod errors;
pub mod layout;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::assemble::{CvrMaps, assemble_maps};
pub use self::errors::{MapError, MapResult};
pub use self::layout::SpatialLayout;
