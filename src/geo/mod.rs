//! Geospatial canonicalization for geomodel queries.

mod elevation;
mod encode;
mod grid;
mod resolver;

pub use elevation::{ElevationTable, short_cell_id};
pub use encode::encode_location;
pub use grid::{GridGeometry, H3Grid};
pub use resolver::{CanonicalLocation, CellResolver, Location};
