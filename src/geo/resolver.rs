//! Canonicalize raw coordinates to the grid cell the geomodel expects.

use crate::constants::geo::CELL_RESOLUTION;
use crate::error::{Error, Result};
use crate::geo::elevation::ElevationTable;
use crate::geo::encode::encode_location;
use crate::geo::grid::GridGeometry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A location supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Elevation in meters, if the device reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Location {
    /// Location without elevation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    /// Reject non-finite or out-of-range coordinates.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(Error::MissingLocation);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidLatitude {
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidLongitude {
                value: self.longitude,
            });
        }
        Ok(())
    }
}

/// Cell centroid plus the cell's tabulated elevation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLocation {
    /// Centroid latitude in degrees.
    pub latitude: f64,
    /// Centroid longitude in degrees.
    pub longitude: f64,
    /// Mean cell elevation, or the unknown sentinel.
    pub elevation: f64,
    /// Id of the containing cell.
    pub cell_id: String,
}

impl CanonicalLocation {
    /// Geomodel input features for this location.
    pub fn features(&self) -> [f32; 5] {
        encode_location(self.latitude, self.longitude, self.elevation)
    }
}

/// Maps raw locations onto grid cells.
#[derive(Clone)]
pub struct CellResolver {
    grid: Arc<dyn GridGeometry>,
    elevation: Arc<ElevationTable>,
}

impl std::fmt::Debug for CellResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellResolver")
            .field("elevation_cells", &self.elevation.len())
            .field("resolution", &CELL_RESOLUTION)
            .finish_non_exhaustive()
    }
}

impl CellResolver {
    /// Resolver at the geomodel's grid resolution.
    ///
    /// The resolution is fixed: elevation table keys are only defined for
    /// cells at [`CELL_RESOLUTION`].
    pub fn new(grid: Arc<dyn GridGeometry>, elevation: Arc<ElevationTable>) -> Self {
        Self { grid, elevation }
    }

    /// Snap a location to its cell centroid and look up the cell elevation.
    ///
    /// Any elevation the caller supplied is ignored; the geomodel was trained
    /// on the tabulated per-cell values.
    pub fn resolve(&self, location: &Location) -> Result<CanonicalLocation> {
        location.validate()?;
        let cell_id = self
            .grid
            .cell_id(location.latitude, location.longitude, CELL_RESOLUTION)?;
        let (latitude, longitude) = self.grid.centroid(&cell_id)?;
        let elevation = self.elevation.lookup(&cell_id);
        debug!("Resolved ({}, {}) to cell {cell_id}", location.latitude, location.longitude);
        Ok(CanonicalLocation {
            latitude,
            longitude,
            elevation,
            cell_id,
        })
    }
}
