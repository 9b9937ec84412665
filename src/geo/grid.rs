//! Discrete global grid used to bucket locations for the geomodel.

use crate::error::{Error, Result};
use h3o::{CellIndex, LatLng, Resolution};

/// Hierarchical hexagonal grid addressing.
///
/// Cell ids are opaque strings; the only structural assumption made
/// elsewhere is that characters `2..7` identify the cell within a resolution.
pub trait GridGeometry: Send + Sync {
    /// Id of the cell containing the given point.
    fn cell_id(&self, latitude: f64, longitude: f64, resolution: u8) -> Result<String>;

    /// Center of a cell as `(latitude, longitude)` in degrees.
    fn centroid(&self, cell_id: &str) -> Result<(f64, f64)>;
}

/// H3 grid backed by the `h3o` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Grid;

impl GridGeometry for H3Grid {
    fn cell_id(&self, latitude: f64, longitude: f64, resolution: u8) -> Result<String> {
        let resolution = Resolution::try_from(resolution).map_err(|e| Error::InvalidCell {
            reason: e.to_string(),
        })?;
        let point = LatLng::new(latitude, longitude).map_err(|e| Error::InvalidCell {
            reason: e.to_string(),
        })?;
        Ok(point.to_cell(resolution).to_string())
    }

    fn centroid(&self, cell_id: &str) -> Result<(f64, f64)> {
        let cell = cell_id
            .parse::<CellIndex>()
            .map_err(|e| Error::InvalidCell {
                reason: format!("{cell_id}: {e}"),
            })?;
        let center = LatLng::from(cell);
        Ok((center.lat(), center.lng()))
    }
}
