//! Geomodel input features.

use crate::constants::geo::{MAX_ELEVATION, MIN_ELEVATION_MAGNITUDE};
use std::f64::consts::PI;

/// Encode a location as the five geomodel input features.
///
/// Coordinates become sin/cos pairs so the model sees the antimeridian and the
/// poles as continuous. Elevation is scaled by the highest land elevation
/// above sea level and by the sentinel magnitude below it, so the unknown
/// sentinel encodes as exactly -1.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_location(latitude: f64, longitude: f64, elevation: f64) -> [f32; 5] {
    let lon = PI * longitude / 180.0;
    let lat = PI * latitude / 90.0;
    let elevation = if elevation > 0.0 {
        elevation / MAX_ELEVATION
    } else {
        elevation / MIN_ELEVATION_MAGNITUDE
    };
    [
        lon.sin() as f32,
        lat.sin() as f32,
        lon.cos() as f32,
        lat.cos() as f32,
        elevation as f32,
    ]
}
