//! Result types returned to callers of the pipeline.

use crate::geo::CanonicalLocation;
use crate::inference::{EchoedOptions, LocationOptions};
use crate::taxonomy::{Prediction, VisionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame result after stabilization, scaling and rollup.
pub type StabilizedResult = VisionResult;

/// Answer to a still-image request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Rolled-up branch (best-branch mode) or top leaves (common-ancestor mode).
    pub predictions: Vec<Prediction>,
    /// Selected ancestor in common-ancestor mode, if any qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_ancestor: Option<Prediction>,
    /// When the classifier produced the result.
    pub timestamp: DateTime<Utc>,
    /// Native inference time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_elapsed: Option<f64>,
    /// The request options.
    pub options: EchoedOptions,
}

/// Answer to a geomodel request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomodelResult {
    /// Leaf predictions, best first, on the percent scale.
    pub predictions: Vec<Prediction>,
    /// The cell the location resolved to.
    pub location: CanonicalLocation,
    /// When the geomodel produced the result.
    pub timestamp: DateTime<Utc>,
    /// Native inference time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_elapsed: Option<f64>,
    /// The request options.
    pub options: LocationOptions,
}
