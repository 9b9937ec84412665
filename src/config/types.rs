//! Configuration type definitions.

use crate::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CROP_RATIO, DEFAULT_VERSION,
};
use crate::inference::{Mode, RequestOptions};
use crate::taxonomy::RankType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default request settings.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Location canonicalization settings.
    #[serde(default)]
    pub geo: GeoConfig,

    /// Taxonomy settings.
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

/// Default request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Model version.
    pub version: String,

    /// Confidence threshold for rolled-up predictions.
    pub confidence_threshold: f64,

    /// Center crop ratio.
    pub crop_ratio: f64,

    /// Frames kept for stabilization.
    pub buffer_size: usize,

    /// Ranks eligible as common ancestor.
    pub rank_type: RankType,

    /// Still-image mode.
    pub mode: Mode,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            crop_ratio: DEFAULT_CROP_RATIO,
            buffer_size: DEFAULT_BUFFER_SIZE,
            rank_type: RankType::default(),
            mode: Mode::default(),
        }
    }
}

impl DefaultsConfig {
    /// Request options carrying these defaults.
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            version: self.version.clone(),
            confidence_threshold: self.confidence_threshold,
            crop_ratio: self.crop_ratio,
            ..RequestOptions::default()
        }
    }
}

/// Location canonicalization settings.
///
/// The grid resolution is not configurable; it is tied to the elevation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// JSON elevation table keyed by short cell id.
    pub elevation_table: Option<PathBuf>,
}

/// Taxonomy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Taxonomy CSV accompanying the model.
    pub path: Option<PathBuf>,
}
