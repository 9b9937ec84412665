//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "taxalens";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "TAXALENS_CONFIG";

/// Model versions accepted by request validation.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0", "2.3", "2.4", "2.13", "small_2"];

/// Model versions that report confidence thresholds on the 0-1 scale.
pub const LEGACY_SCALE_VERSIONS: &[&str] = &["1.0"];

/// Default model version.
pub const DEFAULT_VERSION: &str = "2.13";

/// Default number of frame results kept for stabilization.
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Default confidence threshold on the percentage scale.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 70.0;

/// Default centre-crop ratio applied to camera frames.
pub const DEFAULT_CROP_RATIO: f64 = 1.0;

/// Multiplier that converts unit scores into percentages.
pub const SCORE_SCALE: f64 = 100.0;

/// Confidence threshold bounds.
pub mod confidence {
    /// Minimum valid threshold.
    pub const MIN: f64 = 0.0;
    /// Maximum valid threshold on the percentage scale.
    pub const MAX_PERCENT: f64 = 100.0;
    /// Maximum valid threshold on the legacy unit scale.
    pub const MAX_UNIT: f64 = 1.0;
}

/// Temporal stabilization constants.
pub mod stabilize {
    /// Total penalty applied to the oldest entry of a full buffer.
    pub const MAX_AGE_PENALTY: f64 = 0.5;
}

/// Rank level constants.
pub mod rank {
    /// Rank levels that are multiples of this are major (Linnean) ranks.
    pub const MAJOR_RANK_STEP: f64 = 10.0;
}

/// Common ancestor calibration.
///
/// These mirror the reference identification service and must be kept as is.
pub mod common_ancestor {
    /// Taxon id of Homo sapiens.
    pub const HUMAN_TAXON_ID: u32 = 43584;
    /// Score ratio a top human leaf needs over the runner-up to be kept.
    pub const HUMAN_SCORE_MARGIN: f64 = 1.5;
    /// First truncation of the sorted leaf list.
    pub const TOP_LEAVES: usize = 100;
    /// Leaves considered for aggregation.
    pub const AGGREGATION_LEAVES: usize = 15;
    /// Leaves scoring below `top * LEAF_CUTOFF_RATIO` are dropped.
    pub const LEAF_CUTOFF_RATIO: f64 = 0.01;
    /// Minimum aggregated score for a common ancestor.
    pub const SCORE_THRESHOLD: f64 = 0.78;
    /// Most specific rank level a common ancestor may have.
    pub const MIN_RANK_LEVEL: f64 = 20.0;
    /// Most general rank level for the default rank type.
    pub const MAX_RANK_LEVEL: f64 = 33.0;
    /// Number of leaves reported alongside the ancestor.
    pub const TOP_PREDICTIONS: usize = 10;
}

/// Taxonomy tree constants.
pub mod taxonomy {
    /// Taxon id of the synthetic root node.
    pub const LIFE_TAXON_ID: u32 = 48460;
    /// Name of the synthetic root node.
    pub const LIFE_NAME: &str = "Life";
    /// Rank level of the synthetic root node.
    pub const LIFE_RANK_LEVEL: f64 = 100.0;
    /// Nodes scoring at or below `top_leaf * PREFILTER_RATIO` are not reported.
    pub const PREFILTER_RATIO: f64 = 0.001;
}

/// Geospatial constants.
pub mod geo {
    /// Grid resolution the geomodel was trained on.
    pub const CELL_RESOLUTION: u8 = 4;
    /// Elevation reported when the cell is not in the lookup table.
    pub const UNKNOWN_ELEVATION: f64 = -32768.0;
    /// Character range of a cell id used as elevation table key.
    ///
    /// Resolution 4 ids all start with "84" and end in a run of 'f'.
    pub const SHORT_ID_RANGE: std::ops::Range<usize> = 2..7;
    /// Elevation normalizer for positive elevations (metres).
    pub const MAX_ELEVATION: f64 = 5705.63;
    /// Elevation normalizer for zero and negative elevations.
    pub const MIN_ELEVATION_MAGNITUDE: f64 = 32768.0;
}
