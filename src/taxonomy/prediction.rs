//! Prediction and result types shared by every stage of the decision layer.

use crate::constants::SCORE_SCALE;
use crate::inference::EchoedOptions;
use crate::taxonomy::rank::{Rank, is_major_rank_level};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single taxon scored by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Taxon id, unique per taxon.
    pub taxon_id: u32,
    /// Scientific name.
    pub name: String,
    /// Numeric rank level (100 = root, 5 = subspecies).
    pub rank_level: f64,
    /// Combined confidence. Unit scale on ingestion, percent after scaling.
    pub score: f64,
    /// Symbolic rank, filled in by the annotator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
    /// Ancestor taxon ids, root first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_ids: Option<Vec<u32>>,
    /// Model output index; only present on leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<u32>,
    /// Iconic taxon class index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iconic_class_id: Option<u32>,
    /// Geomodel class index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_class_id: Option<u32>,
    /// Image-only confidence when a geomodel was combined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_score: Option<f64>,
    /// Geomodel score for the request location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_score: Option<f64>,
    /// Geomodel pass/fail bar for this taxon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_threshold: Option<f64>,
}

impl Prediction {
    /// Create a prediction with only the required fields set.
    pub fn new(taxon_id: u32, name: impl Into<String>, rank_level: f64, score: f64) -> Self {
        Self {
            taxon_id,
            name: name.into(),
            rank_level,
            score,
            rank: None,
            ancestor_ids: None,
            leaf_id: None,
            iconic_class_id: None,
            spatial_class_id: None,
            vision_score: None,
            geo_score: None,
            geo_threshold: None,
        }
    }

    /// Whether this is a terminal node of the active model.
    pub fn is_leaf(&self) -> bool {
        self.leaf_id.is_some()
    }

    /// Whether the rank level is a multiple of ten.
    pub fn is_major_rank(&self) -> bool {
        is_major_rank_level(self.rank_level)
    }

    /// Whether the geomodel considers this taxon plausible at the location.
    ///
    /// False when either geo field is missing.
    pub fn passes_geo_threshold(&self) -> bool {
        matches!(
            (self.geo_score, self.geo_threshold),
            (Some(score), Some(threshold)) if score >= threshold
        )
    }

    /// Whether `taxon_id` is listed among this prediction's ancestors.
    pub fn has_ancestor(&self, taxon_id: u32) -> bool {
        self.ancestor_ids
            .as_ref()
            .is_some_and(|ids| ids.contains(&taxon_id))
    }

    /// Convert unit scores into percentages.
    #[must_use]
    pub fn into_percent(mut self) -> Self {
        self.score *= SCORE_SCALE;
        self.vision_score = self.vision_score.map(|s| s * SCORE_SCALE);
        self.geo_score = self.geo_score.map(|s| s * SCORE_SCALE);
        self.geo_threshold = self.geo_threshold.map(|s| s * SCORE_SCALE);
        self
    }
}

/// Scale every prediction of an output list to percentages.
pub fn scale_scores(predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions.into_iter().map(Prediction::into_percent).collect()
}

/// Output of one classifier invocation, normalized to a flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionResult {
    /// Predictions, most general first (most specific last).
    pub predictions: Vec<Prediction>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Native inference time in seconds, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_elapsed: Option<f64>,
    /// Options of the request that produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<EchoedOptions>,
}

impl VisionResult {
    /// Create a result stamped with the current time.
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions,
            timestamp: Utc::now(),
            time_elapsed: None,
            options: None,
        }
    }

    /// Score of the most specific (last) prediction, or 0 when empty.
    pub fn last_score(&self) -> f64 {
        self.predictions.last().map_or(0.0, |p| p.score)
    }
}
