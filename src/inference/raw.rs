//! Raw classifier output and its normalization into [`VisionResult`].
//!
//! Backends report predictions either as a flat list or, in the legacy
//! layout, grouped under rank names. Rank may be given as a numeric level
//! or as a name. Everything is folded into one flat list here so the
//! decision layer only ever sees one shape.

use crate::taxonomy::{Prediction, Rank, VisionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Rank as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRank {
    /// Numeric rank level.
    Level(f64),
    /// Rank name such as "genus".
    Name(String),
}

impl RawRank {
    fn level(&self) -> Option<f64> {
        match self {
            Self::Level(level) => Some(*level),
            Self::Name(name) => name.parse::<Rank>().ok().map(Rank::level),
        }
    }
}

/// A prediction exactly as a backend emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Taxon id.
    pub taxon_id: u32,
    /// Scientific name.
    pub name: String,
    /// Unit-scale score.
    pub score: f64,
    /// Numeric rank level, if reported under this name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_level: Option<f64>,
    /// Rank as level or name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<RawRank>,
    /// Ancestor ids, root first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_ids: Option<Vec<u32>>,
    /// Model output index of a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<u32>,
    /// Iconic class index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iconic_class_id: Option<u32>,
    /// Geomodel class index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_class_id: Option<u32>,
    /// Vision-only score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_score: Option<f64>,
    /// Geomodel score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_score: Option<f64>,
    /// Geomodel threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_threshold: Option<f64>,
}

impl RawPrediction {
    /// Resolve the rank level, falling back to the group the entry was found in.
    fn into_prediction(self, group: Option<&str>) -> Option<Prediction> {
        let level = self
            .rank_level
            .or_else(|| self.rank.as_ref().and_then(RawRank::level))
            .or_else(|| group.and_then(|g| g.parse::<Rank>().ok()).map(Rank::level));

        let Some(rank_level) = level else {
            warn!(
                "Dropping prediction for taxon {} ({}): no rank level",
                self.taxon_id, self.name
            );
            return None;
        };

        let rank = match &self.rank {
            Some(RawRank::Name(name)) => name.parse::<Rank>().ok(),
            _ => None,
        };

        Some(Prediction {
            taxon_id: self.taxon_id,
            name: self.name,
            rank_level,
            score: self.score,
            rank,
            ancestor_ids: self.ancestor_ids,
            leaf_id: self.leaf_id,
            iconic_class_id: self.iconic_class_id,
            spatial_class_id: self.spatial_class_id,
            vision_score: self.vision_score,
            geo_score: self.geo_score,
            geo_threshold: self.geo_threshold,
        })
    }
}

impl From<Prediction> for RawPrediction {
    fn from(prediction: Prediction) -> Self {
        Self {
            taxon_id: prediction.taxon_id,
            name: prediction.name,
            score: prediction.score,
            rank_level: Some(prediction.rank_level),
            rank: prediction.rank.map(|r| RawRank::Name(r.as_str().to_string())),
            ancestor_ids: prediction.ancestor_ids,
            leaf_id: prediction.leaf_id,
            iconic_class_id: prediction.iconic_class_id,
            spatial_class_id: prediction.spatial_class_id,
            vision_score: prediction.vision_score,
            geo_score: prediction.geo_score,
            geo_threshold: prediction.geo_threshold,
        }
    }
}

/// The accepted layouts of a prediction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPredictions {
    /// One list, mixing leaves and ancestors.
    Flat(Vec<RawPrediction>),
    /// A list of `{rank name: [prediction, ...]}` objects.
    Grouped(Vec<BTreeMap<String, Vec<RawPrediction>>>),
    /// A single `{rank name: [prediction, ...]}` object.
    ByRank(BTreeMap<String, Vec<RawPrediction>>),
}

/// Classifier output before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// Predictions in any accepted layout.
    pub predictions: RawPredictions,
    /// Production time, if the backend stamped it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Native inference time in seconds.
    #[serde(
        default,
        alias = "timeElapsed",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_elapsed: Option<f64>,
}

impl RawResult {
    /// Flat result from already-normalized predictions.
    pub fn from_predictions(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions: RawPredictions::Flat(
                predictions.into_iter().map(RawPrediction::from).collect(),
            ),
            timestamp: Some(Utc::now()),
            time_elapsed: None,
        }
    }

    /// Fold into a flat result.
    ///
    /// Flat lists keep their order. Grouped layouts carry no order of their
    /// own, so they are sorted most general first (descending rank level).
    pub fn normalize(self) -> VisionResult {
        let predictions = match self.predictions {
            RawPredictions::Flat(list) => list
                .into_iter()
                .filter_map(|p| p.into_prediction(None))
                .collect(),
            RawPredictions::Grouped(groups) => {
                flatten_groups(groups.into_iter().flat_map(BTreeMap::into_iter))
            }
            RawPredictions::ByRank(groups) => flatten_groups(groups),
        };

        VisionResult {
            predictions,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            time_elapsed: self.time_elapsed,
            options: None,
        }
    }
}

fn flatten_groups(
    groups: impl IntoIterator<Item = (String, Vec<RawPrediction>)>,
) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = groups
        .into_iter()
        .flat_map(|(rank, list)| {
            list.into_iter()
                .filter_map(|p| p.into_prediction(Some(rank.as_str())))
                .collect::<Vec<_>>()
        })
        .collect();
    predictions.sort_by(|a, b| b.rank_level.total_cmp(&a.rank_level));
    predictions
}
