//! Collapse a taxonomic path to the major ranks above a confidence bar.

use crate::taxonomy::prediction::Prediction;

/// Keep major-rank predictions scoring above `confidence_threshold`.
///
/// The threshold is compared against `score` as is, so both must be on the
/// same scale (percent for every output path in this crate).
pub fn rollup(predictions: Vec<Prediction>, confidence_threshold: f64) -> Vec<Prediction> {
    predictions
        .into_iter()
        .filter(|p| p.is_major_rank() && p.score > confidence_threshold)
        .collect()
}
