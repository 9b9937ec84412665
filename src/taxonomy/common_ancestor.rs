//! Common ancestor selection for still-image results.
//!
//! Leaf scores are normalized and rolled up the tree so that confidence
//! split across several similar leaves accumulates on the taxon they share.
//! The most specific taxon whose rolled-up score clears the selection bar is
//! reported as the common ancestor.

use crate::constants::common_ancestor::{
    AGGREGATION_LEAVES, HUMAN_SCORE_MARGIN, HUMAN_TAXON_ID, LEAF_CUTOFF_RATIO, MAX_RANK_LEVEL,
    MIN_RANK_LEVEL, SCORE_THRESHOLD, TOP_LEAVES, TOP_PREDICTIONS,
};
use crate::taxonomy::prediction::Prediction;
use crate::taxonomy::rank::is_major_rank_level;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Which ranks may be reported as a common ancestor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RankType {
    /// Only major ranks (family, genus, ...).
    Major,
    /// Genus up to superfamily.
    #[default]
    Default,
    /// Genus and anything above it.
    Unrestricted,
}

impl RankType {
    /// Whether a taxon at `rank_level` may be selected under this rank type.
    ///
    /// The genus floor applies to every rank type.
    pub fn allows(self, rank_level: f64) -> bool {
        if rank_level < MIN_RANK_LEVEL {
            return false;
        }
        match self {
            Self::Major => is_major_rank_level(rank_level),
            Self::Default => rank_level <= MAX_RANK_LEVEL,
            Self::Unrestricted => true,
        }
    }
}

impl std::fmt::Display for RankType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Default => write!(f, "default"),
            Self::Unrestricted => write!(f, "unrestricted"),
        }
    }
}

/// Output of [`common_ancestor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonAncestorResult {
    /// Best leaves, unnormalized, on the percent scale.
    pub top_predictions: Vec<Prediction>,
    /// Selected ancestor on the percent scale, if any cleared the bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_ancestor: Option<Prediction>,
}

/// Select a common ancestor from a full still-image prediction set.
///
/// `predictions` holds leaves and internal nodes. Leaves must carry
/// `ancestor_ids` for their internal nodes to receive any rolled-up score.
pub fn common_ancestor(predictions: &[Prediction], rank_type: RankType) -> CommonAncestorResult {
    let mut leaves: Vec<Prediction> = predictions.iter().filter(|p| p.is_leaf()).cloned().collect();
    leaves.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut top_leaves = apply_human_override(leaves);
    top_leaves.truncate(TOP_LEAVES);

    let normalized = normalize_leaves(&top_leaves);
    let ancestors = aggregate_ancestors(predictions, &normalized);
    debug!(
        "Common ancestor pool: {} leaves, {} ancestors",
        normalized.len(),
        ancestors.len()
    );

    let mut pool: Vec<Prediction> = normalized.into_iter().chain(ancestors).collect();
    if pool.iter().any(Prediction::passes_geo_threshold) {
        pool.retain(Prediction::passes_geo_threshold);
    }

    let ancestor = pool
        .into_iter()
        .filter(|p| p.score > SCORE_THRESHOLD && rank_type.allows(p.rank_level))
        .min_by(|a, b| a.rank_level.total_cmp(&b.rank_level));

    CommonAncestorResult {
        top_predictions: top_leaves
            .into_iter()
            .take(TOP_PREDICTIONS)
            .map(Prediction::into_percent)
            .collect(),
        common_ancestor: ancestor.map(Prediction::into_percent),
    }
}

/// Resolve human detections among score-sorted leaves.
///
/// A human leaf survives alone only when it is ranked first by a clear
/// margin; any other human detection empties the candidate list.
pub fn apply_human_override(leaves: Vec<Prediction>) -> Vec<Prediction> {
    if leaves.len() <= 1 {
        return leaves;
    }
    let Some(human_index) = leaves.iter().position(|p| p.taxon_id == HUMAN_TAXON_ID) else {
        return leaves;
    };

    if human_index == 0 && leaves[0].score > leaves[1].score * HUMAN_SCORE_MARGIN {
        debug!("Human leaf dominates, dropping other candidates");
        leaves.into_iter().take(1).collect()
    } else {
        debug!("Ambiguous human leaf, dropping all candidates");
        Vec::new()
    }
}

/// Keep the leaves used for aggregation and scale their scores to sum to one.
fn normalize_leaves(top_leaves: &[Prediction]) -> Vec<Prediction> {
    let Some(top_score) = top_leaves.first().map(|p| p.score) else {
        return Vec::new();
    };
    let cutoff = top_score * LEAF_CUTOFF_RATIO;

    let mut kept: Vec<Prediction> = top_leaves
        .iter()
        .take(AGGREGATION_LEAVES)
        .filter(|p| p.score >= cutoff)
        .cloned()
        .collect();

    let total: f64 = kept.iter().map(|p| p.score).sum();
    if total > 0.0 {
        for leaf in &mut kept {
            leaf.score /= total;
        }
    }
    kept
}

/// Ancestors of the normalized leaves, scored by the sum of their leaves.
///
/// The classifier's own scores for an internal node are discarded. The
/// vision score becomes the sum of the leaves' vision scores, or `None` when
/// no leaf carries one.
fn aggregate_ancestors(predictions: &[Prediction], leaves: &[Prediction]) -> Vec<Prediction> {
    let wanted: HashSet<u32> = leaves
        .iter()
        .filter_map(|leaf| leaf.ancestor_ids.as_ref())
        .flatten()
        .copied()
        .collect();

    let mut seen = HashSet::new();
    predictions
        .iter()
        .filter(|p| !p.is_leaf() && wanted.contains(&p.taxon_id) && seen.insert(p.taxon_id))
        .map(|ancestor| {
            let mut ancestor = ancestor.clone();
            let below: Vec<&Prediction> = leaves
                .iter()
                .filter(|leaf| leaf.has_ancestor(ancestor.taxon_id))
                .collect();
            ancestor.score = below.iter().map(|leaf| leaf.score).sum();
            ancestor.vision_score = below
                .iter()
                .filter_map(|leaf| leaf.vision_score)
                .reduce(|sum, score| sum + score);
            ancestor
        })
        .collect()
}
