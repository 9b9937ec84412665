//! Taxonomic data model and the pure decision steps built on it.

mod annotate;
mod common_ancestor;
mod prediction;
mod rank;
mod rollup;
mod tree;

pub use annotate::{annotate, annotate_ranks};
pub use common_ancestor::{
    CommonAncestorResult, RankType, apply_human_override, common_ancestor,
};
pub use prediction::{Prediction, VisionResult, scale_scores};
pub use rank::{Rank, is_major_rank_level};
pub use rollup::rollup;
pub use tree::{NodeScores, TaxonFilter, Taxonomy, combine_vision_and_geo};
