//! Rank names and ancestor ids for raw classifier output.

use crate::taxonomy::prediction::{Prediction, VisionResult};
use crate::taxonomy::rank::Rank;
use tracing::debug;

/// Attach a symbolic rank and ancestor ids to every prediction of a result.
///
/// Fields a backend already populated are left untouched.
///
/// # Precondition
///
/// Missing ancestor ids are reconstructed as every other taxon in the same
/// result with a strictly greater rank level. That is only correct when the
/// result is a single linear path through the tree (a best branch). Results
/// holding several branches must arrive with `ancestor_ids` already set.
pub fn annotate(mut result: VisionResult) -> VisionResult {
    annotate_ranks(&mut result.predictions);

    let levels: Vec<(u32, f64)> = result
        .predictions
        .iter()
        .map(|p| (p.taxon_id, p.rank_level))
        .collect();

    for prediction in &mut result.predictions {
        if prediction.ancestor_ids.is_none() {
            let mut ancestors: Vec<(u32, f64)> = levels
                .iter()
                .copied()
                .filter(|&(id, level)| id != prediction.taxon_id && level > prediction.rank_level)
                .collect();
            ancestors.sort_by(|a, b| b.1.total_cmp(&a.1));
            prediction.ancestor_ids = Some(ancestors.into_iter().map(|(id, _)| id).collect());
        }
    }

    result
}

/// Fill in missing symbolic ranks from rank levels.
///
/// Safe on any prediction set, unlike ancestor reconstruction.
pub fn annotate_ranks(predictions: &mut [Prediction]) {
    for prediction in predictions.iter_mut().filter(|p| p.rank.is_none()) {
        prediction.rank = Rank::from_level(prediction.rank_level);
        if prediction.rank.is_none() {
            debug!(
                "No rank name for level {} (taxon {})",
                prediction.rank_level, prediction.taxon_id
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn branch() -> VisionResult {
        VisionResult::new(vec![
            Prediction::new(1, "Animalia", 70.0, 0.99),
            Prediction::new(2, "Chordata", 60.0, 0.98),
            Prediction::new(3, "Canidae", 30.0, 0.9),
            Prediction::new(4, "Vulpes", 20.0, 0.8),
            Prediction::new(5, "Vulpes vulpes", 10.0, 0.7),
        ])
    }

    #[test]
    fn test_annotate_fills_rank_names() {
        let result = annotate(branch());
        let ranks: Vec<Rank> = result
            .predictions
            .iter()
            .map(|p| p.rank.unwrap())
            .collect();
        assert_eq!(
            ranks,
            vec![
                Rank::Kingdom,
                Rank::Phylum,
                Rank::Family,
                Rank::Genus,
                Rank::Species
            ]
        );
    }

    #[test]
    fn test_annotate_reconstructs_ancestors_root_first() {
        let result = annotate(branch());
        assert_eq!(result.predictions[0].ancestor_ids, Some(vec![]));
        assert_eq!(result.predictions[3].ancestor_ids, Some(vec![1, 2, 3]));
        assert_eq!(result.predictions[4].ancestor_ids, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_annotate_ancestors_independent_of_order() {
        let mut result = branch();
        result.predictions.reverse();
        let result = annotate(result);
        // Species is now first in the list
        assert_eq!(result.predictions[0].ancestor_ids, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_annotate_keeps_existing_fields() {
        let mut result = branch();
        result.predictions[4].ancestor_ids = Some(vec![99]);
        result.predictions[4].rank = Some(Rank::Subspecies);

        let result = annotate(result);
        assert_eq!(result.predictions[4].ancestor_ids, Some(vec![99]));
        assert_eq!(result.predictions[4].rank, Some(Rank::Subspecies));
    }

    #[test]
    fn test_annotate_ranks_leaves_ancestors_alone() {
        let mut predictions = vec![
            Prediction::new(1, "Animalia", 70.0, 0.99),
            Prediction::new(5, "Vulpes vulpes", 10.0, 0.7),
        ];
        annotate_ranks(&mut predictions);
        assert_eq!(predictions[1].rank, Some(Rank::Species));
        assert!(predictions[1].ancestor_ids.is_none());
    }

    #[test]
    fn test_annotate_unknown_level_has_no_rank() {
        let result = annotate(VisionResult::new(vec![Prediction::new(7, "Odd", 41.0, 0.5)]));
        assert!(result.predictions[0].rank.is_none());
        assert_eq!(result.predictions[0].ancestor_ids, Some(vec![]));
    }
}
