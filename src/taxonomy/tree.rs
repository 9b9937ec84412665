//! Taxonomy tree loaded from the CSV file shipped with a model.
//!
//! The vision model only scores leaves. The tree turns a leaf score vector
//! into scores for every taxon (each internal node is the sum of its
//! children) and from there into either a best branch or a full prediction
//! set for the decision layer.

use crate::constants::taxonomy::{LIFE_NAME, LIFE_RANK_LEVEL, LIFE_TAXON_ID, PREFILTER_RATIO};
use crate::error::{Error, Result};
use crate::taxonomy::prediction::Prediction;
use crate::taxonomy::rank::Rank;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One row of the taxonomy CSV.
///
/// Columns are matched by header name, so older files without the
/// iconic/spatial/geo columns load as well.
#[derive(Debug, Deserialize)]
struct TaxonomyRecord {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    parent_taxon_id: Option<u32>,
    taxon_id: u32,
    rank_level: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    leaf_class_id: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    iconic_class_id: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    spatial_class_id: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    geo_threshold: Option<f64>,
    name: String,
}

#[derive(Debug)]
struct Node {
    taxon_id: u32,
    name: String,
    rank_level: f64,
    leaf_id: Option<u32>,
    iconic_class_id: Option<u32>,
    spatial_class_id: Option<u32>,
    geo_threshold: Option<f64>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Restrict scoring to (or away from) one subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonFilter {
    /// Root of the subtree.
    pub taxon_id: u32,
    /// When set, leaves inside the subtree are zeroed instead of those outside.
    pub negative: bool,
}

/// Per-node scores produced by [`Taxonomy::score`].
#[derive(Debug, Clone)]
pub struct NodeScores {
    combined: Vec<f64>,
    vision: Option<Vec<f64>>,
    geo: Option<Vec<f64>>,
}

impl NodeScores {
    /// Combined score of the node with the given taxon id, if known.
    pub fn get(&self, taxonomy: &Taxonomy, taxon_id: u32) -> Option<f64> {
        taxonomy
            .index_of(taxon_id)
            .map(|index| self.combined[index])
    }
}

/// Taxonomy tree rooted at a synthetic "Life" node.
#[derive(Debug)]
pub struct Taxonomy {
    nodes: Vec<Node>,
    by_id: HashMap<u32, usize>,
    leaf_count: usize,
}

const ROOT: usize = 0;

impl Taxonomy {
    /// Load a taxonomy CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = csv::Reader::from_path(path).map_err(|e| Error::TaxonomyRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let taxonomy = Self::from_csv(reader, path)?;
        info!(
            "Loaded taxonomy from {}: {} taxa, {} leaves",
            path.display(),
            taxonomy.nodes.len() - 1,
            taxonomy.leaf_count
        );
        Ok(taxonomy)
    }

    /// Parse taxonomy CSV from an in-memory string.
    pub fn from_csv_str(contents: &str) -> Result<Self> {
        let reader = csv::Reader::from_reader(contents.as_bytes());
        Self::from_csv(reader, &PathBuf::from("inline://taxonomy.csv"))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, origin: &Path) -> Result<Self> {
        let records = reader
            .deserialize::<TaxonomyRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::TaxonomyRead {
                path: origin.to_path_buf(),
                source: e,
            })?;
        Self::build(records)
    }

    fn build(records: Vec<TaxonomyRecord>) -> Result<Self> {
        let mut nodes = Vec::with_capacity(records.len() + 1);
        nodes.push(Node {
            taxon_id: LIFE_TAXON_ID,
            name: LIFE_NAME.to_string(),
            rank_level: LIFE_RANK_LEVEL,
            leaf_id: None,
            iconic_class_id: None,
            spatial_class_id: None,
            geo_threshold: None,
            parent: None,
            children: Vec::new(),
        });

        let mut by_id = HashMap::with_capacity(records.len() + 1);
        by_id.insert(LIFE_TAXON_ID, ROOT);

        let mut parents = Vec::with_capacity(records.len());
        for record in records {
            let index = nodes.len();
            if by_id.insert(record.taxon_id, index).is_some() {
                return Err(Error::TaxonomyParse {
                    message: format!("duplicate taxon id {}", record.taxon_id),
                });
            }
            parents.push((index, record.parent_taxon_id));
            nodes.push(Node {
                taxon_id: record.taxon_id,
                name: record.name,
                rank_level: record.rank_level,
                leaf_id: record.leaf_class_id,
                iconic_class_id: record.iconic_class_id,
                spatial_class_id: record.spatial_class_id,
                geo_threshold: record.geo_threshold,
                parent: None,
                children: Vec::new(),
            });
        }

        for (index, parent_id) in parents {
            let parent = match parent_id {
                Some(id) => *by_id.get(&id).ok_or_else(|| Error::TaxonomyParse {
                    message: format!(
                        "taxon {} references unknown parent {id}",
                        nodes[index].taxon_id
                    ),
                })?,
                None => ROOT,
            };
            if nodes[parent].rank_level <= nodes[index].rank_level {
                return Err(Error::TaxonomyParse {
                    message: format!(
                        "taxon {} has rank level {} but its parent {} has {}",
                        nodes[index].taxon_id,
                        nodes[index].rank_level,
                        nodes[parent].taxon_id,
                        nodes[parent].rank_level
                    ),
                });
            }
            nodes[index].parent = Some(parent);
            nodes[parent].children.push(index);
        }

        let leaf_count = nodes.iter().filter(|n| n.leaf_id.is_some()).count();
        Ok(Self {
            nodes,
            by_id,
            leaf_count,
        })
    }

    /// Number of leaves, i.e. the expected length of the model output.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    fn index_of(&self, taxon_id: u32) -> Option<usize> {
        self.by_id.get(&taxon_id).copied()
    }

    /// Whether `taxon_id` is the node itself or one of its ancestors.
    fn descends_from(&self, mut index: usize, taxon_id: u32) -> bool {
        loop {
            if self.nodes[index].taxon_id == taxon_id {
                return true;
            }
            match self.nodes[index].parent {
                Some(parent) => index = parent,
                None => return false,
            }
        }
    }

    fn ancestor_ids(&self, index: usize) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            ids.push(self.nodes[parent].taxon_id);
            current = self.nodes[parent].parent;
        }
        ids.reverse();
        ids
    }

    /// Score every node from the model's leaf scores.
    ///
    /// With geomodel scores the leaf score becomes the normalized product of
    /// vision and geo scores; internal nodes then carry the sum of their
    /// children and the highest geo score below them.
    pub fn score(
        &self,
        vision_scores: &[f32],
        geo_scores: Option<&[f32]>,
        filter: Option<TaxonFilter>,
    ) -> NodeScores {
        if vision_scores.len() != self.leaf_count {
            warn!(
                "Model produced {} scores for {} leaves",
                vision_scores.len(),
                self.leaf_count
            );
        }

        let leaf_vision: Vec<f64> = vision_scores.iter().map(|&s| f64::from(s)).collect();
        let leaf_combined = geo_scores.map_or_else(
            || leaf_vision.clone(),
            |geo| combine_vision_and_geo(vision_scores, geo),
        );

        let mut combined = vec![0.0; self.nodes.len()];
        let mut vision = geo_scores.map(|_| vec![0.0; self.nodes.len()]);
        let mut geo = geo_scores.map(|_| vec![0.0; self.nodes.len()]);

        for index in self.post_order() {
            let node = &self.nodes[index];
            if let Some(leaf_id) = node.leaf_id {
                let slot = leaf_id as usize;
                let zeroed = filter.is_some_and(|f| self.descends_from(index, f.taxon_id) == f.negative);
                if !zeroed {
                    combined[index] = leaf_combined.get(slot).copied().unwrap_or(0.0);
                    if let Some(vision) = vision.as_mut() {
                        vision[index] = leaf_vision.get(slot).copied().unwrap_or(0.0);
                    }
                }
                if let (Some(geo), Some(scores)) = (geo.as_mut(), geo_scores) {
                    geo[index] = scores.get(slot).map_or(0.0, |&s| f64::from(s));
                }
            } else {
                let sum: f64 = node.children.iter().map(|&c| combined[c]).sum();
                combined[index] = sum;
                if let Some(vision) = vision.as_mut() {
                    let sum: f64 = node.children.iter().map(|&c| vision[c]).sum();
                    vision[index] = sum;
                }
                if let Some(geo) = geo.as_mut() {
                    let max = node.children.iter().map(|&c| geo[c]).fold(0.0, f64::max);
                    geo[index] = max;
                }
            }
        }

        NodeScores {
            combined,
            vision,
            geo,
        }
    }

    /// Children before parents.
    fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(ROOT, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
            } else {
                stack.push((index, true));
                for &child in self.nodes[index].children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    fn prediction(&self, index: usize, scores: &NodeScores) -> Prediction {
        let node = &self.nodes[index];
        Prediction {
            taxon_id: node.taxon_id,
            name: node.name.clone(),
            rank_level: node.rank_level,
            score: scores.combined[index],
            rank: Rank::from_level(node.rank_level),
            ancestor_ids: Some(self.ancestor_ids(index)),
            leaf_id: node.leaf_id,
            iconic_class_id: node.iconic_class_id,
            spatial_class_id: node.spatial_class_id,
            vision_score: scores.vision.as_ref().map(|v| v[index]),
            geo_score: scores.geo.as_ref().map(|g| g[index]),
            geo_threshold: node.geo_threshold,
        }
    }

    /// Follow the highest-scoring child from the root down to a leaf.
    ///
    /// Returned root first, so the most specific taxon is last.
    pub fn best_branch(&self, scores: &NodeScores) -> Vec<Prediction> {
        let mut branch = vec![self.prediction(ROOT, scores)];
        let mut current = ROOT;

        loop {
            let mut best: Option<(usize, f64)> = None;
            for &child in &self.nodes[current].children {
                let score = scores.combined[child];
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((child, score));
                }
            }
            let Some((child, _)) = best else {
                break;
            };
            branch.push(self.prediction(child, scores));
            current = child;
        }

        branch
    }

    /// Every taxon scoring above a small fraction of the best leaf.
    ///
    /// Pre-order, so ancestors come before their descendants.
    pub fn full_prediction_set(&self, scores: &NodeScores) -> Vec<Prediction> {
        let top_leaf = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.leaf_id.is_some())
            .map(|(i, _)| scores.combined[i])
            .fold(0.0, f64::max);
        let cutoff = top_leaf * PREFILTER_RATIO;

        let mut predictions = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            if scores.combined[index] > cutoff {
                predictions.push(self.prediction(index, scores));
            }
            stack.extend(self.nodes[index].children.iter().rev());
        }
        debug!(
            "Full prediction set: {} of {} taxa above {cutoff:.6}",
            predictions.len(),
            self.nodes.len()
        );
        predictions
    }
}

impl Taxonomy {
    /// Leaf predictions for a geomodel score vector, best first.
    ///
    /// Each prediction carries the geo score both as `score` and `geo_score`,
    /// together with the leaf's geo threshold. Leaves at or below a thousandth
    /// of the best score are left out.
    pub fn leaf_predictions(&self, geo_scores: &[f32]) -> Vec<Prediction> {
        let top = geo_scores.iter().copied().fold(0.0_f32, f32::max);
        let cutoff = f64::from(top) * PREFILTER_RATIO;

        let mut predictions: Vec<Prediction> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let slot = node.leaf_id? as usize;
                let score = f64::from(*geo_scores.get(slot)?);
                (score > cutoff).then(|| Prediction {
                    taxon_id: node.taxon_id,
                    name: node.name.clone(),
                    rank_level: node.rank_level,
                    score,
                    rank: Rank::from_level(node.rank_level),
                    ancestor_ids: Some(self.ancestor_ids(index)),
                    leaf_id: node.leaf_id,
                    iconic_class_id: node.iconic_class_id,
                    spatial_class_id: node.spatial_class_id,
                    vision_score: None,
                    geo_score: Some(score),
                    geo_threshold: node.geo_threshold,
                })
            })
            .collect();
        predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
        predictions
    }
}

/// Element-wise product of vision and geo scores, normalized to sum to one.
///
/// Positions missing from `geo` score zero.
pub fn combine_vision_and_geo(vision: &[f32], geo: &[f32]) -> Vec<f64> {
    let mut combined: Vec<f64> = vision
        .iter()
        .enumerate()
        .map(|(i, &v)| f64::from(v) * geo.get(i).map_or(0.0, |&g| f64::from(g)))
        .collect();
    let total: f64 = combined.iter().sum();
    if total > 0.0 {
        for score in &mut combined {
            *score /= total;
        }
    }
    combined
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const CSV: &str = "\
parent_taxon_id,taxon_id,rank_level,leaf_class_id,iconic_class_id,spatial_class_id,geo_threshold,name
,1,70,,,,,Animalia
1,40,40,,,,,Carnivora
40,30,30,,,,,Canidae
30,20,20,,,,,Vulpes
20,100,10,0,1,0,0.1,Vulpes vulpes
20,101,10,1,1,1,0.2,Vulpes lagopus
30,21,20,,,,,Canis
21,102,10,2,1,2,0.05,Canis lupus
40,31,30,,,,,Felidae
31,103,10,3,1,3,0.1,Felis catus
";

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_csv_str(CSV).unwrap()
    }

    #[test]
    fn test_load_counts_leaves() {
        assert_eq!(taxonomy().leaf_count(), 4);
    }

    #[test]
    fn test_load_legacy_columns() {
        let csv = "parent_taxon_id,taxon_id,rank_level,leaf_class_id,name\n,1,70,,Animalia\n1,2,10,0,Thing\n";
        let taxonomy = Taxonomy::from_csv_str(csv).unwrap();
        assert_eq!(taxonomy.leaf_count(), 1);
    }

    #[test]
    fn test_unknown_parent_is_error() {
        let csv = "parent_taxon_id,taxon_id,rank_level,leaf_class_id,name\n999,2,10,0,Orphan\n";
        let result = Taxonomy::from_csv_str(csv);
        assert!(matches!(result, Err(Error::TaxonomyParse { .. })));
    }

    #[test]
    fn test_parent_rank_must_be_greater() {
        let csv = "parent_taxon_id,taxon_id,rank_level,leaf_class_id,name\n,1,10,,A\n1,2,20,0,B\n";
        let result = Taxonomy::from_csv_str(csv);
        assert!(matches!(result, Err(Error::TaxonomyParse { .. })));
    }

    #[test]
    fn test_internal_scores_are_sums() {
        let taxonomy = taxonomy();
        let scores = taxonomy.score(&[0.5, 0.25, 0.125, 0.125], None, None);
        assert_eq!(scores.get(&taxonomy, 20), Some(0.75));
        assert_eq!(scores.get(&taxonomy, 30), Some(0.875));
        assert_eq!(scores.get(&taxonomy, 1), Some(1.0));
        assert_eq!(scores.get(&taxonomy, LIFE_TAXON_ID), Some(1.0));
    }

    #[test]
    fn test_best_branch_follows_top_children() {
        let taxonomy = taxonomy();
        let scores = taxonomy.score(&[0.1, 0.2, 0.6, 0.1], None, None);
        let branch = taxonomy.best_branch(&scores);
        let names: Vec<&str> = branch.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Life", "Animalia", "Carnivora", "Canidae", "Canis", "Canis lupus"]
        );
        assert_eq!(
            branch.last().unwrap().ancestor_ids,
            Some(vec![LIFE_TAXON_ID, 1, 40, 30, 21])
        );
        assert_eq!(branch.last().unwrap().rank, Some(Rank::Species));
    }

    #[test]
    fn test_positive_filter_zeroes_outside_subtree() {
        let taxonomy = taxonomy();
        let filter = TaxonFilter {
            taxon_id: 31,
            negative: false,
        };
        let scores = taxonomy.score(&[0.4, 0.3, 0.2, 0.1], None, Some(filter));
        assert_eq!(scores.get(&taxonomy, 30), Some(0.0));
        assert!((scores.get(&taxonomy, 31).unwrap() - 0.1).abs() < 1e-6);
        let branch = taxonomy.best_branch(&scores);
        assert_eq!(branch.last().unwrap().name, "Felis catus");
    }

    #[test]
    fn test_negative_filter_zeroes_inside_subtree() {
        let taxonomy = taxonomy();
        let filter = TaxonFilter {
            taxon_id: 20,
            negative: true,
        };
        let scores = taxonomy.score(&[0.4, 0.3, 0.2, 0.1], None, Some(filter));
        assert_eq!(scores.get(&taxonomy, 20), Some(0.0));
        let branch = taxonomy.best_branch(&scores);
        assert_eq!(branch.last().unwrap().name, "Canis lupus");
    }

    #[test]
    fn test_full_prediction_set_prefilters_and_marks_leaves() {
        let taxonomy = taxonomy();
        let scores = taxonomy.score(&[0.9, 0.0999, 0.0001, 0.0], None, None);
        let set = taxonomy.full_prediction_set(&scores);

        // Canis lupus (0.0001) is at the cutoff 0.9 * 0.001 = 0.0009, Felis is 0
        assert!(!set.iter().any(|p| p.taxon_id == 102));
        assert!(!set.iter().any(|p| p.taxon_id == 103));
        assert!(!set.iter().any(|p| p.taxon_id == 31));

        let fox = set.iter().find(|p| p.taxon_id == 100).unwrap();
        assert_eq!(fox.leaf_id, Some(0));
        assert_eq!(fox.ancestor_ids, Some(vec![LIFE_TAXON_ID, 1, 40, 30, 20]));
        assert_eq!(fox.geo_threshold, Some(0.1));

        let genus = set.iter().find(|p| p.taxon_id == 20).unwrap();
        assert!(genus.leaf_id.is_none());
    }

    #[test]
    fn test_geo_scores_combine_and_propagate() {
        let taxonomy = taxonomy();
        let scores = taxonomy.score(&[0.5, 0.5, 0.0, 0.0], Some(&[0.1, 0.9, 0.5, 0.5]), None);
        let set = taxonomy.full_prediction_set(&scores);

        let lagopus = set.iter().find(|p| p.taxon_id == 101).unwrap();
        assert!((lagopus.score - 0.9).abs() < 1e-6);
        assert!((lagopus.vision_score.unwrap() - 0.5).abs() < 1e-6);
        assert!((lagopus.geo_score.unwrap() - 0.9).abs() < 1e-6);

        let genus = set.iter().find(|p| p.taxon_id == 20).unwrap();
        assert!((genus.geo_score.unwrap() - 0.9).abs() < 1e-6);
        assert!((genus.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_leaf_predictions_sorted_and_prefiltered() {
        let taxonomy = taxonomy();
        let predictions = taxonomy.leaf_predictions(&[0.2, 0.9, 0.0, 0.5]);
        let ids: Vec<u32> = predictions.iter().map(|p| p.taxon_id).collect();
        assert_eq!(ids, vec![101, 103, 100]);
        assert_eq!(predictions[0].geo_threshold, Some(0.2));
        assert_eq!(predictions[0].geo_score, Some(predictions[0].score));
    }

    #[test]
    fn test_combine_vision_and_geo_normalizes() {
        let combined = combine_vision_and_geo(&[0.5, 0.5], &[1.0, 0.0]);
        assert_eq!(combined, vec![1.0, 0.0]);

        let zero = combine_vision_and_geo(&[0.5, 0.5], &[0.0, 0.0]);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
