//! Classifier built from a leaf-scoring model and its taxonomy.

use crate::error::{Error, Result};
use crate::geo::CanonicalLocation;
use crate::inference::{
    Classifier, ClassifierRequest, Frame, Geomodel, ImageSource, LeafScorer, OutputShape,
    RawResult, ScorerInput,
};
use crate::taxonomy::Taxonomy;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Turns raw leaf scores into taxonomic predictions.
///
/// The vision scorer is required; the geomodel scorer is only needed for
/// requests carrying a location and for [`Geomodel::predict`].
pub struct TaxonomyClassifier {
    taxonomy: Arc<Taxonomy>,
    vision: Arc<dyn LeafScorer>,
    geomodel: Option<Arc<dyn LeafScorer>>,
}

impl TaxonomyClassifier {
    /// Classifier without geomodel support.
    pub fn new(taxonomy: Arc<Taxonomy>, vision: Arc<dyn LeafScorer>) -> Self {
        Self {
            taxonomy,
            vision,
            geomodel: None,
        }
    }

    /// Attach a geomodel scorer.
    #[must_use]
    pub fn with_geomodel(mut self, geomodel: Arc<dyn LeafScorer>) -> Self {
        self.geomodel = Some(geomodel);
        self
    }

    fn geomodel(&self) -> Result<&Arc<dyn LeafScorer>> {
        self.geomodel.as_ref().ok_or_else(|| Error::PluginUnavailable {
            component: "geomodel".to_string(),
        })
    }

    fn run(&self, input: ScorerInput<'_>, request: &ClassifierRequest) -> Result<RawResult> {
        let start = Instant::now();
        let vision = self.vision.score_leaves(input)?;

        let geo = match &request.location {
            Some(location) => {
                let features = location.features();
                Some(self.geomodel()?.score_leaves(ScorerInput::Location(&features))?)
            }
            None => None,
        };

        let scores = self
            .taxonomy
            .score(&vision, geo.as_deref(), request.taxon_filter);
        let predictions = match request.output {
            OutputShape::BestBranch => self.taxonomy.best_branch(&scores),
            OutputShape::FullSet => self.taxonomy.full_prediction_set(&scores),
        };
        debug!(
            "Classified {} leaves into {} predictions ({:?})",
            vision.len(),
            predictions.len(),
            request.output
        );

        let mut result = RawResult::from_predictions(predictions);
        result.time_elapsed = Some(start.elapsed().as_secs_f64());
        result.timestamp = Some(Utc::now());
        Ok(result)
    }
}

impl Classifier for TaxonomyClassifier {
    fn classify_frame(&self, frame: &Frame, request: &ClassifierRequest) -> Result<RawResult> {
        self.run(
            ScorerInput::Frame {
                frame,
                crop_ratio: request.crop_ratio,
            },
            request,
        )
    }

    fn classify_image(
        &self,
        image: &ImageSource,
        request: &ClassifierRequest,
    ) -> Result<RawResult> {
        self.run(
            ScorerInput::Image {
                image,
                crop_ratio: request.crop_ratio,
            },
            request,
        )
    }
}

impl Geomodel for TaxonomyClassifier {
    fn predict(&self, location: &CanonicalLocation) -> Result<RawResult> {
        let start = Instant::now();
        let features = location.features();
        let scores = self
            .geomodel()?
            .score_leaves(ScorerInput::Location(&features))?;
        let mut result = RawResult::from_predictions(self.taxonomy.leaf_predictions(&scores));
        result.time_elapsed = Some(start.elapsed().as_secs_f64());
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonFilter;

    const CSV: &str = "\
parent_taxon_id,taxon_id,rank_level,leaf_class_id,spatial_class_id,geo_threshold,name
,1,70,,,,Animalia
1,20,20,,,,Vulpes
20,100,10,0,0,0.1,Vulpes vulpes
20,101,10,1,1,0.1,Vulpes lagopus
1,21,20,,,,Canis
21,102,10,2,2,0.1,Canis lupus
";

    struct Fixed(Vec<f32>);

    impl LeafScorer for Fixed {
        fn score_leaves(&self, _input: ScorerInput<'_>) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl LeafScorer for Failing {
        fn score_leaves(&self, _input: ScorerInput<'_>) -> Result<Vec<f32>> {
            Err(Error::Inference {
                reason: "model crashed".to_string(),
            })
        }
    }

    fn classifier(vision: Vec<f32>) -> TaxonomyClassifier {
        let taxonomy = Arc::new(Taxonomy::from_csv_str(CSV).unwrap());
        TaxonomyClassifier::new(taxonomy, Arc::new(Fixed(vision)))
    }

    fn request(output: OutputShape) -> ClassifierRequest {
        ClassifierRequest {
            version: "2.13".to_string(),
            crop_ratio: 1.0,
            output,
            taxon_filter: None,
            location: None,
        }
    }

    fn location() -> CanonicalLocation {
        CanonicalLocation {
            latitude: 50.0,
            longitude: 10.0,
            elevation: 200.0,
            cell_id: "8400000ffffffff".to_string(),
        }
    }

    #[test]
    fn test_best_branch_frame() {
        let classifier = classifier(vec![0.1, 0.2, 0.7]);
        let result = classifier
            .classify_frame(&Frame::default(), &request(OutputShape::BestBranch))
            .unwrap()
            .normalize();
        let ids: Vec<u32> = result.predictions.iter().map(|p| p.taxon_id).collect();
        assert_eq!(ids, vec![48460, 1, 21, 102]);
        assert!(result.time_elapsed.is_some());
    }

    #[test]
    fn test_full_set_image() {
        let classifier = classifier(vec![0.1, 0.2, 0.7]);
        let image = ImageSource::Bytes(vec![0; 4]);
        let result = classifier
            .classify_image(&image, &request(OutputShape::FullSet))
            .unwrap()
            .normalize();
        assert_eq!(result.predictions.len(), 7);
        assert_eq!(result.predictions.iter().filter(|p| p.is_leaf()).count(), 3);
    }

    #[test]
    fn test_taxon_filter_passed_through() {
        let classifier = classifier(vec![0.1, 0.2, 0.7]);
        let mut request = request(OutputShape::BestBranch);
        request.taxon_filter = Some(TaxonFilter {
            taxon_id: 20,
            negative: false,
        });
        let result = classifier
            .classify_frame(&Frame::default(), &request)
            .unwrap()
            .normalize();
        assert_eq!(result.predictions.last().unwrap().taxon_id, 101);
    }

    #[test]
    fn test_location_without_geomodel_unavailable() {
        let classifier = classifier(vec![0.1, 0.2, 0.7]);
        let mut request = request(OutputShape::BestBranch);
        request.location = Some(location());
        let result = classifier.classify_frame(&Frame::default(), &request);
        assert!(matches!(result, Err(Error::PluginUnavailable { .. })));
    }

    #[test]
    fn test_geomodel_reweights_vision() {
        let classifier =
            classifier(vec![0.1, 0.2, 0.7]).with_geomodel(Arc::new(Fixed(vec![0.9, 0.9, 0.01])));
        let mut request = request(OutputShape::FullSet);
        request.location = Some(location());
        let result = classifier
            .classify_frame(&Frame::default(), &request)
            .unwrap()
            .normalize();
        let genus = result.predictions.iter().find(|p| p.taxon_id == 20).unwrap();
        let wolf = result.predictions.iter().find(|p| p.taxon_id == 102).unwrap();
        assert!(genus.score > wolf.score);
        assert!(wolf.vision_score.unwrap() > genus.vision_score.unwrap());
    }

    #[test]
    fn test_geomodel_predict() {
        let classifier =
            classifier(vec![0.0; 3]).with_geomodel(Arc::new(Fixed(vec![0.3, 0.9, 0.0])));
        let result = classifier.predict(&location()).unwrap().normalize();
        let ids: Vec<u32> = result.predictions.iter().map(|p| p.taxon_id).collect();
        assert_eq!(ids, vec![101, 100]);
    }

    #[test]
    fn test_scorer_error_propagates() {
        let taxonomy = Arc::new(Taxonomy::from_csv_str(CSV).unwrap());
        let classifier = TaxonomyClassifier::new(taxonomy, Arc::new(Failing));
        let result = classifier.classify_frame(&Frame::default(), &request(OutputShape::BestBranch));
        assert!(matches!(result, Err(Error::Inference { .. })));
    }
}
