//! Still-image and location queries.

use crate::error::{Error, Result};
use crate::geo::{CanonicalLocation, CellResolver, ElevationTable, H3Grid, Location};
use crate::inference::{
    Classifier, ClassifierRequest, EchoedOptions, Geomodel, ImageOptions, LocationOptions, Mode,
    OutputShape, RawResult,
};
use crate::pipeline::results::{GeomodelResult, ImageResult};
use crate::pipeline::session::FrameSession;
use crate::taxonomy::{annotate, annotate_ranks, common_ancestor, rollup, scale_scores};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for classifier queries.
///
/// Image and location queries run the backend on the blocking thread pool
/// and never touch a frame session's buffer.
#[derive(Clone)]
pub struct VisionEngine {
    classifier: Arc<dyn Classifier>,
    geomodel: Option<Arc<dyn Geomodel>>,
    resolver: CellResolver,
}

impl VisionEngine {
    /// Engine over an H3 grid without elevation data.
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            geomodel: None,
            resolver: CellResolver::new(Arc::new(H3Grid), Arc::new(ElevationTable::default())),
        }
    }

    /// Attach a geomodel for location queries.
    #[must_use]
    pub fn with_geomodel(mut self, geomodel: Arc<dyn Geomodel>) -> Self {
        self.geomodel = Some(geomodel);
        self
    }

    /// Replace the cell resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: CellResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Start a frame session sharing this engine's classifier and resolver.
    pub fn frame_session(&self, buffer_size: usize) -> Result<FrameSession> {
        FrameSession::new(
            Arc::clone(&self.classifier),
            self.resolver.clone(),
            buffer_size,
        )
    }

    /// Canonicalize a location to its grid cell.
    pub fn cell_location(&self, location: &Location) -> Result<CanonicalLocation> {
        self.resolver.resolve(location)
    }

    /// Classify a still image.
    ///
    /// In best-branch mode the annotated branch is scaled and rolled up. In
    /// common-ancestor mode the backend's full prediction set is reduced to
    /// its top leaves and a single ancestor.
    pub async fn predictions_for_image(&self, options: ImageOptions) -> Result<ImageResult> {
        let validated = options.request.validate()?;
        let location = validated
            .geo_location
            .as_ref()
            .map(|l| self.resolver.resolve(l))
            .transpose()?;

        let request = ClassifierRequest {
            version: options.request.version.clone(),
            crop_ratio: options.request.crop_ratio,
            output: match options.mode {
                Mode::BestBranch => OutputShape::BestBranch,
                Mode::CommonAncestor => OutputShape::FullSet,
            },
            taxon_filter: validated.taxon_filter,
            location,
        };

        let classifier = Arc::clone(&self.classifier);
        let image = options.image.clone();
        let raw = run_blocking(move || classifier.classify_image(&image, &request)).await?;
        let result = raw.normalize();
        let timestamp = result.timestamp;
        let time_elapsed = result.time_elapsed;

        let (predictions, ancestor) = match options.mode {
            Mode::BestBranch => {
                let annotated = annotate(result);
                let rolled = rollup(
                    scale_scores(annotated.predictions),
                    validated.confidence_threshold,
                );
                (rolled, None)
            }
            Mode::CommonAncestor => {
                let mut outcome = common_ancestor(&result.predictions, options.rank_type);
                annotate_ranks(&mut outcome.top_predictions);
                if let Some(ancestor) = outcome.common_ancestor.as_mut() {
                    annotate_ranks(std::slice::from_mut(ancestor));
                }
                (outcome.top_predictions, outcome.common_ancestor)
            }
        };

        info!(
            "Image classified ({}): {} predictions, common ancestor: {}",
            options.mode,
            predictions.len(),
            ancestor.as_ref().map_or("none", |a| a.name.as_str())
        );

        Ok(ImageResult {
            predictions,
            common_ancestor: ancestor,
            timestamp,
            time_elapsed,
            options: EchoedOptions::from(&options),
        })
    }

    /// Score taxa for a location with the geomodel.
    pub async fn predictions_for_location(
        &self,
        options: LocationOptions,
    ) -> Result<GeomodelResult> {
        options.validate()?;
        let geomodel = self
            .geomodel
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::PluginUnavailable {
                component: "geomodel".to_string(),
            })?;
        let canonical = self.cell_location(&options.location)?;

        let query = canonical.clone();
        let raw = run_blocking(move || geomodel.predict(&query)).await?;
        let mut result = raw.normalize();
        annotate_ranks(&mut result.predictions);
        debug!(
            "Geomodel scored {} taxa for cell {}",
            result.predictions.len(),
            canonical.cell_id
        );

        Ok(GeomodelResult {
            predictions: scale_scores(result.predictions),
            location: canonical,
            timestamp: result.timestamp,
            time_elapsed: result.time_elapsed,
            options,
        })
    }
}

impl std::fmt::Debug for VisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionEngine")
            .field("geomodel", &self.geomodel.is_some())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

async fn run_blocking<F>(task: F) -> Result<RawResult>
where
    F: FnOnce() -> Result<RawResult> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Internal {
            message: format!("inference task failed: {e}"),
        })?
}
