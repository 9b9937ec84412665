//! Inference boundary: collaborator traits, request options and backends.
//!
//! Model execution itself lives outside this crate. Backends implement
//! [`Classifier`] and [`Geomodel`] and hand back [`RawResult`]s, which are
//! normalized once at ingestion.

mod options;
mod raw;
mod recorded;
mod taxonomy_classifier;

pub use options::{
    EchoedOptions, FrameOptions, ImageOptions, LocationOptions, Mode, RequestOptions,
    ValidatedOptions, validate_version,
};
pub use raw::{RawPrediction, RawPredictions, RawRank, RawResult};
pub use recorded::{RecordedClassifier, RecordedScores};
pub use taxonomy_classifier::TaxonomyClassifier;

use crate::error::Result;
use crate::geo::CanonicalLocation;
use crate::taxonomy::TaxonFilter;
use std::path::PathBuf;

/// One camera frame as handed over by the capture layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data in the capture layer's native layout.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Where a still image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Image file on disk.
    Path(PathBuf),
    /// Encoded image bytes.
    Bytes(Vec<u8>),
}

/// Whether a backend should return one branch or every plausible taxon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputShape {
    /// Single root-to-leaf path.
    #[default]
    BestBranch,
    /// Every taxon above the prefilter, with leaf ids and ancestor ids.
    FullSet,
}

/// Everything a backend needs to know about one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierRequest {
    /// Model version.
    pub version: String,
    /// Center crop fraction.
    pub crop_ratio: f64,
    /// Requested output layout.
    pub output: OutputShape,
    /// Subtree filter.
    pub taxon_filter: Option<TaxonFilter>,
    /// Canonical location when the geomodel should be combined in.
    pub location: Option<CanonicalLocation>,
}

/// Vision model over frames and still images.
pub trait Classifier: Send + Sync {
    /// Classify one live camera frame.
    fn classify_frame(&self, frame: &Frame, request: &ClassifierRequest) -> Result<RawResult>;

    /// Classify a still image.
    fn classify_image(&self, image: &ImageSource, request: &ClassifierRequest)
    -> Result<RawResult>;
}

/// Geomodel scoring taxa for a location.
pub trait Geomodel: Send + Sync {
    /// Predictions for a canonical location.
    fn predict(&self, location: &CanonicalLocation) -> Result<RawResult>;
}

/// Model input handed to a [`LeafScorer`].
#[derive(Debug, Clone, Copy)]
pub enum ScorerInput<'a> {
    /// A camera frame with the crop to apply.
    Frame {
        /// The frame.
        frame: &'a Frame,
        /// Center crop fraction.
        crop_ratio: f64,
    },
    /// A still image with the crop to apply.
    Image {
        /// The image.
        image: &'a ImageSource,
        /// Center crop fraction.
        crop_ratio: f64,
    },
    /// Encoded location features.
    Location(&'a [f32; 5]),
}

/// A raw model producing one score per taxonomy leaf.
pub trait LeafScorer: Send + Sync {
    /// Run the model. The output is indexed by leaf class id.
    fn score_leaves(&self, input: ScorerInput<'_>) -> Result<Vec<f32>>;
}
