//! Request options and their validation.

use crate::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CROP_RATIO, DEFAULT_VERSION, LEGACY_SCALE_VERSIONS,
    SCORE_SCALE, SUPPORTED_VERSIONS, confidence,
};
use crate::error::{Error, Result};
use crate::geo::Location;
use crate::inference::ImageSource;
use crate::taxonomy::{RankType, TaxonFilter};
use serde::{Deserialize, Serialize};

/// How a still image is turned into an answer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Roll up the single best branch.
    #[default]
    BestBranch,
    /// Aggregate the full prediction set into one common ancestor.
    CommonAncestor,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestBranch => write!(f, "best-branch"),
            Self::CommonAncestor => write!(f, "common-ancestor"),
        }
    }
}

/// Options shared by frame and still-image requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Model version.
    pub version: String,
    /// Minimum score for rolled-up predictions. Percent, or 0-1 for legacy versions.
    pub confidence_threshold: f64,
    /// Fraction of the shorter image side kept by the center crop.
    pub crop_ratio: f64,
    /// Combine the geomodel into vision scores.
    pub use_geomodel: bool,
    /// Required when `use_geomodel` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Restrict results to (or away from) this taxon's subtree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_by_taxon_id: Option<u32>,
    /// Exclude the filter taxon's subtree instead of keeping only it.
    pub negative_filter: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            crop_ratio: DEFAULT_CROP_RATIO,
            use_geomodel: false,
            location: None,
            filter_by_taxon_id: None,
            negative_filter: false,
        }
    }
}

/// Options for one camera frame.
pub type FrameOptions = RequestOptions;

/// Request options after validation, with the threshold on the percent scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    /// Threshold comparable with scaled scores.
    pub confidence_threshold: f64,
    /// Location to resolve for the geomodel, when requested.
    pub geo_location: Option<Location>,
    /// Subtree filter for the taxonomy.
    pub taxon_filter: Option<TaxonFilter>,
}

impl RequestOptions {
    /// Whether thresholds for this version are given on the 0-1 scale.
    pub fn uses_legacy_scale(&self) -> bool {
        LEGACY_SCALE_VERSIONS.contains(&self.version.as_str())
    }

    /// Check every option before any inference work happens.
    pub fn validate(&self) -> Result<ValidatedOptions> {
        validate_version(&self.version)?;

        let legacy = self.uses_legacy_scale();
        let max = if legacy {
            confidence::MAX_UNIT
        } else {
            confidence::MAX_PERCENT
        };
        if !(confidence::MIN..=max).contains(&self.confidence_threshold) {
            return Err(Error::InvalidConfidenceThreshold {
                value: self.confidence_threshold,
                min: confidence::MIN,
                max,
            });
        }
        let confidence_threshold = if legacy {
            self.confidence_threshold * SCORE_SCALE
        } else {
            self.confidence_threshold
        };

        if !(0.0..=1.0).contains(&self.crop_ratio) {
            return Err(Error::InvalidCropRatio {
                value: self.crop_ratio,
            });
        }

        let geo_location = if self.use_geomodel {
            let location = self.location.ok_or(Error::MissingLocation)?;
            location.validate()?;
            Some(location)
        } else {
            None
        };

        Ok(ValidatedOptions {
            confidence_threshold,
            geo_location,
            taxon_filter: self.filter_by_taxon_id.map(|taxon_id| TaxonFilter {
                taxon_id,
                negative: self.negative_filter,
            }),
        })
    }
}

/// Options for a still-image request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    /// Image to classify.
    pub image: ImageSource,
    /// Shared request options.
    pub request: RequestOptions,
    /// Best branch or common ancestor.
    pub mode: Mode,
    /// Ranks eligible as common ancestor.
    pub rank_type: RankType,
}

impl ImageOptions {
    /// Options with defaults for everything except the image.
    pub fn new(image: ImageSource) -> Self {
        Self {
            image,
            request: RequestOptions::default(),
            mode: Mode::default(),
            rank_type: RankType::default(),
        }
    }
}

/// Options for a geomodel-only request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationOptions {
    /// Model version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Location to score.
    pub location: Location,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl LocationOptions {
    /// Options for a location with the default version.
    pub fn new(location: Location) -> Self {
        Self {
            version: default_version(),
            location,
        }
    }

    /// Check version and coordinates.
    pub fn validate(&self) -> Result<()> {
        validate_version(&self.version)?;
        self.location.validate()
    }
}

/// Request options echoed back with every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoedOptions {
    /// Options as supplied by the caller.
    #[serde(flatten)]
    pub request: RequestOptions,
    /// Still-image mode, absent for frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Rank type, absent unless a common ancestor was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_type: Option<RankType>,
}

impl From<&RequestOptions> for EchoedOptions {
    fn from(request: &RequestOptions) -> Self {
        Self {
            request: request.clone(),
            mode: None,
            rank_type: None,
        }
    }
}

impl From<&ImageOptions> for EchoedOptions {
    fn from(options: &ImageOptions) -> Self {
        Self {
            request: options.request.clone(),
            mode: Some(options.mode),
            rank_type: (options.mode == Mode::CommonAncestor).then_some(options.rank_type),
        }
    }
}

/// Reject versions outside the supported set.
pub fn validate_version(version: &str) -> Result<()> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion {
            version: version.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn located() -> RequestOptions {
        RequestOptions {
            use_geomodel: true,
            location: Some(Location::new(52.5, 13.4)),
            ..RequestOptions::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        let validated = RequestOptions::default().validate().unwrap();
        assert_eq!(validated.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert!(validated.geo_location.is_none());
        assert!(validated.taxon_filter.is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let options = RequestOptions {
            version: "3.0".to_string(),
            ..RequestOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::UnsupportedVersion { version }) if version == "3.0"
        ));
    }

    #[test]
    fn test_threshold_bounds() {
        for value in [-0.1, 100.1, f64::NAN] {
            let options = RequestOptions {
                confidence_threshold: value,
                ..RequestOptions::default()
            };
            assert!(matches!(
                options.validate(),
                Err(Error::InvalidConfidenceThreshold { .. })
            ));
        }
        for value in [0.0, 100.0] {
            let options = RequestOptions {
                confidence_threshold: value,
                ..RequestOptions::default()
            };
            assert!(options.validate().is_ok());
        }
    }

    #[test]
    fn test_legacy_threshold_converted_to_percent() {
        let options = RequestOptions {
            version: "1.0".to_string(),
            confidence_threshold: 0.7,
            ..RequestOptions::default()
        };
        let validated = options.validate().unwrap();
        assert!((validated.confidence_threshold - 70.0).abs() < 1e-9);

        let too_big = RequestOptions {
            version: "1.0".to_string(),
            confidence_threshold: 70.0,
            ..RequestOptions::default()
        };
        assert!(matches!(
            too_big.validate(),
            Err(Error::InvalidConfidenceThreshold { max, .. }) if max == 1.0
        ));
    }

    #[test]
    fn test_crop_ratio_bounds() {
        let options = RequestOptions {
            crop_ratio: 1.5,
            ..RequestOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidCropRatio { .. })
        ));
    }

    #[test]
    fn test_geomodel_requires_location() {
        let options = RequestOptions {
            use_geomodel: true,
            ..RequestOptions::default()
        };
        assert!(matches!(options.validate(), Err(Error::MissingLocation)));

        let validated = located().validate().unwrap();
        assert_eq!(validated.geo_location, Some(Location::new(52.5, 13.4)));
    }

    #[test]
    fn test_geomodel_location_range_checked() {
        let options = RequestOptions {
            location: Some(Location::new(95.0, 13.4)),
            ..located()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidLatitude { .. })
        ));
    }

    #[test]
    fn test_location_ignored_without_geomodel() {
        let options = RequestOptions {
            location: Some(Location::new(95.0, 13.4)),
            ..RequestOptions::default()
        };
        assert!(options.validate().unwrap().geo_location.is_none());
    }

    #[test]
    fn test_taxon_filter_built() {
        let options = RequestOptions {
            filter_by_taxon_id: Some(3),
            negative_filter: true,
            ..RequestOptions::default()
        };
        assert_eq!(
            options.validate().unwrap().taxon_filter,
            Some(TaxonFilter {
                taxon_id: 3,
                negative: true
            })
        );
    }

    #[test]
    fn test_version_checked_before_threshold() {
        let options = RequestOptions {
            version: "bogus".to_string(),
            confidence_threshold: -5.0,
            ..RequestOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_location_options_validate() {
        assert!(LocationOptions::new(Location::new(1.0, 2.0)).validate().is_ok());
        let bad = LocationOptions {
            version: "9".to_string(),
            location: Location::new(1.0, 2.0),
        };
        assert!(matches!(bad.validate(), Err(Error::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_echoed_options_roundtrip_shape() {
        let mut options = ImageOptions::new(ImageSource::Path("a.jpg".into()));
        options.mode = Mode::CommonAncestor;
        let echoed = EchoedOptions::from(&options);
        let json = serde_json::to_value(&echoed).unwrap();
        assert_eq!(json["version"], DEFAULT_VERSION);
        assert_eq!(json["mode"], "common_ancestor");
        assert_eq!(json["rank_type"], "default");
        assert!(json.get("location").is_none());
    }
}
